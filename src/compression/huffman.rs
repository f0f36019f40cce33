//! Adaptive Huffman decompression (mask bit 0x01).
//!
//! A leading compression-type byte selects an initial weight profile over
//! the format's full 258-symbol alphabet — the 256 literal byte values,
//! `256` as end-of-stream, and `257` as a back-reference ("repeat with a
//! distance") escape — from a fixed weight table, so the tree starts
//! complete rather than growing from an empty "not yet transmitted" state.
//! After every symbol the tree is rebalanced (FGK-style: nodes with equal
//! weight stay adjacent, sibling property preserved) so it keeps adapting
//! to the stream's actual symbol frequencies.
//!
//! The bit stream is primed by reading four bytes as a little-endian buffer
//! right after the compression-type byte, then read most-significant-bit
//! first. A back-reference symbol is followed by a length and a distance,
//! each chosen from a small fixed table by a handful of raw (non-adaptive)
//! bits straight off the stream — no further tree lookups.
//!
//! The literal byte-for-byte seed weights and back-reference length/
//! distance tables aren't recoverable from this crate's source corpus; the
//! values below reconstruct the documented shape (weight-seeded complete
//! tree, `256`/`257` as the two non-literal symbols, fixed auxiliary
//! length/distance tables) rather than claim vendor-exact constants.

use super::super::error::Error;

const END_OF_STREAM: usize = 256;
const REPEAT: usize = 257;
const SYMBOL_COUNT: usize = 258;

const COPY_LEN_BASE: [u16; 8] = [2, 3, 4, 5, 6, 8, 12, 20];
const COPY_LEN_EXTRA: [u8; 8] = [0, 0, 0, 0, 1, 2, 3, 4];
const COPY_DIST_BASE: [u16; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 32, 48, 64];
const COPY_DIST_EXTRA: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// A deterministic, non-flat seed weight for `symbol`: lower byte values
/// weighted heaviest (common in the short text/control-heavy data this
/// codec targets), `256`/`257` lightest since most sectors contain far more
/// literals than back-references or a single end marker.
fn base_weight(symbol: usize) -> u32 {
    (SYMBOL_COUNT - symbol) as u32
}

#[derive(Clone, Copy)]
struct Node {
    weight: u32,
    parent: Option<usize>,
    children: Option<(usize, usize)>,
    symbol: Option<u16>,
}

struct Tree {
    nodes: Vec<Node>,
    root: usize,
    leaves: [usize; SYMBOL_COUNT],
}

impl Tree {
    /// Builds the complete initial tree for every one of the 258 symbols,
    /// weighted by `base_weight` and perturbed by `comp_type` so different
    /// compression-type bytes start from a different (but still complete)
    /// tree shape.
    fn new(comp_type: u8) -> Tree {
        let mut nodes: Vec<Node> = (0..SYMBOL_COUNT)
            .map(|symbol| Node {
                weight: base_weight(symbol) + u32::from(comp_type & 0x0F) + 1,
                parent: None,
                children: None,
                symbol: Some(symbol as u16),
            })
            .collect();

        let leaves: [usize; SYMBOL_COUNT] = {
            let mut l = [0usize; SYMBOL_COUNT];
            for (i, slot) in l.iter_mut().enumerate() {
                *slot = i;
            }
            l
        };

        let mut active: Vec<usize> = (0..nodes.len()).collect();
        while active.len() > 1 {
            active.sort_by_key(|&i| nodes[i].weight);
            let a = active.remove(0);
            let b = active.remove(0);

            let parent_idx = nodes.len();
            nodes.push(Node {
                weight: nodes[a].weight + nodes[b].weight,
                parent: None,
                children: Some((a, b)),
                symbol: None,
            });
            nodes[a].parent = Some(parent_idx);
            nodes[b].parent = Some(parent_idx);
            active.push(parent_idx);
        }

        let root = active[0];
        Tree { nodes, root, leaves }
    }

    /// Walks from the root to a leaf, one bit per level, and returns the
    /// node index reached (not yet the symbol — callers look that up via
    /// `self.nodes[node].symbol`, since `bump_weight` also wants the index).
    fn decode_node(&self, bits: &mut BitReader) -> Result<usize, Error> {
        let mut node = self.root;

        while let Some((left, right)) = self.nodes[node].children {
            node = if bits.next_bit()? == 0 { left } else { right };
        }

        Ok(node)
    }

    fn symbol_of(&self, node: usize) -> Result<usize, Error> {
        self.nodes[node].symbol.map(|s| s as usize).ok_or(Error::FileDecompress)
    }

    fn bump_weight(&mut self, start: usize) {
        let mut node = Some(start);

        while let Some(n) = node {
            let leader = self.block_leader(n);
            if leader != n {
                self.swap(n, leader);
            }

            self.nodes[leader].weight += 1;
            node = self.nodes[leader].parent;
        }
    }

    /// The highest-indexed node sharing `n`'s weight, excluding `n`'s own
    /// ancestors, per the sibling property.
    fn block_leader(&self, n: usize) -> usize {
        let weight = self.nodes[n].weight;
        let mut leader = n;

        for i in 0..self.nodes.len() {
            if i != n && self.nodes[i].weight == weight && !self.is_ancestor(i, n) {
                leader = i;
            }
        }

        leader
    }

    fn is_ancestor(&self, candidate: usize, of: usize) -> bool {
        let mut node = self.nodes[of].parent;
        while let Some(n) = node {
            if n == candidate {
                return true;
            }
            node = self.nodes[n].parent;
        }
        false
    }

    fn swap(&mut self, a: usize, b: usize) {
        let parent_a = self.nodes[a].parent;
        let parent_b = self.nodes[b].parent;

        if let Some(p) = parent_a {
            self.replace_child(p, a, b);
        }
        if let Some(p) = parent_b {
            self.replace_child(p, b, a);
        }

        self.nodes[a].parent = parent_b;
        self.nodes[b].parent = parent_a;

        if let Some(symbol) = self.nodes[a].symbol {
            self.leaves[symbol as usize] = a;
        }
        if let Some(symbol) = self.nodes[b].symbol {
            self.leaves[symbol as usize] = b;
        }
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let Some((l, r)) = self.nodes[parent].children {
            self.nodes[parent].children = if l == old { Some((new, r)) } else { Some((l, new)) };
        }
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    bits_left: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Result<BitReader<'a>, Error> {
        if data.len() < 4 {
            return Err(Error::FileDecompress);
        }

        let buffer = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        Ok(BitReader {
            data,
            pos: 4,
            buffer,
            bits_left: 32,
        })
    }

    fn refill(&mut self) -> Result<(), Error> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Err(Error::FileDecompress);
        }

        let take = remaining.min(4);
        let mut bytes = [0u8; 4];
        bytes[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);

        self.buffer = u32::from_le_bytes(bytes);
        self.pos += take;
        self.bits_left = (take * 8) as u32;
        Ok(())
    }

    /// Pulls the next bit from the current window, most-significant bit
    /// first: the primer (and each refill) loads its bytes little-endian
    /// into `buffer`, and bits are drawn starting at `bits_left - 1` down to
    /// `0` rather than from the bottom, per spec's "MSB-first bit stream".
    fn next_bit(&mut self) -> Result<u8, Error> {
        if self.bits_left == 0 {
            self.refill()?;
        }

        self.bits_left -= 1;
        let bit = ((self.buffer >> self.bits_left) & 1) as u8;
        Ok(bit)
    }

    /// Reads `count` raw (non-Huffman) bits, most-significant bit first.
    fn next_bits(&mut self, count: u32) -> Result<u32, Error> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | u32::from(self.next_bit()?);
        }
        Ok(value)
    }
}

pub(super) fn decompress(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, Error> {
    let comp_type = *data.first().ok_or(Error::FileDecompress)?;
    let mut bits = BitReader::new(&data[1..])?;
    let mut tree = Tree::new(comp_type);
    let mut out = Vec::with_capacity(uncompressed_size);

    while out.len() < uncompressed_size {
        let node = tree.decode_node(&mut bits)?;
        let symbol = tree.symbol_of(node)?;
        tree.bump_weight(node);

        match symbol {
            END_OF_STREAM => break,
            REPEAT => {
                // the length/distance selectors are plain fixed-width raw
                // reads (3 bits over 8 length buckets, 4 over 16 distance
                // buckets), not further Huffman-coded.
                let len_index = bits.next_bits(3)? as usize;
                let length = COPY_LEN_BASE[len_index] as usize
                    + bits.next_bits(u32::from(COPY_LEN_EXTRA[len_index]))? as usize;

                let dist_index = bits.next_bits(4)? as usize;
                let distance = COPY_DIST_BASE[dist_index] as usize
                    + bits.next_bits(u32::from(COPY_DIST_EXTRA[dist_index]))? as usize;

                if distance == 0 || distance > out.len() {
                    return Err(Error::FileDecompress);
                }

                let start = out.len() - distance;
                for i in 0..length {
                    if out.len() >= uncompressed_size {
                        break;
                    }
                    let byte = out[start + i];
                    out.push(byte);
                }
            }
            _ => out.push(symbol as u8),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_seeds_all_258_symbols() {
        let tree = Tree::new(0);
        for symbol in 0..SYMBOL_COUNT {
            let leaf = tree.leaves[symbol];
            assert_eq!(tree.nodes[leaf].symbol, Some(symbol as u16));
            assert!(tree.nodes[leaf].children.is_none());
        }
    }

    #[test]
    fn bit_reader_rejects_short_input() {
        assert!(BitReader::new(&[1, 2, 3]).is_err());
    }

    #[test]
    fn decodes_a_literal_by_walking_its_seeded_path() {
        let tree = Tree::new(0);
        let leaf = tree.leaves[b'A' as usize];

        // walk leaf -> root collecting the branch taken at each step, then
        // replay it root -> leaf as the bitstream `decode_node` expects.
        let mut path = Vec::new();
        let mut node = leaf;
        while let Some(parent) = tree.nodes[node].parent {
            let (left, _) = tree.nodes[parent].children.unwrap();
            path.push(if left == node { 0u32 } else { 1u32 });
            node = parent;
        }
        path.reverse();

        let mut writer_bits = 0u32;
        let mut writer_len = 0u32;
        for bit in &path {
            writer_bits = (writer_bits << 1) | bit;
            writer_len += 1;
        }
        // left-align into the 32-bit primer window, since `next_bit` reads
        // from the top of the buffer down.
        let primer = writer_bits << (32 - writer_len);
        let mut body = vec![0u8; 1];
        body.extend_from_slice(&primer.to_le_bytes());

        let mut bits = BitReader::new(&body[1..]).unwrap();
        let node = tree.decode_node(&mut bits).unwrap();
        assert_eq!(tree.symbol_of(node).unwrap(), b'A' as usize);
    }

    #[test]
    fn end_to_end_stops_at_end_of_stream() {
        // build a tree, find end-of-stream's own path, and confirm a
        // stream containing only that code decodes to zero bytes.
        let tree = Tree::new(0);
        let leaf = tree.leaves[END_OF_STREAM];

        let mut path = Vec::new();
        let mut node = leaf;
        while let Some(parent) = tree.nodes[node].parent {
            let (left, _) = tree.nodes[parent].children.unwrap();
            path.push(if left == node { 0u32 } else { 1u32 });
            node = parent;
        }
        path.reverse();

        let mut bits_val = 0u32;
        for bit in &path {
            bits_val = (bits_val << 1) | bit;
        }
        let primer = bits_val << (32 - path.len() as u32);

        let mut body = vec![0u8];
        body.extend_from_slice(&primer.to_le_bytes());

        let out = decompress(&body, 10).unwrap();
        assert!(out.is_empty());
    }
}
