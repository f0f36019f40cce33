//! The hash table, block table, and per-file sector-offset tables.
//!
//! All three are just encrypted arrays of fixed-size records; none of them
//! are ever compressed, so reading one is "decrypt, then parse fields" with
//! no codec dispatch involved.

use std::io::{Read, Seek};

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::crypto::{decrypt_mpq_block, hash_string};
use super::error::Error;
use super::seeker::Seeker;
use super::util::sector_count_from_size;

#[derive(Debug)]
pub(crate) struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    pub(crate) fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<HashTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.layout().hash_table_info;

        if !(info.entries).is_power_of_two() {
            return Err(Error::ArchiveHashTable);
        }

        // Guard the entries*16 multiplication against the archive's size
        // before allocating, per spec §9's integer-size-pitfalls note.
        if info.offset.checked_add(info.size).map_or(true, |end| end > seeker.layout().archive_size) {
            return Err(Error::ArchiveMalloc);
        }

        let mut raw_data = seeker.read(info.offset, info.size).map_err(|_| Error::ArchiveHashTable)?;
        decrypt_mpq_block(&mut raw_data, HASH_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(HashEntry::from_reader(&mut slice).map_err(|_| Error::ArchiveHashTable)?);
        }

        Ok(HashTable { entries })
    }

    /// Resolves `name` to its hash entry via the open-addressed probe
    /// described by the hash table's invariants: start at the table-index
    /// hash modulo the table size, walk forward wrapping around, stop at the
    /// first empty slot or on a full loop back to the start.
    pub(crate) fn find_entry(&self, name: &str) -> Option<&HashEntry> {
        let hash_mask = self.entries.len() as u32 - 1;
        let part_a = hash_string(name.as_bytes(), MPQ_HASH_NAME_A);
        let part_b = hash_string(name.as_bytes(), MPQ_HASH_NAME_B);
        let start_index = hash_string(name.as_bytes(), MPQ_HASH_TABLE_INDEX) & hash_mask;

        let mut index = start_index;
        loop {
            let inspected = &self.entries[index as usize];

            if inspected.block_index == HASH_ENTRY_EMPTY {
                return None;
            }

            if inspected.block_index != HASH_ENTRY_DELETED
                && inspected.hash_a == part_a
                && inspected.hash_b == part_b
            {
                return Some(inspected);
            }

            index = (index + 1) & hash_mask;
            if index == start_index {
                return None;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HashEntry {
    pub hash_a: u32,
    pub hash_b: u32,
    pub locale: u16,
    pub platform: u16,
    pub block_index: u32,
}

impl HashEntry {
    fn from_reader<R: Read>(mut reader: R) -> Result<HashEntry, Error> {
        let hash_a = reader.read_u32::<LE>()?;
        let hash_b = reader.read_u32::<LE>()?;
        let locale = reader.read_u16::<LE>()?;
        let platform = reader.read_u16::<LE>()?;
        let block_index = reader.read_u32::<LE>()?;

        Ok(HashEntry {
            hash_a,
            hash_b,
            locale,
            platform,
            block_index,
        })
    }
}

#[derive(Debug)]
pub(crate) struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    pub(crate) fn from_seeker<R>(seeker: &mut Seeker<R>) -> Result<BlockTable, Error>
    where
        R: Read + Seek,
    {
        let info = seeker.layout().block_table_info;

        // Guard the entries*16 multiplication against the archive's size
        // before allocating, per spec §9's integer-size-pitfalls note.
        if info.offset.checked_add(info.size).map_or(true, |end| end > seeker.layout().archive_size) {
            return Err(Error::ArchiveMalloc);
        }

        let mut raw_data = seeker.read(info.offset, info.size).map_err(|_| Error::ArchiveBlockTable)?;
        decrypt_mpq_block(&mut raw_data, BLOCK_TABLE_KEY);

        let mut entries = Vec::with_capacity(info.entries as usize);
        let mut slice = &raw_data[..];
        for _ in 0..info.entries {
            entries.push(BlockEntry::from_reader(&mut slice).map_err(|_| Error::ArchiveBlockTable)?);
        }

        Ok(BlockTable { entries })
    }

    pub(crate) fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockEntry {
    pub file_pos: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub flags: u32,
}

impl BlockEntry {
    fn from_reader<R: Read>(mut reader: R) -> Result<BlockEntry, Error> {
        let file_pos = u64::from(reader.read_u32::<LE>()?);
        let compressed_size = u64::from(reader.read_u32::<LE>()?);
        let uncompressed_size = u64::from(reader.read_u32::<LE>()?);
        let flags = reader.read_u32::<LE>()?;

        Ok(BlockEntry {
            file_pos,
            compressed_size,
            uncompressed_size,
            flags,
        })
    }

    pub(crate) fn exists(&self) -> bool {
        (self.flags & MPQ_FILE_EXISTS) != 0
    }

    pub(crate) fn is_single_unit(&self) -> bool {
        (self.flags & MPQ_FILE_SINGLE_UNIT) != 0
    }

    pub(crate) fn is_imploded(&self) -> bool {
        (self.flags & MPQ_FILE_IMPLODE) != 0
    }

    pub(crate) fn is_compressed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS) != 0
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        (self.flags & MPQ_FILE_ENCRYPTED) != 0
    }

    pub(crate) fn is_key_adjusted(&self) -> bool {
        (self.flags & MPQ_FILE_ADJUST_KEY) != 0
    }

    pub(crate) fn is_patch(&self) -> bool {
        (self.flags & MPQ_FILE_PATCH_FILE) != 0
    }
}

/// The per-sector offset index that precedes a file's sector bodies when it
/// is both split into sectors and either compressed or imploded. Holds
/// `sector_count + 1` monotonically increasing offsets, so that sector `i`
/// spans `offsets[i]..offsets[i + 1]`.
#[derive(Debug)]
pub(crate) struct SectorOffsets {
    offsets: Vec<u32>,
}

impl SectorOffsets {
    pub(crate) fn from_seeker<R>(
        seeker: &mut Seeker<R>,
        block_entry: &BlockEntry,
        encryption_key: Option<u32>,
    ) -> Result<SectorOffsets, Error>
    where
        R: Read + Seek,
    {
        let sector_count =
            sector_count_from_size(block_entry.uncompressed_size, seeker.layout().sector_size);

        // Guard the (sector_count + 1) * 4 multiplication against the file's
        // compressed span before allocating, per spec §9's
        // integer-size-pitfalls note: a corrupt uncompressed_size shouldn't
        // be able to ask for an offset table bigger than the file itself.
        let table_size = (sector_count + 1)
            .checked_mul(4)
            .filter(|&size| size <= block_entry.compressed_size)
            .ok_or(Error::FileMalloc)?;

        let mut raw_data = seeker.read(block_entry.file_pos, table_size)?;

        if let Some(key) = encryption_key {
            decrypt_mpq_block(&mut raw_data, key);
        }

        let mut slice = &raw_data[..];
        let mut offsets = vec![0u32; (sector_count + 1) as usize];
        for offset in offsets.iter_mut() {
            *offset = slice.read_u32::<LE>()?;
        }

        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::FileCorrupt);
        }

        // The last entry is the index's own claimed end of the sector span;
        // it must not overrun the file's compressed size (spec §3/§8).
        if *offsets.last().unwrap() as u64 > block_entry.compressed_size {
            return Err(Error::FileCorrupt);
        }

        Ok(SectorOffsets { offsets })
    }

    /// Start offset and byte length of sector `index`, relative to the
    /// file's first sector.
    pub(crate) fn sector(&self, index: usize) -> Option<(u32, u32)> {
        if index + 1 >= self.offsets.len() {
            None
        } else {
            Some((self.offsets[index], self.offsets[index + 1] - self.offsets[index]))
        }
    }

    pub(crate) fn span(&self) -> (u32, u32) {
        let last = self.offsets.len() - 1;
        (self.offsets[0], self.offsets[last] - self.offsets[0])
    }

    pub(crate) fn sector_count(&self) -> usize {
        self.offsets.len() - 1
    }
}
