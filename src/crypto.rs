//! The MPQ stream cipher and its supporting hash families.
//!
//! Everything here hangs off one 1,280-entry table built from a linear
//! congruential generator; see [`CRYPTO_TABLE`] below.

use byte_slice_cast::*;
use lazy_static::lazy_static;

use super::consts::*;

lazy_static! {
    /// The precomputed key table, shared across every archive in the
    /// process. Building it is a pure function of no input, so sharing it
    /// behind a `lazy_static` instead of owning a copy per `Archive` costs
    /// nothing and avoids rebuilding it per archive.
    static ref CRYPTO_TABLE: [u32; 0x500] = generate_crypto_table();
}

fn generate_crypto_table() -> [u32; 0x500] {
    let mut crypto_table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for i in 0..0x100 {
        for j in 0..5 {
            let index = i + j * 0x100;
            seed = (seed.wrapping_mul(125).wrapping_add(3)) % 0x0002_AAAB;
            let t1 = (seed & 0xFFFF) << 0x10;
            seed = (seed.wrapping_mul(125).wrapping_add(3)) % 0x0002_AAAB;
            let t2 = seed & 0xFFFF;

            crypto_table[index] = t1 | t2;
        }
    }

    crypto_table
}

/// Computes one of the four hash families for `source`. `hash_type` is one
/// of the `MPQ_HASH_*` offsets into the crypto table. Bytes are uppercased
/// and path-separator-normalized first, so `hash_string(b"a/b", ..)` and
/// `hash_string(b"A\\B", ..)` always agree.
pub(crate) fn hash_string(source: &[u8], hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for &byte in source {
        let upper = u32::from(ASCII_UPPER_LOOKUP[byte as usize]);

        seed1 = CRYPTO_TABLE[(hash_type + upper) as usize] ^ seed1.wrapping_add(seed2);
        seed2 = upper
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

/// Decrypts `data` in place with `key`. `data` is treated as an array of
/// little-endian `u32` words; any trailing bytes that don't fill out a full
/// word are left untouched, per spec (this only ever happens on truncated
/// tables, never on well-formed archives).
pub(crate) fn decrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let word_count = data.len() / 4;
    let mut seed: u32 = 0xEEEE_EEEE;

    let words = data[..word_count * 4].as_mut_slice_of::<u32>().unwrap();

    for word in words.iter_mut() {
        seed = seed.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let plaintext = *word ^ key.wrapping_add(seed);
        *word = plaintext;

        key = (!key << 0x15).wrapping_add(0x1111_1111) | (key >> 0x0B);
        seed = plaintext
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Encrypts `data` in place with `key`; the inverse of [`decrypt_mpq_block`].
/// The read path never calls this, but a stream cipher is easiest to trust
/// with both halves present, and the involution property is one of the
/// crate's testable invariants.
#[cfg(test)]
pub(crate) fn encrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let word_count = data.len() / 4;
    let mut seed: u32 = 0xEEEE_EEEE;

    let words = data[..word_count * 4].as_mut_slice_of::<u32>().unwrap();

    for word in words.iter_mut() {
        let plaintext = *word;

        seed = seed.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);
        *word = plaintext ^ key.wrapping_add(seed);

        key = (!key << 0x15).wrapping_add(0x1111_1111) | (key >> 0x0B);
        seed = plaintext
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
    }
}

/// Strips any directory prefix, matching on either path separator.
pub(crate) fn plain_file_name(name: &str) -> &str {
    let bytes = name.as_bytes();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\\' || b == b'/' {
            start = i + 1;
        }
    }

    &name[start..]
}

/// Computes the per-file decryption key used for a file's sectors and its
/// sector-offset table. When `adjusted` (the block's `FIX_SEED`/"adjust
/// key" flag) is set, the key is additionally mixed with the file's
/// archive-relative start offset and its uncompressed size.
pub(crate) fn calculate_file_key(file_name: &str, file_pos: u32, file_size: u32, adjusted: bool) -> u32 {
    let plain_name = plain_file_name(file_name);
    let mut key = hash_string(plain_name.as_bytes(), MPQ_HASH_FILE_KEY);

    if adjusted {
        key = key.wrapping_add(file_pos) ^ file_size;
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_table_is_deterministic() {
        let a = generate_crypto_table();
        let b = generate_crypto_table();
        assert_eq!(a.to_vec(), b.to_vec());
        assert_eq!(a.len(), 1280);
    }

    #[test]
    fn table_key_constants_match_hash_string() {
        assert_eq!(
            hash_string(b"(hash table)", MPQ_HASH_FILE_KEY),
            HASH_TABLE_KEY
        );
        assert_eq!(
            hash_string(b"(block table)", MPQ_HASH_FILE_KEY),
            BLOCK_TABLE_KEY
        );
    }

    #[test]
    fn filename_normalization_is_slash_and_case_insensitive() {
        assert_eq!(
            hash_string(b"a/b", MPQ_HASH_NAME_A),
            hash_string(b"A\\B", MPQ_HASH_NAME_A)
        );
        assert_eq!(
            hash_string(b"a/b", MPQ_HASH_TABLE_INDEX),
            hash_string(b"A\\B", MPQ_HASH_TABLE_INDEX)
        );
    }

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let mut data: Vec<u8> = (0..64u8).collect();
        let original = data.clone();

        encrypt_mpq_block(&mut data, 0xDEAD_BEEF);
        assert_ne!(data, original);

        decrypt_mpq_block(&mut data, 0xDEAD_BEEF);
        assert_eq!(data, original);
    }

    #[test]
    fn decrypt_leaves_trailing_unaligned_bytes_untouched() {
        let mut data = vec![0xAAu8; 6];
        let original = data.clone();

        decrypt_mpq_block(&mut data, 0x1234_5678);

        assert_eq!(data[4..], original[4..]);
    }

    #[test]
    fn plain_file_name_strips_either_separator() {
        assert_eq!(plain_file_name("a\\b\\c.txt"), "c.txt");
        assert_eq!(plain_file_name("a/b/c.txt"), "c.txt");
        assert_eq!(plain_file_name("c.txt"), "c.txt");
    }
}
