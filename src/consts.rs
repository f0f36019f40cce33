//! Every magic number the MPQ format defines, gathered in one place.

/// Signature of a primary MPQ header: bytes `M`, `P`, `Q`, `0x1A` read
/// little-endian.
pub(crate) const HEADER_MPQ_MAGIC: u32 = 0x1A51_504D;

/// Signature of a "user data" header, a small indirection some archives
/// (SC2 replays, some protected W3X maps) prepend before the real header.
pub(crate) const HEADER_USER_MAGIC: u32 = 0x1B51_504D;

/// Size in bytes of the on-disk (version 0) MPQ header.
pub(crate) const HEADER_MPQ_SIZE: usize = 32;

/// Size in bytes of the user data header's own fixed fields.
pub(crate) const HEADER_USER_SIZE: usize = 16;

/// Candidate header positions are tried every 0x200 bytes.
pub(crate) const HEADER_BOUNDARY: u64 = 0x200;

/// Hash-family starting offsets into the crypto table (spec-given offsets
/// `0x000`, `0x100`, `0x200`, `0x300`).
pub(crate) const MPQ_HASH_TABLE_INDEX: u32 = 0x0000_0000;
pub(crate) const MPQ_HASH_NAME_A: u32 = 0x0000_0100;
pub(crate) const MPQ_HASH_NAME_B: u32 = 0x0000_0200;
pub(crate) const MPQ_HASH_FILE_KEY: u32 = 0x0000_0300;
pub(crate) const MPQ_HASH_KEY2_MIX: u32 = 0x0000_0400;

pub(crate) const HASH_TABLE_ENTRY_SIZE: u32 = 16;
pub(crate) const BLOCK_TABLE_ENTRY_SIZE: u32 = 16;

/// Encryption keys for the hash/block tables: `hash_string("(hash table)",
/// MPQ_HASH_FILE_KEY)` and `hash_string("(block table)", MPQ_HASH_FILE_KEY)`
/// respectively. Hardcoded rather than computed at startup, and checked
/// against a live `hash_string` call in `crypto::tests`.
pub(crate) const HASH_TABLE_KEY: u32 = 0xC3AF_3770;
pub(crate) const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;

/// A hash entry whose block index is this value is unoccupied and
/// terminates an open-addressed probe.
pub(crate) const HASH_ENTRY_EMPTY: u32 = 0xFFFF_FFFF;
/// A hash entry whose block index is this value used to hold a file that
/// was since deleted; it must be skipped, not treated as a probe terminator.
pub(crate) const HASH_ENTRY_DELETED: u32 = 0xFFFF_FFFE;

/// Block table flag bits.
pub(crate) const MPQ_FILE_IMPLODE: u32 = 0x0000_0100;
pub(crate) const MPQ_FILE_COMPRESS: u32 = 0x0000_0200;
pub(crate) const MPQ_FILE_ENCRYPTED: u32 = 0x0001_0000;
pub(crate) const MPQ_FILE_ADJUST_KEY: u32 = 0x0002_0000;
pub(crate) const MPQ_FILE_PATCH_FILE: u32 = 0x0010_0000;
pub(crate) const MPQ_FILE_SINGLE_UNIT: u32 = 0x0100_0000;
pub(crate) const MPQ_FILE_EXISTS: u32 = 0x8000_0000;

/// Compression method mask bits, read from the first byte of a
/// multi-compressed sector body. Fixed dispatch order, per spec.
pub(crate) const COMPRESSION_HUFFMAN: u8 = 0x01;
pub(crate) const COMPRESSION_ZLIB: u8 = 0x02;
pub(crate) const COMPRESSION_PKWARE: u8 = 0x08;
pub(crate) const COMPRESSION_BZIP2: u8 = 0x10;
pub(crate) const COMPRESSION_ADPCM_MONO: u8 = 0x40;
pub(crate) const COMPRESSION_ADPCM_STEREO: u8 = 0x80;

/// Uppercasing + path-separator-normalizing lookup table used by every hash
/// family (spec: "forward slashes map to backslashes, lowercase to
/// uppercase"). Built once at module load instead of computed per byte.
pub(crate) static ASCII_UPPER_LOOKUP: [u8; 256] = build_ascii_upper_lookup();

const fn build_ascii_upper_lookup() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = if b == b'/' {
            b'\\'
        } else if b.is_ascii_lowercase() {
            b - 32
        } else {
            b
        };
        i += 1;
    }
    table
}
