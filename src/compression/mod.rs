//! The sector decompression pipeline.
//!
//! A compressed sector's body starts with one byte: a bitmask of which
//! codecs were stacked on top of each other when it was written. Codecs are
//! always applied, and must always be undone, in the fixed order below
//! regardless of which bits are actually set.

mod adpcm;
mod bzip2;
mod deflate;
mod huffman;
mod pkware;

use super::consts::*;
use super::error::Error;

type Stage = fn(&[u8], usize) -> Result<Vec<u8>, Error>;

const PIPELINE: &[(u8, Stage)] = &[
    (COMPRESSION_HUFFMAN, huffman::decompress),
    (COMPRESSION_ZLIB, deflate::decompress),
    (COMPRESSION_PKWARE, pkware::decompress),
    (COMPRESSION_BZIP2, bzip2::decompress),
    (COMPRESSION_ADPCM_MONO, adpcm::decompress_mono),
    (COMPRESSION_ADPCM_STEREO, adpcm::decompress_stereo),
];

/// Decrypts (if `key` is given) and decompresses one sector body.
///
/// A sector whose raw length already equals `uncompressed_size` was stored
/// without compression and is returned as-is — this is the common case for
/// the last, short sector of many files and must be checked before looking
/// at the mask byte, since a stored sector has no mask byte at all.
///
/// `pkware_only` is set for files whose block-table entry carries the
/// implode flag without the general-purpose compress flag: the entire body
/// is a single PKWARE stream with no leading mask byte, since there was
/// never a choice of codec to record (spec §4.3 step 1).
pub(crate) fn decode_sector(
    data: &[u8],
    uncompressed_size: u64,
    key: Option<u32>,
    pkware_only: bool,
) -> Result<Vec<u8>, Error> {
    let mut data = data.to_vec();
    if let Some(key) = key {
        super::crypto::decrypt_mpq_block(&mut data, key);
    }

    if data.is_empty() || data.len() as u64 == uncompressed_size {
        return Ok(data);
    }

    if pkware_only {
        return pkware::decompress(&data, uncompressed_size as usize);
    }

    let mask = data[0];
    let stages: Vec<&(u8, Stage)> = PIPELINE.iter().filter(|(bit, _)| mask & bit != 0).collect();

    // Must be checked before the final size comparison below: a mask that
    // matches no known codec must fail here rather than fall through to a
    // length check that could spuriously pass.
    if stages.is_empty() {
        return Err(Error::FileDecompress);
    }

    let mut buf = data[1..].to_vec();
    for (_, stage) in stages {
        buf = stage(&buf, uncompressed_size as usize)?;
    }

    if buf.len() as u64 != uncompressed_size {
        return Err(Error::FileDecompress);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_stored_sectors_unchanged() {
        let data = vec![1, 2, 3, 4];
        let out = decode_sector(&data, 4, None, false).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn rejects_unknown_compression_mask() {
        // spec §4.3 step 6 / §8: a mask matching zero known codecs must
        // fail with FILE_ERROR_DECOMPRESS, same kind as any other
        // decompression failure.
        let data = vec![0x20, 0xAA, 0xBB];
        let err = decode_sector(&data, 8, None, false).unwrap_err();
        assert!(matches!(err, Error::FileDecompress));
    }

    #[test]
    fn bzip2_mask_is_explicitly_unsupported() {
        let data = vec![COMPRESSION_BZIP2, 0, 0, 0];
        let err = decode_sector(&data, 8, None, false).unwrap_err();
        assert!(matches!(err, Error::FileDecompress));
    }

    #[test]
    fn pkware_only_files_skip_the_mask_byte() {
        // a whole-file-imploded sector has no mask byte: byte 0 is part of
        // the PKWARE header (literal_mode), not a codec bitmask.
        let mut body = vec![0u8, 4u8]; // literal_mode=0 (raw uncoded literals), dict_bits=4
        body.extend_from_slice(&[0xFFu8; 4]);
        let err = decode_sector(&body, 100, None, true).unwrap_err();
        // undersized/garbage stream still routes straight into pkware, not
        // treated as an unknown mask.
        assert!(matches!(err, Error::FileDecompress));
    }
}
