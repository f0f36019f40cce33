//! BZip2 (mask bit 0x10) is declared by the format but out of scope here;
//! archives using it fail cleanly instead of being silently misread.

use super::super::error::Error;

pub(super) fn decompress(_data: &[u8], _uncompressed_size: usize) -> Result<Vec<u8>, Error> {
    Err(Error::FileDecompress)
}
