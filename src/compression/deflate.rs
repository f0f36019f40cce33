//! Plain zlib/DEFLATE decompression (mask bit 0x02).

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::super::error::Error;

pub(super) fn decompress(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(uncompressed_size);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| Error::FileDecompress)?;

    Ok(out)
}
