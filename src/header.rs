use std::io::Read;

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::error::Error;

/// The fixed 32-byte MPQ header. Offsets inside it (`hash_table_offset`,
/// `block_table_offset`) are relative to the archive's resolved origin, not
/// to the start of the host file.
#[derive(Debug)]
pub(crate) struct FileHeader {
    pub magic: u32,
    pub header_size: u32,
    pub archive_size: u32,
    pub format_version: u16,
    pub block_size_shift: u16,
    pub hash_table_offset: u32,
    pub block_table_offset: u32,
    pub hash_table_entries: u32,
    pub block_table_entries: u32,
}

impl FileHeader {
    /// Reads a header from `reader` without validating it; validation
    /// (signature, length, offset bounds) happens in the scan loop in
    /// `seeker`, which needs to try several candidate positions.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<FileHeader, Error> {
        let magic = reader.read_u32::<LE>()?;
        let header_size = reader.read_u32::<LE>()?;
        let archive_size = reader.read_u32::<LE>()?;
        let format_version = reader.read_u16::<LE>()?;
        let block_size_shift = reader.read_u16::<LE>()?;
        let hash_table_offset = reader.read_u32::<LE>()?;
        let block_table_offset = reader.read_u32::<LE>()?;
        let hash_table_entries = reader.read_u32::<LE>()?;
        let block_table_entries = reader.read_u32::<LE>()?;

        Ok(FileHeader {
            magic,
            header_size,
            archive_size,
            format_version,
            block_size_shift,
            hash_table_offset,
            block_table_offset,
            hash_table_entries,
            block_table_entries,
        })
    }
}

/// The small header that precedes some archives (`MPQ\x1B`), pointing
/// forward to the real header at `file_header_offset`.
#[derive(Debug)]
pub(crate) struct UserHeader {
    pub user_data_size: u32,
    pub file_header_offset: u32,
}

impl UserHeader {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<UserHeader, Error> {
        let user_data_size = reader.read_u32::<LE>()?;
        let file_header_offset = reader.read_u32::<LE>()?;
        // remaining field (user_data_header_size) is not needed by this crate.

        Ok(UserHeader {
            user_data_size,
            file_header_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_header(magic: u32, header_size: u32, hash_off: u32, block_off: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&magic.to_le_bytes());
        buf.extend_from_slice(&header_size.to_le_bytes());
        buf.extend_from_slice(&0x1000u32.to_le_bytes()); // archive_size
        buf.extend_from_slice(&0u16.to_le_bytes()); // format_version
        buf.extend_from_slice(&3u16.to_le_bytes()); // block_size_shift
        buf.extend_from_slice(&hash_off.to_le_bytes());
        buf.extend_from_slice(&block_off.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes()); // hash_table_entries
        buf.extend_from_slice(&1u32.to_le_bytes()); // block_table_entries
        buf
    }

    #[test]
    fn reads_all_fields_in_order() {
        let buf = raw_header(HEADER_MPQ_MAGIC, HEADER_MPQ_SIZE as u32, 0x20, 0x30);
        let header = FileHeader::from_reader(Cursor::new(buf)).unwrap();

        assert_eq!(header.magic, HEADER_MPQ_MAGIC);
        assert_eq!(header.header_size, HEADER_MPQ_SIZE as u32);
        assert_eq!(header.hash_table_offset, 0x20);
        assert_eq!(header.block_table_offset, 0x30);
        assert_eq!(header.block_size_shift, 3);
    }
}
