//! Locating the MPQ header inside a host file and translating
//! archive-relative offsets into host-file offsets.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};

use super::consts::*;
use super::error::Error;
use super::header::*;

/// Owns the reader and everything derived from the header once it has been
/// located: table positions/sizes, sector size, and the archive's origin
/// inside the host file.
#[derive(Debug)]
pub(crate) struct Seeker<R: Read + Seek> {
    reader: R,
    layout: ArchiveLayout,
}

impl<R: Read + Seek> Seeker<R> {
    pub(crate) fn new(mut reader: R) -> Result<Seeker<R>, Error> {
        let layout = find_header(&mut reader)?;

        Ok(Seeker { reader, layout })
    }

    fn host_offset(&self, archive_relative_offset: u64) -> u64 {
        archive_relative_offset + self.layout.archive_origin
    }

    pub(crate) fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Reads `size` bytes at archive-relative `offset`, bounds-checked
    /// against the host file's length.
    pub(crate) fn read(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let host_offset = self.host_offset(offset);

        if host_offset.checked_add(size).map_or(true, |end| end > self.layout.file_size) {
            return Err(Error::FileCorrupt);
        }

        self.reader.seek(SeekFrom::Start(host_offset))?;
        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact(&mut buf)?;

        Ok(buf)
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct TableInfo {
    pub entries: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug)]
pub(crate) struct ArchiveLayout {
    pub hash_table_info: TableInfo,
    pub block_table_info: TableInfo,

    pub sector_size: u64,
    pub file_size: u64,
    pub archive_size: u64,
    pub archive_origin: u64,
    /// Set when the header's length field held the W3M protection sentinel
    /// instead of the real header length (spec §4.4.b).
    pub protected: bool,
}

impl ArchiveLayout {
    fn from_header(
        file_size: u64,
        archive_origin: u64,
        header: &FileHeader,
        protected: bool,
    ) -> ArchiveLayout {
        let hash_table_info = TableInfo {
            entries: u64::from(header.hash_table_entries),
            offset: u64::from(header.hash_table_offset),
            size: u64::from(header.hash_table_entries) * u64::from(HASH_TABLE_ENTRY_SIZE),
        };

        let block_table_info = TableInfo {
            entries: u64::from(header.block_table_entries),
            offset: u64::from(header.block_table_offset),
            size: u64::from(header.block_table_entries) * u64::from(BLOCK_TABLE_ENTRY_SIZE),
        };

        let sector_size = 512u64 << u64::from(header.block_size_shift);

        ArchiveLayout {
            hash_table_info,
            block_table_info,
            sector_size,
            file_size,
            archive_size: u64::from(header.archive_size),
            archive_origin,
            protected,
        }
    }
}

/// Applies the W3M protected-archive correction (spec §4.4.b): some map
/// protectors deliberately write a bogus header length to confuse naive
/// parsers. Any length that isn't the true 32-byte header size is treated
/// as that sentinel, corrected, and flagged.
fn normalize_header(mut header: FileHeader) -> (FileHeader, bool) {
    if header.header_size != HEADER_MPQ_SIZE as u32 {
        header.header_size = HEADER_MPQ_SIZE as u32;
        (header, true)
    } else {
        (header, false)
    }
}

fn header_is_valid(header: &FileHeader, file_size: u64, origin: u64) -> bool {
    header.magic == HEADER_MPQ_MAGIC
        && header.header_size == HEADER_MPQ_SIZE as u32
        && u64::from(header.hash_table_offset) < u64::from(header.archive_size)
        && u64::from(header.block_table_offset) < u64::from(header.archive_size)
        && origin + u64::from(header.hash_table_offset) < file_size
        && origin + u64::from(header.block_table_offset) < file_size
}

/// Scans the host file at `HEADER_BOUNDARY` strides looking for a valid MPQ
/// header, following a leading `MPQ\x1B` user-data header if present.
fn find_header<R: Read + Seek>(reader: &mut R) -> Result<ArchiveLayout, Error> {
    let file_size = reader.seek(SeekFrom::End(0))?;

    let mut origin = 0u64;
    while origin + HEADER_MPQ_SIZE as u64 <= file_size {
        reader.seek(SeekFrom::Start(origin))?;
        let magic = reader.read_u32::<LE>()?;

        if magic == HEADER_USER_MAGIC {
            reader.seek(SeekFrom::Start(origin + 4))?;
            let user_header = UserHeader::from_reader(&mut *reader)?;
            let target = origin + u64::from(user_header.file_header_offset);

            if target + HEADER_MPQ_SIZE as u64 > file_size {
                return Err(Error::ArchiveFormat);
            }

            reader.seek(SeekFrom::Start(target))?;
            let header = FileHeader::from_reader(&mut *reader)?;
            let (header, protected) = normalize_header(header);

            return if header_is_valid(&header, file_size, target) {
                Ok(ArchiveLayout::from_header(file_size, target, &header, protected))
            } else {
                Err(Error::ArchiveFormat)
            };
        } else if magic == HEADER_MPQ_MAGIC {
            reader.seek(SeekFrom::Start(origin))?;
            let header = FileHeader::from_reader(&mut *reader)?;
            let (header, protected) = normalize_header(header);

            if header_is_valid(&header, file_size, origin) {
                return Ok(ArchiveLayout::from_header(file_size, origin, &header, protected));
            }
        }

        origin += HEADER_BOUNDARY;
    }

    Err(Error::ArchiveFormat)
}
