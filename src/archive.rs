use std::io::{Read, Seek};

use super::compression::decode_sector;
use super::consts::*;
use super::crypto::calculate_file_key;
use super::error::Error;
use super::seeker::Seeker;
use super::table::{BlockEntry, BlockTable, HashTable, SectorOffsets};

/// A read-only view over an MPQ archive.
///
/// Opening locates the header, hash table, and block table up front; no
/// other bytes are touched until a specific file is asked for. Works on any
/// reader that implements `Read + Seek`.
pub struct Archive<R: Read + Seek> {
    seeker: Seeker<R>,
    hash_table: HashTable,
    block_table: BlockTable,
}

/// Summary of an archive's bookkeeping, independent of any one file.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveInfo {
    pub archive_size: u64,
    pub sector_size: u64,
    pub hash_table_entries: u64,
    pub block_table_entries: u64,
    pub protected: bool,
}

/// Per-file bookkeeping as recorded in the block table.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub flags: u32,
}

impl FileInfo {
    /// Whether this block-table slot is actually occupied by a file.
    pub fn exists(&self) -> bool {
        (self.flags & MPQ_FILE_EXISTS) != 0
    }

    /// Whole-file PKWARE implode with no per-sector method byte.
    pub fn is_imploded(&self) -> bool {
        (self.flags & MPQ_FILE_IMPLODE) != 0
    }

    /// Per-sector compression, with a method mask byte leading each sector.
    pub fn is_compressed(&self) -> bool {
        (self.flags & MPQ_FILE_COMPRESS) != 0
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & MPQ_FILE_ENCRYPTED) != 0
    }

    /// Whether the decryption key is additionally mixed with this file's
    /// start offset and uncompressed size (the `FIX_SEED` flag).
    pub fn is_key_adjusted(&self) -> bool {
        (self.flags & MPQ_FILE_ADJUST_KEY) != 0
    }

    pub fn is_single_unit(&self) -> bool {
        (self.flags & MPQ_FILE_SINGLE_UNIT) != 0
    }

    pub fn is_patch(&self) -> bool {
        (self.flags & MPQ_FILE_PATCH_FILE) != 0
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Opens an MPQ archive from `reader`.
    ///
    /// Locates the header, then reads and decrypts the hash table and block
    /// table. If any of these steps fail, the archive is corrupt and an
    /// appropriate error is returned. No file bodies are read yet.
    pub fn open(reader: R) -> Result<Archive<R>, Error> {
        let mut seeker = Seeker::new(reader)?;

        let hash_table = HashTable::from_seeker(&mut seeker)?;
        let block_table = BlockTable::from_seeker(&mut seeker)?;

        Ok(Archive {
            seeker,
            hash_table,
            block_table,
        })
    }

    /// Whether the header carried the W3M protected-archive sentinel
    /// instead of its real length.
    pub fn is_protected(&self) -> bool {
        self.seeker.layout().protected
    }

    pub fn archive_info(&self) -> ArchiveInfo {
        let layout = self.seeker.layout();

        ArchiveInfo {
            archive_size: layout.archive_size,
            sector_size: layout.sector_size,
            hash_table_entries: layout.hash_table_info.entries,
            block_table_entries: layout.block_table_info.entries,
            protected: layout.protected,
        }
    }

    /// Resolves `name` to a 1-based block index, case-insensitively and
    /// treating `/` and `\` as equivalent. The hash entry's `block_index`
    /// field is stored 0-based; this adds one so the result is directly
    /// usable with [`Archive::file_extract`] and [`Archive::file_info`],
    /// which both take the spec's 1-based file index (§4.5).
    pub fn file_index(&self, name: &str) -> Result<usize, Error> {
        self.hash_table
            .find_entry(name)
            .map(|entry| entry.block_index as usize + 1)
            .ok_or(Error::FileExist)
    }

    pub fn file_info(&self, index: usize) -> Result<FileInfo, Error> {
        let entry = self.block_entry(index)?;

        Ok(FileInfo {
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            flags: entry.flags,
        })
    }

    /// Reads and decompresses a file's full contents by name.
    ///
    /// Filename resolution is case-insensitive and treats `\` and `/` as
    /// the same separator.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let index = self.file_index(name)?;
        self.file_extract(index, Some(name))
    }

    /// Reads and decompresses a file's full contents by block index, for
    /// callers that already have one (for instance from [`Archive::listfile`]
    /// cross-referenced with [`Archive::file_index`]).
    pub fn file_extract(&mut self, index: usize, name: Option<&str>) -> Result<Vec<u8>, Error> {
        let entry = self.block_entry(index)?;

        let file_key = if entry.is_encrypted() {
            let name = name.ok_or(Error::FileCorrupt)?;
            Some(calculate_file_key(
                name,
                entry.file_pos as u32,
                entry.uncompressed_size as u32,
                entry.is_key_adjusted(),
            ))
        } else {
            None
        };

        if entry.is_single_unit() {
            self.read_single_unit(entry, file_key)
        } else {
            self.read_sectored(entry, file_key)
        }
    }

    /// `index` is the 1-based file index the public API deals in (spec
    /// §4.5's `resolve_by_index`); slot 0 and anything past the end of the
    /// block table are both out of range rather than aliasing entry 0.
    fn block_entry(&self, index: usize) -> Result<BlockEntry, Error> {
        let slot = index.checked_sub(1).ok_or(Error::FileRange)?;
        let entry = *self.block_table.get(slot).ok_or(Error::FileRange)?;

        if !entry.exists() {
            return Err(Error::FileExist);
        }

        Ok(entry)
    }

    fn read_single_unit(&mut self, entry: BlockEntry, file_key: Option<u32>) -> Result<Vec<u8>, Error> {
        let raw = self.seeker.read(entry.file_pos, entry.compressed_size)?;
        let pkware_only = entry.is_imploded() && !entry.is_compressed();
        decode_sector(&raw, entry.uncompressed_size, file_key, pkware_only)
    }

    fn read_sectored(&mut self, entry: BlockEntry, file_key: Option<u32>) -> Result<Vec<u8>, Error> {
        if !(entry.is_compressed() || entry.is_imploded()) {
            // no sector offset table: the whole span is stored verbatim
            let raw = self.seeker.read(entry.file_pos, entry.compressed_size)?;
            return decode_sector(&raw, entry.uncompressed_size, file_key, false);
        }

        let pkware_only = entry.is_imploded() && !entry.is_compressed();

        // the sector offset table itself is keyed one below the file key
        let sector_key = file_key.map(|k| k.wrapping_sub(1));
        let offsets = SectorOffsets::from_seeker(&mut self.seeker, &entry, sector_key)?;

        let (span_start, span_len) = offsets.span();
        let raw = self
            .seeker
            .read(entry.file_pos + u64::from(span_start), u64::from(span_len))?;

        let sector_size = self.seeker.layout().sector_size;
        let sector_count = offsets.sector_count();
        let mut out = Vec::with_capacity(entry.uncompressed_size as usize);

        let base = offsets.sector(0).ok_or(Error::FileCorrupt)?.0;
        for i in 0..sector_count {
            let (start, len) = offsets.sector(i).ok_or(Error::FileCorrupt)?;
            let slice_start = (start - base) as usize;
            let slice_end = slice_start + len as usize;

            let uncompressed_len = if i + 1 == sector_count {
                let remainder = entry.uncompressed_size % sector_size;
                if remainder == 0 {
                    sector_size
                } else {
                    remainder
                }
            } else {
                sector_size
            };

            let sector_key = file_key.map(|k| k.wrapping_add(i as u32));
            let sector_data = decode_sector(
                &raw[slice_start..slice_end],
                uncompressed_len,
                sector_key,
                pkware_only,
            )?;

            out.extend_from_slice(&sector_data);
        }

        Ok(out)
    }

    /// If the archive carries a `(listfile)` entry, parses it into the
    /// filenames it lists. This is a convenience layered on top of the
    /// index-based core above: an MPQ archive has no authoritative file
    /// list, only this optional, community-convention text file.
    pub fn listfile(&mut self) -> Option<Vec<String>> {
        let data = self.read_file("(listfile)").ok()?;
        let text = String::from_utf8_lossy(&data);

        Some(
            text.lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
        )
    }

    /// Looks up a file's name by cross-referencing the block index against
    /// `(listfile)`, since the block table itself stores no names. When no
    /// listfile is present (or it doesn't list this index), falls back to
    /// the synthetic `fileNNNNNN.xxx` identity spec §9 describes, so a
    /// caller always gets a usable name for any file that exists.
    pub fn file_name(&mut self, index: usize) -> Option<String> {
        self.block_entry(index).ok()?;

        if let Some(names) = self.listfile() {
            if let Some(name) = names
                .into_iter()
                .find(|name| self.file_index(name).map_or(false, |i| i == index))
            {
                return Some(name);
            }
        }

        Some(synthetic_file_name(index))
    }
}

/// The spec's synthetic filename convention for files with no recovered
/// real name: `file000001.xxx`, `file000002.xxx`, and so on. `index` is
/// already the public 1-based file index.
fn synthetic_file_name(index: usize) -> String {
    format!("file{:06}.xxx", index)
}

/// The crate's own version, exposed so callers can log it alongside archive
/// diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn empty_reader() -> Cursor<Vec<u8>> {
        Cursor::new(Vec::new())
    }

    #[test]
    fn open_rejects_empty_input() {
        let err = Archive::open(empty_reader()).unwrap_err();
        assert!(matches!(err, Error::ArchiveFormat));
    }

    #[test]
    fn version_matches_cargo_manifest() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn end_to_end_reads_a_minimal_synthetic_archive() {
        use super::super::consts::*;
        use super::super::crypto::{encrypt_mpq_block, hash_string};

        let file_data = b"hello world";
        let hash_table_offset = HEADER_MPQ_SIZE as u32;
        let block_table_offset = hash_table_offset + 16;
        let file_offset = block_table_offset + 16;

        let mut archive = Vec::new();
        archive.extend_from_slice(&HEADER_MPQ_MAGIC.to_le_bytes());
        archive.extend_from_slice(&(HEADER_MPQ_SIZE as u32).to_le_bytes());
        archive.extend_from_slice(&(file_offset + file_data.len() as u32).to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes()); // format_version
        archive.extend_from_slice(&3u16.to_le_bytes()); // block_size_shift
        archive.extend_from_slice(&hash_table_offset.to_le_bytes());
        archive.extend_from_slice(&block_table_offset.to_le_bytes());
        archive.extend_from_slice(&1u32.to_le_bytes()); // hash_table_entries
        archive.extend_from_slice(&1u32.to_le_bytes()); // block_table_entries

        let hash_a = hash_string(b"test.txt", MPQ_HASH_NAME_A);
        let hash_b = hash_string(b"test.txt", MPQ_HASH_NAME_B);
        let mut hash_entry = Vec::new();
        hash_entry.extend_from_slice(&hash_a.to_le_bytes());
        hash_entry.extend_from_slice(&hash_b.to_le_bytes());
        hash_entry.extend_from_slice(&0u16.to_le_bytes()); // locale
        hash_entry.extend_from_slice(&0u16.to_le_bytes()); // platform
        hash_entry.extend_from_slice(&0u32.to_le_bytes()); // block_index
        encrypt_mpq_block(&mut hash_entry, HASH_TABLE_KEY);
        archive.extend_from_slice(&hash_entry);

        let mut block_entry = Vec::new();
        block_entry.extend_from_slice(&file_offset.to_le_bytes());
        block_entry.extend_from_slice(&(file_data.len() as u32).to_le_bytes());
        block_entry.extend_from_slice(&(file_data.len() as u32).to_le_bytes());
        block_entry.extend_from_slice(&(MPQ_FILE_EXISTS | MPQ_FILE_SINGLE_UNIT).to_le_bytes());
        encrypt_mpq_block(&mut block_entry, BLOCK_TABLE_KEY);
        archive.extend_from_slice(&block_entry);

        archive.extend_from_slice(file_data);

        let mut mpq = Archive::open(Cursor::new(archive)).unwrap();
        let contents = mpq.read_file("test.txt").unwrap();
        assert_eq!(contents, file_data);
        assert!(!mpq.is_protected());

        // spec §4.5 resolves files by a 1-based index; §8 scenario 6
        // requires both index 0 and one past the end of the block table to
        // read as out of range, not alias a real entry.
        assert!(matches!(mpq.file_extract(0, None).unwrap_err(), Error::FileRange));
        assert!(matches!(mpq.file_extract(2, None).unwrap_err(), Error::FileRange));
        assert_eq!(mpq.file_index("test.txt").unwrap(), 1);
    }
}
