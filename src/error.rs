use std::io::Error as IoError;

use err_derive::Error;

/// Every way a read against an MPQ archive can fail, named after the
/// `ARCHIVE_ERROR_*` / `FILE_ERROR_*` kinds a caller coming from libmpq or
/// StormLib will already recognize.
#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "archive could not be opened")]
    ArchiveOpen,
    #[error(display = "archive could not be closed")]
    ArchiveClose,
    #[error(display = "not a valid MPQ archive")]
    ArchiveFormat,
    #[error(display = "archive bookkeeping allocation too large to be valid")]
    ArchiveMalloc,
    #[error(display = "hash table is corrupt")]
    ArchiveHashTable,
    #[error(display = "block table is corrupt")]
    ArchiveBlockTable,
    #[error(display = "file could not be opened")]
    FileOpen,
    #[error(display = "file could not be closed")]
    FileClose,
    #[error(display = "file index out of range")]
    FileRange,
    #[error(display = "file does not exist in this archive")]
    FileExist,
    #[error(display = "file entry is corrupt")]
    FileCorrupt,
    #[error(display = "file bookkeeping allocation too large to be valid")]
    FileMalloc,
    #[error(display = "could not decompress sector")]
    FileDecompress,
    #[error(display = "I/O error: {}", cause)]
    Io { cause: IoError },
}

impl From<IoError> for Error {
    fn from(cause: IoError) -> Self {
        Error::Io { cause }
    }
}
