//! Raw symbol data acquisition.
//!
//! Symbol files are read whole into an owned buffer with one trailing zero
//! byte. The buffer lives only for the duration of a load: the symbol module
//! parses from a borrowed slice and the registry releases (or hands off) the
//! buffer afterwards.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SymbolError};

/// Byte written after the symbol data.
pub const TERMINATOR: u8 = 0;

/// Upper bounds applied before any symbol buffer is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadLimits
{
    /// Largest symbol file (or blob) accepted, in bytes, excluding the terminator.
    pub max_symbol_file_size: u64,
}

impl Default for LoadLimits
{
    fn default() -> Self
    {
        Self {
            max_symbol_file_size: 2 * 1024 * 1024 * 1024, // 2GiB
        }
    }
}

/// Owned symbol data followed by a [`TERMINATOR`] byte.
pub struct SymbolBuffer
{
    // Always ends with TERMINATOR.
    data: Vec<u8>,
}

impl SymbolBuffer
{
    /// Read an entire symbol file.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument` for an empty path
    /// - `Io` if the file cannot be stat'd, opened, or is shorter than its reported length
    /// - `Allocation` if the buffer cannot be reserved or exceeds `limits`
    pub fn from_file(path: &Path, limits: &LoadLimits) -> Result<Self>
    {
        if path.as_os_str().is_empty() {
            return Err(SymbolError::InvalidArgument("symbol file path is empty".into()));
        }

        let metadata = fs::metadata(path).map_err(|err| {
            warn!(path = %path.display(), error = %err, "Could not stat symbol file");
            SymbolError::io(path, err)
        })?;
        let file_size = metadata.len();
        let mut data = allocate(file_size, limits)?;

        debug!(path = %path.display(), size = file_size, "Opening symbol file");
        let file = File::open(path).map_err(|err| {
            warn!(path = %path.display(), error = %err, "Could not open symbol file");
            SymbolError::io(path, err)
        })?;

        read_exact_len(file, path, file_size, &mut data)?;
        data.push(TERMINATOR);
        Ok(Self { data })
    }

    /// Copy an in-memory blob.
    ///
    /// The copy is length-bounded, so zero bytes inside the blob are kept.
    ///
    /// ## Errors
    ///
    /// Returns `Allocation` if the buffer cannot be reserved or exceeds `limits`.
    pub fn from_blob(blob: &[u8], limits: &LoadLimits) -> Result<Self>
    {
        let mut data = allocate(blob.len() as u64, limits)?;
        data.extend_from_slice(blob);
        data.push(TERMINATOR);
        Ok(Self { data })
    }

    /// Symbol data without the terminator.
    pub fn contents(&self) -> &[u8]
    {
        &self.data[..self.data.len() - 1]
    }

    /// Symbol data including the terminator.
    pub fn as_bytes_with_terminator(&self) -> &[u8]
    {
        &self.data
    }

    /// Length of the symbol data, excluding the terminator.
    pub fn len(&self) -> usize
    {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

impl std::fmt::Debug for SymbolBuffer
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("SymbolBuffer").field("len", &self.len()).finish()
    }
}

/// Append exactly `expected` bytes from `reader` to `data`.
///
/// A source that ends early, such as a file truncated after it was stat'd, is
/// an `UnexpectedEof` error.
fn read_exact_len(reader: impl Read, path: &Path, expected: u64, data: &mut Vec<u8>) -> Result<()>
{
    let read = reader
        .take(expected)
        .read_to_end(data)
        .map_err(|err| SymbolError::io(path, err))?;
    if read as u64 != expected {
        warn!(path = %path.display(), expected, read, "Short read on symbol file");
        return Err(SymbolError::io(
            path,
            io::Error::new(io::ErrorKind::UnexpectedEof, format!("read {read} of {expected} bytes")),
        ));
    }
    Ok(())
}

/// Reserve room for `size` bytes plus the terminator without aborting on failure.
fn allocate(size: u64, limits: &LoadLimits) -> Result<Vec<u8>>
{
    let requested = size.saturating_add(1);
    if size > limits.max_symbol_file_size {
        return Err(SymbolError::Allocation {
            requested,
            reason: format!("limit is {} bytes", limits.max_symbol_file_size),
        });
    }
    let capacity = usize::try_from(requested).map_err(|_| SymbolError::Allocation {
        requested,
        reason: "size does not fit in the address space".into(),
    })?;

    let mut data = Vec::new();
    data.try_reserve_exact(capacity).map_err(|err| SymbolError::Allocation {
        requested,
        reason: err.to_string(),
    })?;
    Ok(data)
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use super::*;

    #[test]
    fn test_blob_keeps_embedded_zero_bytes()
    {
        let blob = b"MODULE\0Linux\0x86";
        let buffer = SymbolBuffer::from_blob(blob, &LoadLimits::default()).unwrap();
        assert_eq!(buffer.contents(), blob);
        assert_eq!(buffer.len(), blob.len());
        assert_eq!(buffer.as_bytes_with_terminator().last(), Some(&TERMINATOR));
        assert_eq!(buffer.as_bytes_with_terminator().len(), blob.len() + 1);
    }

    #[test]
    fn test_empty_blob_is_just_a_terminator()
    {
        let buffer = SymbolBuffer::from_blob(&[], &LoadLimits::default()).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_bytes_with_terminator(), &[TERMINATOR]);
    }

    #[test]
    fn test_short_read_is_an_unexpected_eof()
    {
        let path = Path::new("shrunk.sym");
        let mut data = Vec::new();
        let err = read_exact_len(&b"abc"[..], path, 8, &mut data).unwrap_err();
        match err {
            SymbolError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }

        let mut data = Vec::new();
        read_exact_len(&b"abcdefgh"[..], path, 8, &mut data).unwrap();
        assert_eq!(data, b"abcdefgh");
    }

    #[test]
    fn test_blob_over_limit_is_an_allocation_error()
    {
        let limits = LoadLimits {
            max_symbol_file_size: 4,
        };
        let err = SymbolBuffer::from_blob(b"12345", &limits).unwrap_err();
        match err {
            SymbolError::Allocation { requested, .. } => assert_eq!(requested, 6),
            other => panic!("expected Allocation, got {other:?}"),
        }
    }

    #[test]
    fn test_file_is_read_whole()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"FILE 1 a.c\n").unwrap();
        let buffer = SymbolBuffer::from_file(file.path(), &LoadLimits::default()).unwrap();
        assert_eq!(buffer.contents(), b"FILE 1 a.c\n");
        assert_eq!(buffer.as_bytes_with_terminator()[buffer.len()], TERMINATOR);
    }

    #[test]
    fn test_missing_file_is_an_io_error()
    {
        let dir = tempfile::tempdir().unwrap();
        let err = SymbolBuffer::from_file(&dir.path().join("missing.sym"), &LoadLimits::default()).unwrap_err();
        assert!(matches!(err, SymbolError::Io { .. }));
    }

    #[test]
    fn test_empty_path_is_rejected_before_io()
    {
        let err = SymbolBuffer::from_file(Path::new(""), &LoadLimits::default()).unwrap_err();
        assert!(matches!(err, SymbolError::InvalidArgument(_)));
    }

    #[test]
    fn test_file_over_limit_is_an_allocation_error()
    {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 64]).unwrap();
        let limits = LoadLimits {
            max_symbol_file_size: 16,
        };
        let err = SymbolBuffer::from_file(file.path(), &limits).unwrap_err();
        assert!(matches!(err, SymbolError::Allocation { .. }));
    }
}
