//! Byte source trait and implementations.

use crate::error::StreamResult;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A sequential source of bytes.
///
/// Sources are read-only streams with an optional ability to rewind to the
/// start. Rewinding is what makes chunk iteration restartable; sources that
/// cannot seek (pipes, sockets) report that instead of erroring so callers
/// can fall back to a single pass.
pub trait ByteSource: Send {
    /// Reads up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read. A return of `0` with a non-empty
    /// buffer means the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize>;

    /// Repositions the source at its start.
    ///
    /// Returns `true` if the source was rewound, `false` if the source does
    /// not support seeking.
    ///
    /// # Errors
    ///
    /// Returns an error if the source supports seeking but the seek fails.
    fn rewind(&mut self) -> StreamResult<bool>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        (**self).read(buf)
    }

    fn rewind(&mut self) -> StreamResult<bool> {
        (**self).rewind()
    }
}

/// A byte source backed by a file on the local file system.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
}

impl FileSource {
    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StreamResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        Ok(self.file.read(buf)?)
    }

    fn rewind(&mut self) -> StreamResult<bool> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(true)
    }
}

/// A byte source over an owned in-memory buffer, positioned at the start.
#[derive(Debug, Default)]
pub struct MemorySource {
    cursor: Cursor<Vec<u8>>,
}

impl MemorySource {
    /// Creates a source reading from the given bytes.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        Ok(self.cursor.read(buf)?)
    }

    fn rewind(&mut self) -> StreamResult<bool> {
        self.cursor.set_position(0);
        Ok(true)
    }
}

/// A byte source over an already-open handle.
///
/// Handles are treated as non-seekable: [`ByteSource::rewind`] reports
/// `false`, so a chunk reading from a handle supports only a single pass.
#[derive(Debug)]
pub struct HandleSource<R: Read + Send> {
    inner: R,
}

impl<R: Read + Send> HandleSource<R> {
    /// Wraps an already-open readable handle.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> ByteSource for HandleSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        Ok(self.inner.read(buf)?)
    }

    fn rewind(&mut self) -> StreamResult<bool> {
        Ok(false)
    }
}
