//! Byte sink trait and implementations.

use crate::error::StreamResult;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A sequential sink for bytes.
///
/// Sinks are append-only: bytes go to the end of whatever store backs them.
/// There is no random access and no truncation, matching the container
/// format (records are only ever appended).
pub trait ByteSink: Send {
    /// Appends `data` to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write(&mut self, data: &[u8]) -> StreamResult<()>;

    /// Flushes buffered bytes to the underlying store.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StreamResult<()>;

    /// Consumes the sink and returns its buffer, if it is memory-backed.
    ///
    /// Returns `None` for sinks whose bytes live elsewhere (files, pipes).
    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>>;
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write(&mut self, data: &[u8]) -> StreamResult<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> StreamResult<()> {
        (**self).flush()
    }

    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>> {
        (*self).into_bytes()
    }
}

/// A byte sink backed by a file on the local file system.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Creates a new file for writing, along with any missing parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be created.
    pub fn create(path: &Path) -> StreamResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens an existing file for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn append(path: &Path) -> StreamResult<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
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

impl ByteSink for FileSink {
    fn write(&mut self, data: &[u8]) -> StreamResult<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>> {
        None
    }
}

/// A growable in-memory byte sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Vec<u8>,
}

impl MemorySink {
    /// Creates a new empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink seeded with existing contents.
    ///
    /// New writes land after the seed. Used for append mode over a buffer;
    /// note that only bytes written through a digest wrapper contribute to
    /// its digest, so the seed is not digested.
    #[must_use]
    pub fn with_contents(data: Vec<u8>) -> Self {
        Self { buf: data }
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the sink and returns its buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, data: &[u8]) -> StreamResult<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>> {
        Some(self.buf)
    }
}

/// A byte sink over an already-open handle.
#[derive(Debug)]
pub struct HandleSink<W: Write + Send> {
    inner: W,
}

impl<W: Write + Send> HandleSink<W> {
    /// Wraps an already-open writable handle.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> ByteSink for HandleSink<W> {
    fn write(&mut self, data: &[u8]) -> StreamResult<()> {
        self.inner.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_sink_collects_writes() {
        let mut sink = MemorySink::new();
        sink.write(b"hello ").unwrap();
        sink.write(b"world").unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.bytes(), b"hello world");
        assert_eq!(sink.into_vec(), b"hello world");
    }

    #[test]
    fn memory_sink_seeded_appends_after_seed() {
        let mut sink = MemorySink::with_contents(b"seed:".to_vec());
        sink.write(b"tail").unwrap();
        assert_eq!(sink.bytes(), b"seed:tail");
    }

    #[test]
    fn memory_sink_returns_buffer_through_trait_object() {
        let mut sink: Box<dyn ByteSink> = Box::new(MemorySink::new());
        sink.write(b"abc").unwrap();
        assert_eq!(sink.into_bytes(), Some(b"abc".to_vec()));
    }

    #[test]
    fn file_sink_creates_with_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("out.bin");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write(b"persistent").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"persistent");
    }

    #[test]
    fn file_sink_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"existing").unwrap();

        assert!(FileSink::create(&path).is_err());
    }

    #[test]
    fn file_sink_appends_to_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"first").unwrap();

        let mut sink = FileSink::append(&path).unwrap();
        sink.write(b"|second").unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"first|second");
    }

    #[test]
    fn file_sink_has_no_retrievable_buffer() {
        let dir = tempdir().unwrap();
        let sink: Box<dyn ByteSink> =
            Box::new(FileSink::create(&dir.path().join("x.bin")).unwrap());
        assert_eq!(sink.into_bytes(), None);
    }

    #[test]
    fn handle_sink_writes_through() {
        let mut out = Vec::new();
        {
            let mut sink = HandleSink::new(&mut out);
            sink.write(b"via handle").unwrap();
            sink.flush().unwrap();
        }
        assert_eq!(out, b"via handle");
    }
}
