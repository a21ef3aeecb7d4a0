//! The chunk container: batches of codec-encoded messages in one byte store.

use crate::codec::{DecodeOutcome, MessageCodec};
use crate::error::{ChunkError, ChunkResult};
use chunkfile_pipeline::TransformPipeline;
use chunkfile_stream::{
    ByteSink, ByteSource, DigestSink, DigestSource, FileSink, FileSource, HandleSink,
    HandleSource, MemorySink, MemorySource,
};
use std::io::{Read, Write};
use std::path::Path;

/// Extension marking a compressed container file.
const COMPRESSED_EXTENSION: &str = "xz";

/// How a chunk's underlying byte store was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new store and append records to it.
    Write,
    /// Append records to an existing store.
    Append,
    /// Consume records from an existing store.
    Read,
}

impl OpenMode {
    /// Returns `true` for the modes that accept [`Chunk::add`].
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Append => "append",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sequential container of codec-encoded records over one byte store.
///
/// A chunk is either writable (write/append mode, records go in through
/// [`Chunk::add`]) or readable (read mode, records come out through
/// [`Chunk::messages`]), never both. Every byte moving through the chunk is
/// folded into a running MD5 digest of the raw store contents.
///
/// Instances are for single-writer-or-single-reader use; callers serialize
/// concurrent access themselves.
///
/// # Example
///
/// ```rust
/// use chunkfile_core::{CborCodec, Chunk};
///
/// let mut chunk = Chunk::in_memory(CborCodec::<String>::new());
/// chunk.add(&"first".to_string()).unwrap();
/// chunk.add(&"second".to_string()).unwrap();
/// assert_eq!(chunk.len(), 2);
///
/// let bytes = chunk.into_bytes().unwrap();
/// let mut reader = Chunk::from_bytes(bytes, chunkfile_core::OpenMode::Read,
///     CborCodec::<String>::new()).unwrap();
/// let messages: Vec<_> = reader.messages().unwrap().collect::<Result<_, _>>().unwrap();
/// assert_eq!(messages, vec!["first".to_string(), "second".to_string()]);
/// ```
pub struct Chunk<C: MessageCodec> {
    mode: OpenMode,
    codec: C,
    count: u64,
    closed: bool,
    frozen_digest: Option<String>,
    output: Option<DigestSink<Box<dyn ByteSink>>>,
    input: Option<DigestSource<Box<dyn ByteSource>>>,
}

impl<C: MessageCodec> Chunk<C> {
    fn writable(mode: OpenMode, codec: C, sink: Box<dyn ByteSink>) -> Self {
        Self {
            mode,
            codec,
            count: 0,
            closed: false,
            frozen_digest: None,
            output: Some(DigestSink::new(sink)),
            input: None,
        }
    }

    fn readable(codec: C, source: Box<dyn ByteSource>) -> Self {
        Self {
            mode: OpenMode::Read,
            codec,
            count: 0,
            closed: false,
            frozen_digest: None,
            output: None,
            input: Some(DigestSource::new(source)),
        }
    }

    /// Creates a write-mode chunk over a fresh in-memory buffer.
    ///
    /// Retrieve the encoded container with [`Chunk::into_bytes`].
    pub fn in_memory(codec: C) -> Self {
        Self::writable(OpenMode::Write, codec, Box::new(MemorySink::new()))
    }

    /// Opens a chunk at a file system path.
    ///
    /// The mode is checked against what is actually on disk before any
    /// object is constructed:
    ///
    /// - existing file + read/append: opened for that access
    /// - missing file + write/append: created, with parent directories
    /// - existing file + write: refused (would overwrite)
    /// - missing file + read: refused
    ///
    /// A path ending in `.xz` is read-only compressed data; the whole file
    /// is decompressed through the default [`TransformPipeline`] into
    /// memory before framing begins.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidSource`] for a disallowed
    /// path/mode/existence combination, or an error from the file system
    /// or decompression pipeline.
    pub fn open(path: &Path, mode: OpenMode, codec: C) -> ChunkResult<Self> {
        Self::open_with_pipeline(path, mode, codec, &TransformPipeline::new())
    }

    /// Like [`Chunk::open`], but decompressing `.xz` paths through the
    /// supplied pipeline.
    pub fn open_with_pipeline(
        path: &Path,
        mode: OpenMode,
        codec: C,
        pipeline: &TransformPipeline,
    ) -> ChunkResult<Self> {
        let compressed = path
            .extension()
            .is_some_and(|ext| ext == COMPRESSED_EXTENSION);

        if compressed && mode != OpenMode::Read {
            return Err(ChunkError::invalid_source(format!(
                "compressed path {} is read-only, mode={mode}",
                path.display()
            )));
        }

        if path.exists() {
            match mode {
                OpenMode::Write => Err(ChunkError::invalid_source(format!(
                    "mode=write would overwrite existing {}",
                    path.display()
                ))),
                OpenMode::Append => Ok(Self::writable(
                    mode,
                    codec,
                    Box::new(FileSink::append(path)?),
                )),
                OpenMode::Read if compressed => {
                    tracing::debug!(path = %path.display(), "decompressing chunk into memory");
                    let raw = std::fs::read(path)?;
                    let restored = pipeline.decrypt_and_uncompress(&raw, None)?;
                    Ok(Self::readable(
                        codec,
                        Box::new(MemorySource::new(restored.bytes)),
                    ))
                }
                OpenMode::Read => Ok(Self::readable(codec, Box::new(FileSource::open(path)?))),
            }
        } else {
            match mode {
                OpenMode::Read => Err(ChunkError::invalid_source(format!(
                    "{} does not exist, mode=read",
                    path.display()
                ))),
                OpenMode::Write | OpenMode::Append => Ok(Self::writable(
                    mode,
                    codec,
                    Box::new(FileSink::create(path)?),
                )),
            }
        }
    }

    /// Wraps an in-memory buffer.
    ///
    /// Read mode positions a cursor at the start of `data`; append mode
    /// seeds a growable buffer with `data` and appends after it.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidSource`] for write mode, which would
    /// discard the supplied buffer.
    pub fn from_bytes(data: Vec<u8>, mode: OpenMode, codec: C) -> ChunkResult<Self> {
        match mode {
            OpenMode::Read => Ok(Self::readable(codec, Box::new(MemorySource::new(data)))),
            OpenMode::Append => Ok(Self::writable(
                mode,
                codec,
                Box::new(MemorySink::with_contents(data)),
            )),
            OpenMode::Write => Err(ChunkError::invalid_source(
                "mode=write with a data buffer; use read or append",
            )),
        }
    }

    /// Wraps an already-open readable handle in a read-mode chunk.
    ///
    /// Handles are non-seekable, so iteration is single-pass: a second
    /// [`Chunk::messages`] call continues from wherever the first stopped.
    pub fn from_reader(reader: impl Read + Send + 'static, codec: C) -> Self {
        Self::readable(codec, Box::new(HandleSource::new(reader)))
    }

    /// Wraps an already-open writable handle in a write-mode chunk.
    pub fn from_writer(writer: impl Write + Send + 'static, codec: C) -> Self {
        Self::writable(OpenMode::Write, codec, Box::new(HandleSink::new(writer)))
    }

    /// Returns the chunk's open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns whether [`Chunk::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the running record counter.
    ///
    /// In write/append mode this is the number of records added so far; in
    /// read mode, the number consumed through iteration so far. It is never
    /// a pre-scanned total.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.count
    }

    /// Returns `true` if no records were added or consumed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Encodes a message and appends it to the underlying store.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidMode`] on a read-mode or closed chunk,
    /// or a codec/stream error.
    pub fn add(&mut self, message: &C::Message) -> ChunkResult<()> {
        if self.closed {
            return Err(ChunkError::invalid_mode("cannot add to a closed chunk"));
        }
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| ChunkError::invalid_mode("cannot add to a chunk open for reading"))?;
        self.codec.encode(message, output)?;
        self.count += 1;
        Ok(())
    }

    /// Flushes pending writes, freezes the digest, and releases the
    /// underlying stream.
    ///
    /// Idempotent: a second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&mut self) -> ChunkResult<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(mut output) = self.output.take() {
            output.flush()?;
            self.frozen_digest = Some(output.hex_digest());
        } else if let Some(input) = self.input.take() {
            self.frozen_digest = Some(input.hex_digest());
        }
        self.closed = true;
        tracing::debug!(mode = %self.mode, records = self.count, "chunk closed");
        Ok(())
    }

    /// Returns the MD5 hex digest of the raw bytes observed so far.
    ///
    /// Live while the chunk is open, frozen after [`Chunk::close`].
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::NoStreamAttached`] if the chunk has neither an
    /// input nor an output stream and no frozen digest.
    pub fn digest(&self) -> ChunkResult<String> {
        if let Some(digest) = &self.frozen_digest {
            return Ok(digest.clone());
        }
        if let Some(output) = &self.output {
            return Ok(output.hex_digest());
        }
        if let Some(input) = &self.input {
            return Ok(input.hex_digest());
        }
        Err(ChunkError::NoStreamAttached)
    }

    /// Closes the chunk and returns the encoded container bytes.
    ///
    /// Only available for memory-backed writable chunks
    /// ([`Chunk::in_memory`] and append-mode [`Chunk::from_bytes`]).
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidMode`] on a read-mode or closed chunk,
    /// and [`ChunkError::InvalidSource`] when the store is a file or
    /// handle.
    pub fn into_bytes(mut self) -> ChunkResult<Vec<u8>> {
        let Some(mut output) = self.output.take() else {
            return Err(ChunkError::invalid_mode(
                "no writable buffer to take; chunk is read-mode or closed",
            ));
        };
        output.flush()?;
        self.frozen_digest = Some(output.hex_digest());
        self.closed = true;

        output.into_inner().into_bytes().ok_or_else(|| {
            ChunkError::invalid_source("underlying store is not an in-memory buffer")
        })
    }

    /// Iterates over the records in a read-mode chunk.
    ///
    /// Seekable sources are rewound first, making iteration restartable;
    /// non-seekable sources continue from their current position, so only
    /// one full pass is possible. A clean end-of-stream terminates the
    /// iterator without error; a corrupt or truncated record yields one
    /// `Err` and fuses the iterator. Each consumed record advances
    /// [`Chunk::len`].
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidMode`] on a writable or closed chunk.
    pub fn messages(&mut self) -> ChunkResult<Messages<'_, C>> {
        if self.closed {
            return Err(ChunkError::invalid_mode("cannot iterate a closed chunk"));
        }
        if self.input.is_none() {
            return Err(ChunkError::invalid_mode(
                "cannot iterate a chunk open for writing",
            ));
        }
        if let Some(input) = self.input.as_mut() {
            // Pipes report false and simply continue from where they are.
            input.rewind()?;
        }
        Ok(Messages {
            chunk: self,
            done: false,
        })
    }
}

impl<C: MessageCodec> std::fmt::Debug for Chunk<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("mode", &self.mode)
            .field("count", &self.count)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Iterator over the decoded messages of a read-mode chunk.
pub struct Messages<'a, C: MessageCodec> {
    chunk: &'a mut Chunk<C>,
    done: bool,
}

impl<C: MessageCodec> Iterator for Messages<'_, C> {
    type Item = ChunkResult<C::Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk = &mut *self.chunk;
        let input = chunk.input.as_mut()?;
        match chunk.codec.decode(input) {
            Ok(DecodeOutcome::Message(message)) => {
                chunk.count += 1;
                Some(Ok(message))
            }
            Ok(DecodeOutcome::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
