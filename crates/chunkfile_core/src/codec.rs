//! Pluggable message codec and the default CBOR implementation.
//!
//! A codec owns record boundaries entirely: records carry no framing header
//! and no length prefix, so the only way to find the next record is to let
//! the codec's read cursor advance across the current one. The default
//! codec stores one self-delimiting CBOR item per record.

use crate::error::{ChunkError, ChunkResult};
use chunkfile_stream::{ByteSink, ByteSource, MemorySink, MemorySource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::marker::PhantomData;

/// Outcome of a decode attempt at the current read position.
#[derive(Debug)]
pub enum DecodeOutcome<M> {
    /// One complete record was decoded.
    Message(M),
    /// The source was exhausted at a record boundary.
    ///
    /// Decoders report this only when end-of-input arrives **before** any
    /// byte of a record was consumed. End-of-input mid-record is a
    /// [`ChunkError::MalformedRecord`] instead, so a truncated final record
    /// is never mistaken for a properly terminated stream.
    EndOfStream,
}

/// Encodes and decodes one message type to and from chunk byte streams.
///
/// Swap implementations (or the generic message parameter of
/// [`CborCodec`]) to evolve schemas; the chunk machinery never inspects
/// record contents.
pub trait MessageCodec {
    /// The message type this codec handles.
    type Message;

    /// Encodes one message, appending its record bytes to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized or the sink
    /// write fails.
    fn encode(&self, message: &Self::Message, sink: &mut dyn ByteSink) -> ChunkResult<()>;

    /// Decodes the record starting at the source's current position.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::MalformedRecord`] for corrupt or truncated
    /// records; a clean end-of-stream is reported through
    /// [`DecodeOutcome::EndOfStream`], not an error.
    fn decode(&self, source: &mut dyn ByteSource) -> ChunkResult<DecodeOutcome<Self::Message>>;
}

/// The default codec: one canonical CBOR item per record.
///
/// Works with any `serde`-serializable message type; pick the schema by
/// choosing the generic parameter.
#[derive(Debug)]
pub struct CborCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> CborCodec<M> {
    /// Creates the codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for CborCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for CborCodec<M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Adapts a [`ByteSource`] to `io::Read` with one pushed-back byte.
///
/// The decode path peeks one byte to distinguish a clean end-of-stream from
/// the start of a record; the peeked byte is replayed here.
struct PeekedReader<'a> {
    first: Option<u8>,
    source: &'a mut dyn ByteSource,
}

impl Read for PeekedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(byte) = self.first.take() {
            buf[0] = byte;
            return Ok(1);
        }
        self.source
            .read(buf)
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))
    }
}

impl<M: Serialize + DeserializeOwned> MessageCodec for CborCodec<M> {
    type Message = M;

    fn encode(&self, message: &M, sink: &mut dyn ByteSink) -> ChunkResult<()> {
        let mut record = Vec::new();
        ciborium::ser::into_writer(message, &mut record)
            .map_err(|e| ChunkError::encode_failed(e.to_string()))?;
        sink.write(&record)?;
        Ok(())
    }

    fn decode(&self, source: &mut dyn ByteSource) -> ChunkResult<DecodeOutcome<M>> {
        // One byte of lookahead: nothing at all means a record boundary EOF.
        let mut first = [0u8; 1];
        if source.read(&mut first)? == 0 {
            return Ok(DecodeOutcome::EndOfStream);
        }

        let reader = PeekedReader {
            first: Some(first[0]),
            source,
        };
        match ciborium::de::from_reader(reader) {
            Ok(message) => Ok(DecodeOutcome::Message(message)),
            Err(ciborium::de::Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(
                ChunkError::malformed_record("stream ended inside a record"),
            ),
            Err(ciborium::de::Error::Io(e)) => Err(ChunkError::Io(e)),
            Err(e) => Err(ChunkError::malformed_record(e.to_string())),
        }
    }
}

/// Encodes a single message into a standalone record blob.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_one<C: MessageCodec>(codec: &C, message: &C::Message) -> ChunkResult<Vec<u8>> {
    let mut sink = MemorySink::new();
    codec.encode(message, &mut sink)?;
    Ok(sink.into_vec())
}

/// Decodes a blob that must contain exactly one record.
///
/// # Errors
///
/// Returns an error if the blob is empty, malformed, or holds more than
/// one record.
pub fn decode_one<C: MessageCodec>(codec: &C, data: &[u8]) -> ChunkResult<C::Message> {
    let mut source = MemorySource::new(data.to_vec());
    let message = match codec.decode(&mut source)? {
        DecodeOutcome::Message(message) => message,
        DecodeOutcome::EndOfStream => {
            return Err(ChunkError::malformed_record("empty record blob"))
        }
    };
    match codec.decode(&mut source)? {
        DecodeOutcome::EndOfStream => Ok(message),
        DecodeOutcome::Message(_) => Err(ChunkError::invalid_source(
            "blob contains more than one record",
        )),
    }
}
