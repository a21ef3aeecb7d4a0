//! # chunkfile core
//!
//! Reader/writer for batches of codec-encoded messages stored in flat files.
//!
//! A [`Chunk`] is a sequential container of records backed by one underlying
//! byte store: a path, an in-memory buffer, or an already-open handle. The
//! container format is nothing but the concatenated records - no header, no
//! footer, no length prefixes, no index - so the record count and content
//! digest are only known after a full write or read pass.
//!
//! Record contents are owned by a pluggable [`MessageCodec`]; the default
//! [`CborCodec`] stores one canonical CBOR item per record and works with
//! any `serde`-serializable message type.
//!
//! Compressed containers (the `.xz` path convention) are decompressed
//! through the `chunkfile_pipeline` crate before framing begins.
//!
//! ## Example
//!
//! ```rust
//! use chunkfile_core::{CborCodec, Chunk, OpenMode};
//!
//! let mut chunk = Chunk::in_memory(CborCodec::<Vec<u8>>::new());
//! chunk.add(&vec![1, 2, 3]).unwrap();
//! let digest = chunk.digest().unwrap();
//!
//! let bytes = chunk.into_bytes().unwrap();
//! let mut reader = Chunk::from_bytes(bytes, OpenMode::Read, CborCodec::new()).unwrap();
//! let records: Vec<Vec<u8>> = reader.messages().unwrap().map(Result::unwrap).collect();
//! assert_eq!(records, vec![vec![1, 2, 3]]);
//! assert_eq!(reader.digest().unwrap(), digest);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod codec;
mod error;

pub use chunk::{Chunk, Messages, OpenMode};
pub use codec::{decode_one, encode_one, CborCodec, DecodeOutcome, MessageCodec};
pub use error::{ChunkError, ChunkResult};

// The pipeline is part of the public surface: `Chunk::open_with_pipeline`
// takes one, and callers sealing whole containers use it directly.
pub use chunkfile_pipeline::{PipelineOutput, TransformPipeline};
