//! # chunkfile stream
//!
//! Byte sources, sinks, and digesting wrappers for chunkfile.
//!
//! This crate provides the lowest-level stream abstraction for chunkfile.
//! Sources and sinks are **opaque byte streams** - they do not interpret
//! the data they carry. Record framing lives entirely in `chunkfile_core`.
//!
//! ## Design Principles
//!
//! - Sources and sinks are simple sequential byte streams
//! - No knowledge of record framing or message schemas
//! - The digest wrappers fold every byte actually transferred into a
//!   running MD5, exposed as a lowercase hex string at any time
//!
//! ## Available Streams
//!
//! - [`MemorySource`] / [`MemorySink`] - In-memory buffers
//! - [`FileSource`] / [`FileSink`] - Persistent files
//! - [`HandleSource`] / [`HandleSink`] - Already-open handles (pipes, sockets)
//! - [`DigestSource`] / [`DigestSink`] - Digesting wrappers over any of the above
//!
//! ## Example
//!
//! ```rust
//! use chunkfile_stream::{ByteSink, DigestSink, MemorySink};
//!
//! let mut sink = DigestSink::new(MemorySink::new());
//! sink.write(b"hello world").unwrap();
//! assert_eq!(sink.hex_digest(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod digest;
mod error;
mod sink;
mod source;

pub use digest::{DigestSink, DigestSource};
pub use error::{StreamError, StreamResult};
pub use sink::{ByteSink, FileSink, HandleSink, MemorySink};
pub use source::{ByteSource, FileSource, HandleSource, MemorySource};
