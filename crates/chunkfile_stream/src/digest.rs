//! Digesting stream wrappers.
//!
//! [`DigestSource`] and [`DigestSink`] wrap any byte source or sink and fold
//! every byte actually transferred into a running MD5. The digest reflects
//! only bytes that moved through the wrapper - not bytes seeded into a store
//! before wrapping, and not bytes buffered elsewhere. The wrappers add no
//! error kind of their own; inner stream errors propagate unchanged.

use crate::error::StreamResult;
use crate::sink::ByteSink;
use crate::source::ByteSource;
use md5::{Digest, Md5};
use std::fmt::Write as _;

fn hex_of(md5: &Md5) -> String {
    let out = md5.clone().finalize();
    let mut hex = String::with_capacity(out.len() * 2);
    for byte in out {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// A byte source that digests everything it reads.
///
/// Rewinding and re-reading folds the re-read bytes into the digest again,
/// so the digest of a source that was iterated twice covers the content
/// twice. Callers that need the content digest read the source exactly once.
#[derive(Debug)]
pub struct DigestSource<S> {
    inner: S,
    md5: Md5,
}

impl<S: ByteSource> DigestSource<S> {
    /// Wraps a source in a digesting adapter.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            md5: Md5::new(),
        }
    }

    /// Returns the running digest as a lowercase hex string.
    #[must_use]
    pub fn hex_digest(&self) -> String {
        hex_of(&self.md5)
    }

    /// Consumes the wrapper and returns the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteSource> ByteSource for DigestSource<S> {
    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let n = self.inner.read(buf)?;
        self.md5.update(&buf[..n]);
        Ok(n)
    }

    fn rewind(&mut self) -> StreamResult<bool> {
        self.inner.rewind()
    }
}

/// A byte sink that digests everything written through it.
#[derive(Debug)]
pub struct DigestSink<S> {
    inner: S,
    md5: Md5,
}

impl<S: ByteSink> DigestSink<S> {
    /// Wraps a sink in a digesting adapter.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            md5: Md5::new(),
        }
    }

    /// Returns the running digest as a lowercase hex string.
    #[must_use]
    pub fn hex_digest(&self) -> String {
        hex_of(&self.md5)
    }

    /// Consumes the wrapper and returns the inner sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteSink> ByteSink for DigestSink<S> {
    fn write(&mut self, data: &[u8]) -> StreamResult<()> {
        self.md5.update(data);
        self.inner.write(data)
    }

    fn flush(&mut self) -> StreamResult<()> {
        self.inner.flush()
    }

    fn into_bytes(self: Box<Self>) -> Option<Vec<u8>> {
        Box::new(self.inner).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::source::MemorySource;

    /// MD5 of the empty byte sequence.
    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn empty_sink_digest() {
        let sink = DigestSink::new(MemorySink::new());
        assert_eq!(sink.hex_digest(), EMPTY_MD5);
    }

    #[test]
    fn sink_digest_matches_direct_md5() {
        let payload = b"the quick brown fox";

        let mut sink = DigestSink::new(MemorySink::new());
        sink.write(payload).unwrap();

        let mut direct = Md5::new();
        direct.update(payload);
        assert_eq!(sink.hex_digest(), hex_of(&direct));
    }

    #[test]
    fn sink_digest_is_incremental() {
        let mut split = DigestSink::new(MemorySink::new());
        split.write(b"hello ").unwrap();
        split.write(b"world").unwrap();

        let mut whole = DigestSink::new(MemorySink::new());
        whole.write(b"hello world").unwrap();

        assert_eq!(split.hex_digest(), whole.hex_digest());
        assert_eq!(split.hex_digest(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn seeded_sink_contents_are_not_digested() {
        let mut sink = DigestSink::new(MemorySink::with_contents(b"seed".to_vec()));
        assert_eq!(sink.hex_digest(), EMPTY_MD5);

        sink.write(b"hello world").unwrap();
        assert_eq!(sink.hex_digest(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn source_digest_tracks_reads() {
        let mut source = DigestSource::new(MemorySource::new(b"hello world".to_vec()));
        assert_eq!(source.hex_digest(), EMPTY_MD5);

        let mut buf = [0u8; 64];
        while source.read(&mut buf).unwrap() > 0 {}
        assert_eq!(source.hex_digest(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn source_digest_counts_only_transferred_bytes() {
        let mut source = DigestSource::new(MemorySource::new(b"abcdef".to_vec()));
        let mut buf = [0u8; 3];
        source.read(&mut buf).unwrap();

        let mut direct = Md5::new();
        direct.update(b"abc");
        assert_eq!(source.hex_digest(), hex_of(&direct));
    }

    #[test]
    fn boxed_digest_sink_hands_back_buffer() {
        let mut sink = DigestSink::new(MemorySink::new());
        sink.write(b"kept").unwrap();
        let boxed: Box<DigestSink<MemorySink>> = Box::new(sink);
        assert_eq!(boxed.into_bytes(), Some(b"kept".to_vec()));
    }
}
