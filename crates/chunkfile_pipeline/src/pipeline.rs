//! The transform pipeline orchestrator.

use crate::crypto::{CryptoBackend, GpgBackend};
use crate::error::{PipelineError, PipelineResult};
use crate::stage::{CommandStage, StageOutput, TransformStage, DEFAULT_STAGE_TIMEOUT};

/// Result of one pipeline entry point.
///
/// Callers must inspect `diagnostics` even when the call succeeded: crypto
/// stages emit advisory text (key import banners and the like) that is
/// aggregated here rather than discarded.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Advisory diagnostic text collected from the stages.
    pub diagnostics: Vec<String>,
    /// The fully transformed bytes.
    pub bytes: Vec<u8>,
}

/// Chains whole-buffer external transforms over container bytes.
///
/// Write path: compress, then (when key material is supplied) encrypt.
/// Read path: decrypt (when key material is supplied), then decompress.
///
/// Compression stage diagnostics are fatal - the compressor is expected to
/// be silent. Crypto stage diagnostics are advisory and returned in the
/// output. A pipeline holds no per-call state, so one instance may be used
/// from any number of threads concurrently.
pub struct TransformPipeline {
    compressor: Box<dyn TransformStage>,
    decompressor: Box<dyn TransformStage>,
    crypto: Box<dyn CryptoBackend>,
}

impl TransformPipeline {
    /// Creates the default pipeline: xz for compression, gpg for crypto.
    #[must_use]
    pub fn new() -> Self {
        Self {
            compressor: Box::new(CommandStage::xz_compress(DEFAULT_STAGE_TIMEOUT)),
            decompressor: Box::new(CommandStage::xz_decompress(DEFAULT_STAGE_TIMEOUT)),
            crypto: Box::new(GpgBackend::new()),
        }
    }

    /// Creates a pipeline from explicit stages.
    ///
    /// Tests use this to substitute in-process fakes for the external
    /// binaries.
    #[must_use]
    pub fn with_stages(
        compressor: Box<dyn TransformStage>,
        decompressor: Box<dyn TransformStage>,
        crypto: Box<dyn CryptoBackend>,
    ) -> Self {
        Self {
            compressor,
            decompressor,
            crypto,
        }
    }

    /// Compresses `data`, then encrypts it for `recipient` when
    /// `public_key` material is supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails, exits non-zero, or the
    /// compression stage emits any diagnostic output.
    pub fn compress_and_encrypt(
        &self,
        data: &[u8],
        public_key: Option<&[u8]>,
        recipient: &str,
    ) -> PipelineResult<PipelineOutput> {
        let compressed = run_strict(self.compressor.as_ref(), data)?;

        let mut diagnostics = Vec::new();
        let bytes = match public_key {
            Some(key) => {
                let sealed = self.crypto.encrypt(&compressed, key, recipient)?;
                diagnostics.extend(sealed.diagnostics);
                sealed.bytes
            }
            None => compressed,
        };

        Ok(PipelineOutput { diagnostics, bytes })
    }

    /// Decrypts `data` when `private_key` material is supplied, then
    /// decompresses it.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails, exits non-zero, or the
    /// decompression stage emits any diagnostic output.
    pub fn decrypt_and_uncompress(
        &self,
        data: &[u8],
        private_key: Option<&[u8]>,
    ) -> PipelineResult<PipelineOutput> {
        let mut diagnostics = Vec::new();
        let sealed = match private_key {
            Some(key) => {
                let opened = self.crypto.decrypt(data, key)?;
                diagnostics.extend(opened.diagnostics);
                opened.bytes
            }
            None => data.to_vec(),
        };

        let bytes = run_strict(self.decompressor.as_ref(), &sealed)?;
        Ok(PipelineOutput { diagnostics, bytes })
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a stage whose diagnostics are classified fatal.
fn run_strict(stage: &dyn TransformStage, input: &[u8]) -> PipelineResult<Vec<u8>> {
    let StageOutput { bytes, diagnostics } = stage.run(input)?;
    if !diagnostics.is_empty() {
        return Err(PipelineError::external_tool(
            stage.name(),
            diagnostics.join("\n"),
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    /// Fake compressor: prepends a marker so the transform is visible.
    struct FakeCompress;

    impl TransformStage for FakeCompress {
        fn name(&self) -> &str {
            "fake-compress"
        }

        fn run(&self, input: &[u8]) -> PipelineResult<StageOutput> {
            let mut bytes = b"CZ:".to_vec();
            bytes.extend_from_slice(input);
            Ok(StageOutput {
                bytes,
                diagnostics: Vec::new(),
            })
        }
    }

    struct FakeDecompress;

    impl TransformStage for FakeDecompress {
        fn name(&self) -> &str {
            "fake-decompress"
        }

        fn run(&self, input: &[u8]) -> PipelineResult<StageOutput> {
            let bytes = input
                .strip_prefix(b"CZ:".as_slice())
                .ok_or_else(|| PipelineError::external_tool("fake-decompress", "bad magic"))?
                .to_vec();
            Ok(StageOutput {
                bytes,
                diagnostics: Vec::new(),
            })
        }
    }

    /// Fake crypto: XORs with the single key byte and logs an advisory line.
    struct FakeCrypto;

    impl FakeCrypto {
        fn apply(input: &[u8], key: &[u8]) -> Vec<u8> {
            let k = key.first().copied().unwrap_or(0);
            input.iter().map(|b| b ^ k).collect()
        }
    }

    impl CryptoBackend for FakeCrypto {
        fn encrypt(
            &self,
            input: &[u8],
            public_key: &[u8],
            recipient: &str,
        ) -> PipelineResult<StageOutput> {
            Ok(StageOutput {
                bytes: Self::apply(input, public_key),
                diagnostics: vec![format!("encrypted for {recipient}")],
            })
        }

        fn decrypt(&self, input: &[u8], private_key: &[u8]) -> PipelineResult<StageOutput> {
            Ok(StageOutput {
                bytes: Self::apply(input, private_key),
                diagnostics: vec!["decrypted".into()],
            })
        }
    }

    /// A strict stage that chatters on stderr.
    struct NoisyStage;

    impl TransformStage for NoisyStage {
        fn name(&self) -> &str {
            "noisy"
        }

        fn run(&self, input: &[u8]) -> PipelineResult<StageOutput> {
            Ok(StageOutput {
                bytes: input.to_vec(),
                diagnostics: vec!["unexpected chatter".into()],
            })
        }
    }

    fn fake_pipeline() -> TransformPipeline {
        TransformPipeline::with_stages(
            Box::new(FakeCompress),
            Box::new(FakeDecompress),
            Box::new(FakeCrypto),
        )
    }

    #[test]
    fn round_trips_with_key_material() {
        let pipeline = fake_pipeline();
        let data = b"some container bytes".to_vec();

        let sealed = pipeline
            .compress_and_encrypt(&data, Some(b"\x42".as_slice()), "archive-key")
            .unwrap();
        assert_ne!(sealed.bytes, data);
        assert_eq!(sealed.diagnostics, vec!["encrypted for archive-key"]);

        let opened = pipeline
            .decrypt_and_uncompress(&sealed.bytes, Some(b"\x42".as_slice()))
            .unwrap();
        assert_eq!(opened.bytes, data);
        assert_eq!(opened.diagnostics, vec!["decrypted"]);
    }

    #[test]
    fn round_trips_without_key_material() {
        let pipeline = fake_pipeline();
        let data = b"compress only".to_vec();

        let sealed = pipeline.compress_and_encrypt(&data, None, "unused").unwrap();
        assert!(sealed.diagnostics.is_empty());

        let opened = pipeline.decrypt_and_uncompress(&sealed.bytes, None).unwrap();
        assert_eq!(opened.bytes, data);
        assert!(opened.diagnostics.is_empty());
    }

    #[test]
    fn round_trips_empty_buffer() {
        let pipeline = fake_pipeline();

        let sealed = pipeline
            .compress_and_encrypt(b"", Some(b"\x7f".as_slice()), "archive-key")
            .unwrap();
        let opened = pipeline
            .decrypt_and_uncompress(&sealed.bytes, Some(b"\x7f".as_slice()))
            .unwrap();
        assert!(opened.bytes.is_empty());
    }

    #[test]
    fn compressor_diagnostics_are_fatal() {
        let pipeline = TransformPipeline::with_stages(
            Box::new(NoisyStage),
            Box::new(FakeDecompress),
            Box::new(FakeCrypto),
        );
        let err = pipeline.compress_and_encrypt(b"x", None, "r").unwrap_err();
        match err {
            PipelineError::ExternalTool { tool, message } => {
                assert_eq!(tool, "noisy");
                assert!(message.contains("unexpected chatter"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decompressor_diagnostics_are_fatal() {
        let pipeline = TransformPipeline::with_stages(
            Box::new(FakeCompress),
            Box::new(NoisyStage),
            Box::new(FakeCrypto),
        );
        let err = pipeline.decrypt_and_uncompress(b"x", None).unwrap_err();
        assert!(matches!(err, PipelineError::ExternalTool { tool, .. } if tool == "noisy"));
    }

    #[test]
    fn corrupt_input_fails_decompression() {
        let pipeline = fake_pipeline();
        let err = pipeline
            .decrypt_and_uncompress(b"not a compressed buffer", None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalTool { .. }));
    }

    #[test]
    fn concurrent_calls_are_independent() {
        use std::sync::Arc;

        let pipeline = Arc::new(fake_pipeline());
        let handles: Vec<_> = (0u8..4)
            .map(|i| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || {
                    let data = vec![i; 128];
                    let key = [i ^ 0x55];
                    let sealed = pipeline
                        .compress_and_encrypt(&data, Some(key.as_slice()), "archive-key")
                        .unwrap();
                    let opened = pipeline
                        .decrypt_and_uncompress(&sealed.bytes, Some(key.as_slice()))
                        .unwrap();
                    assert_eq!(opened.bytes, data);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
