//! Crypto backend capability and the gpg implementation.

use crate::error::PipelineResult;
use crate::scratch::ScratchKeyStore;
use crate::stage::{CommandStage, StageOutput, TransformStage, DEFAULT_STAGE_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Encrypts and decrypts whole buffers with caller-supplied key material.
///
/// Implementations isolate every call: key material imported for one call
/// must never be visible to another.
pub trait CryptoBackend: Send + Sync {
    /// Encrypts `input` for `recipient` using the supplied public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption tool cannot run or fails.
    fn encrypt(&self, input: &[u8], public_key: &[u8], recipient: &str)
        -> PipelineResult<StageOutput>;

    /// Decrypts `input` using the supplied private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the decryption tool cannot run or fails.
    fn decrypt(&self, input: &[u8], private_key: &[u8]) -> PipelineResult<StageOutput>;
}

/// File name the key material is imported under inside the scratch store.
const KEY_FILE: &str = "key.asc";

/// A [`CryptoBackend`] that drives the external `gpg` binary.
///
/// Per call, the key material is imported into a fresh scratch key store
/// used as the gpg homedir, and gpg runs stdin-to-stdout under a
/// trust-always policy. The scratch store is removed on every exit path.
/// Gpg habitually writes informational banners to stderr, so stage
/// diagnostics are collected and passed along rather than treated as fatal.
#[derive(Debug, Clone)]
pub struct GpgBackend {
    program: String,
    scratch_root: PathBuf,
    timeout: Duration,
}

impl GpgBackend {
    /// Creates a backend invoking `gpg` with scratch stores under the
    /// system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "gpg".into(),
            scratch_root: std::env::temp_dir(),
            timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Overrides where scratch key stores are created.
    #[must_use]
    pub fn with_scratch_root(mut self, root: &Path) -> Self {
        self.scratch_root = root.to_path_buf();
        self
    }

    /// Overrides the per-stage deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn homedir_args(&self, keystore: &ScratchKeyStore) -> Vec<String> {
        vec![
            "--no-permission-warning".into(),
            "--homedir".into(),
            keystore.path().display().to_string(),
        ]
    }

    /// Imports key material into the scratch store's gpg homedir.
    ///
    /// Gpg logs import results to stderr; that text is returned as
    /// diagnostics for the caller's log.
    fn import(&self, keystore: &ScratchKeyStore, material: &[u8]) -> PipelineResult<Vec<String>> {
        let key_path = keystore.import_key(KEY_FILE, material)?;

        let mut args = self.homedir_args(keystore);
        args.push("--import".into());
        args.push(key_path.display().to_string());

        let stage = CommandStage::new("gpg-import", self.program.clone(), args, self.timeout);
        let out = stage.run(&[])?;
        Ok(out.diagnostics)
    }
}

impl Default for GpgBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoBackend for GpgBackend {
    fn encrypt(
        &self,
        input: &[u8],
        public_key: &[u8],
        recipient: &str,
    ) -> PipelineResult<StageOutput> {
        let keystore = ScratchKeyStore::create(&self.scratch_root)?;
        let mut diagnostics = self.import(&keystore, public_key)?;

        // Compression is already done by the pipeline, so gpg runs with -z 0.
        let mut args = self.homedir_args(&keystore);
        args.extend(
            [
                "-r",
                recipient,
                "-z",
                "0",
                "--trust-model",
                "always",
                "--output",
                "-",
                "--encrypt",
                "-",
            ]
            .map(String::from),
        );

        let stage = CommandStage::new("gpg-encrypt", self.program.clone(), args, self.timeout);
        let out = stage.run(input)?;
        diagnostics.extend(out.diagnostics);
        Ok(StageOutput {
            bytes: out.bytes,
            diagnostics,
        })
    }

    fn decrypt(&self, input: &[u8], private_key: &[u8]) -> PipelineResult<StageOutput> {
        let keystore = ScratchKeyStore::create(&self.scratch_root)?;
        let mut diagnostics = self.import(&keystore, private_key)?;

        let mut args = self.homedir_args(&keystore);
        args.extend(
            [
                "--trust-model",
                "always",
                "--output",
                "-",
                "--decrypt",
                "-",
            ]
            .map(String::from),
        );

        let stage = CommandStage::new("gpg-decrypt", self.program.clone(), args, self.timeout);
        let out = stage.run(input)?;
        diagnostics.extend(out.diagnostics);
        Ok(StageOutput {
            bytes: out.bytes,
            diagnostics,
        })
    }
}
