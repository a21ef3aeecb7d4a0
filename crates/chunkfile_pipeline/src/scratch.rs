//! Ephemeral scratch key stores.
//!
//! Each encrypt/decrypt call imports its key material into a private,
//! uniquely-named directory that exists only for the duration of that call.
//! Removal happens in `Drop`, so the directory is cleaned up on every exit
//! path - normal completion, early return, or failure.

use crate::error::PipelineResult;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A per-call ephemeral directory holding imported key material.
///
/// Names are derived from a random UUID, so concurrent calls never share or
/// race on a scratch directory. The directory is removed when the store is
/// dropped.
#[derive(Debug)]
pub struct ScratchKeyStore {
    path: PathBuf,
}

impl ScratchKeyStore {
    /// Creates a fresh scratch key store under `root`.
    ///
    /// On Unix the directory is created with owner-only permissions, which
    /// gpg requires for a homedir.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(root: &Path) -> PipelineResult<Self> {
        let path = root.join(format!("keystore-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        }

        tracing::debug!(path = %path.display(), "created scratch key store");
        Ok(Self { path })
    }

    /// Returns the path of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes key material into the store and returns the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn import_key(&self, name: &str, material: &[u8]) -> PipelineResult<PathBuf> {
        let key_path = self.path.join(name);
        fs::write(&key_path, material)?;
        Ok(key_path)
    }
}

impl Drop for ScratchKeyStore {
    fn drop(&mut self) {
        // Unconditional cleanup; a failure here must not mask the real error.
        let _ = fs::remove_dir_all(&self.path);
    }
}
