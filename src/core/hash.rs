use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} not found; install it or pass its location explicitly")]
    ToolMissing { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Frame decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("No frames could be extracted")]
    NoFrames,

    #[error("Timed out")]
    TimedOut,

    #[error("Hashing panicked: {0}")]
    Panicked(String),

    #[error("Cannot hash: {reason}")]
    Unhashable { reason: String },
}

/// Fixed-width perceptual fingerprint of one video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    bytes: Box<[u8]>,
}

impl Fingerprint {
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Width in bits.
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Lowercase hex, as written to `videos.json`.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Number of differing bits, or `None` when the widths differ.
    pub fn hamming_distance(&self, other: &Fingerprint) -> Option<u32> {
        if self.bytes.len() != other.bytes.len() {
            return None;
        }
        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A fingerprint together with the scratch storage the hasher left behind.
///
/// Call [`HashedVideo::finish`] to release the scratch directory and take the
/// fingerprint. Dropping the value without finishing also removes the
/// directory, but silently.
#[derive(Debug)]
pub struct HashedVideo {
    fingerprint: Fingerprint,
    scratch: Option<TempDir>,
}

impl HashedVideo {
    pub fn new(fingerprint: Fingerprint, scratch: Option<TempDir>) -> Self {
        Self {
            fingerprint,
            scratch,
        }
    }

    #[cfg(test)]
    pub(crate) fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    pub fn finish(self) -> Fingerprint {
        if let Some(scratch) = self.scratch {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                log::warn!("Failed to remove scratch dir {}: {}", path.display(), e);
            }
        }
        self.fingerprint
    }
}

/// The perceptual hashing collaborator.
///
/// Implementations must be safe to call from several pool workers at once.
pub trait VideoHasher: Send + Sync {
    /// When `deadline` is set and passes, stop any child work, release scratch
    /// storage and return [`FingerprintError::TimedOut`].
    fn fingerprint(
        &self,
        path: &Path,
        deadline: Option<Instant>,
    ) -> Result<HashedVideo, FingerprintError>;

    fn is_similar(&self, a: &Fingerprint, b: &Fingerprint) -> bool;
}
