use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bytes read from the head of each file for content sniffing.
pub const DEFAULT_SNIFF_LEN: usize = 2048;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decides which files a catalog keeps.
pub trait VideoClassifier: Send + Sync {
    fn is_video(&self, path: &Path) -> Result<bool, ClassificationError>;
}

/// Decides whether a file is a video by its leading bytes, never by extension.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    sniff_len: usize,
}

impl FileClassifier {
    pub fn new() -> Self {
        Self::with_sniff_len(DEFAULT_SNIFF_LEN)
    }

    pub fn with_sniff_len(sniff_len: usize) -> Self {
        Self {
            sniff_len: sniff_len.max(1),
        }
    }

    /// MIME type sniffed from the file's prefix, if any signature matched.
    pub fn classify(&self, path: &Path) -> Result<Option<&'static str>, ClassificationError> {
        let unreadable = |source| ClassificationError::Unreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let mut prefix = Vec::with_capacity(self.sniff_len);
        file.take(self.sniff_len as u64)
            .read_to_end(&mut prefix)
            .map_err(unreadable)?;

        Ok(infer::get(&prefix).map(|kind| kind.mime_type()))
    }

    pub fn is_video(&self, path: &Path) -> Result<bool, ClassificationError> {
        Ok(self
            .classify(path)?
            .is_some_and(|mime| mime.starts_with("video/")))
    }
}

impl VideoClassifier for FileClassifier {
    fn is_video(&self, path: &Path) -> Result<bool, ClassificationError> {
        FileClassifier::is_video(self, path)
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Minimal ISO-BMFF header that sniffs as `video/mp4`. `tag` makes the
    /// payload distinct so files can differ in content.
    pub fn write_mp4(path: &Path, tag: &[u8]) {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        bytes.extend_from_slice(b"isomiso2");
        bytes.extend_from_slice(b"\x00\x00\x00\x08free");
        bytes.extend_from_slice(tag);
        std::fs::write(path, bytes).unwrap();
    }

    /// Minimal RIFF/AVI header that sniffs as `video/x-msvideo`.
    pub fn write_avi(path: &Path, tag: &[u8]) {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(b"AVI LIST");
        bytes.extend_from_slice(tag);
        std::fs::write(path, bytes).unwrap();
    }
}
