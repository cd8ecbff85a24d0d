use crate::core::classifier::{FileClassifier, VideoClassifier};
use crate::core::error::ScanError;
use crate::core::hash::{Fingerprint, FingerprintError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where a record is in its fingerprint lifecycle.
#[derive(Debug)]
pub enum FingerprintState {
    Pending,
    Hashed(Fingerprint),
    Failed(FingerprintError),
}

/// One discovered video file.
#[derive(Debug)]
pub struct VideoRecord {
    path: PathBuf,
    state: FingerprintState,
}

impl VideoRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: FingerprintState::Pending,
        }
    }

    /// Terminal copy of this record. Records already hashed or failed keep
    /// their first outcome.
    pub fn with_outcome(self, outcome: Result<Fingerprint, FingerprintError>) -> Self {
        if !self.is_pending() {
            return self;
        }
        let state = match outcome {
            Ok(fingerprint) => FingerprintState::Hashed(fingerprint),
            Err(e) => FingerprintState::Failed(e),
        };
        Self {
            path: self.path,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &FingerprintState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FingerprintState::Pending)
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match &self.state {
            FingerprintState::Hashed(fp) => Some(fp),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FingerprintError> {
        match &self.state {
            FingerprintState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// All video records from one scan, in directory-listing order.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<VideoRecord>,
}

impl Catalog {
    pub fn new(records: Vec<VideoRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[VideoRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VideoRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn hashed_count(&self) -> usize {
        self.records.iter().filter(|r| r.fingerprint().is_some()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &FingerprintError)> {
        self.records
            .iter()
            .filter_map(|r| r.error().map(|e| (r.path(), e)))
    }
}

/// Resolve `dir` to an absolute path of an existing directory.
pub fn validate_directory(dir: &Path) -> Result<PathBuf, ScanError> {
    let invalid = |reason: &str| ScanError::InvalidPath {
        path: dir.display().to_string(),
        reason: reason.to_string(),
    };

    let absolute = std::path::absolute(dir).map_err(|e| invalid(&e.to_string()))?;
    if !absolute.exists() {
        return Err(invalid("does not exist"));
    }
    if !absolute.is_dir() {
        return Err(invalid("not a directory"));
    }
    Ok(absolute)
}

/// Lists the top level of a directory and keeps the files that sniff as video.
///
/// Entries that cannot be listed or classified are logged and left out; they
/// never fail the build.
pub struct CatalogBuilder {
    classifier: Box<dyn VideoClassifier>,
}

impl CatalogBuilder {
    pub fn new(classifier: impl VideoClassifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    pub fn build(&self, dir: &Path) -> Result<Catalog, ScanError> {
        let root = validate_directory(dir)?;
        let mut records = Vec::new();

        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match self.classifier.is_video(path) {
                Ok(true) => {
                    log::debug!("Video: {}", path.display());
                    records.push(VideoRecord::new(path));
                }
                Ok(false) => log::debug!("Not a video: {}", path.display()),
                Err(e) => log::warn!("Excluding {}: {}", path.display(), e),
            }
        }

        Ok(Catalog::new(records))
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new(FileClassifier::default())
    }
}
