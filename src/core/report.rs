use crate::core::catalog::{Catalog, VideoRecord};
use crate::core::duplicate::DuplicatePair;
use serde::{Deserialize, Serialize, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One `videos.json` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub path: String,
    pub hash: String,
}

impl From<&VideoRecord> for VideoEntry {
    fn from(record: &VideoRecord) -> Self {
        Self {
            path: posix_path(record.path()),
            hash: record
                .fingerprint()
                .map(|fp| fp.to_hex())
                .unwrap_or_default(),
        }
    }
}

impl Serialize for DuplicatePair<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (VideoEntry::from(self.first), VideoEntry::from(self.second)).serialize(serializer)
    }
}

/// Path with forward slashes regardless of platform.
///
/// Paths that are not valid UTF-8 are written in lossy form, with U+FFFD in
/// place of the bad bytes.
pub fn posix_path(path: &Path) -> String {
    if path.to_str().is_none() {
        log::warn!("Path is not valid UTF-8, writing lossy form: {}", path.display());
    }
    let display = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        display.into_owned()
    } else {
        display.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

pub fn write_catalog<W: Write>(sink: W, catalog: &Catalog) -> Result<(), ReportError> {
    let entries: Vec<VideoEntry> = catalog.records().iter().map(VideoEntry::from).collect();
    write_json(sink, &entries)
}

pub fn write_duplicates<W: Write>(sink: W, pairs: &[DuplicatePair<'_>]) -> Result<(), ReportError> {
    write_json(sink, pairs)
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut sink: W, value: &T) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut sink, value)?;
    sink.write_all(b"\n").map_err(serde_json::Error::io)?;
    sink.flush().map_err(serde_json::Error::io)?;
    Ok(())
}

/// Create (or truncate) `path` and hand a buffered writer to `write`.
pub fn save<F>(path: &Path, write: F) -> Result<(), ReportError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ReportError>,
{
    let file = File::create(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    write(&mut out)
}

pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<(), ReportError> {
    save(path, |out| write_catalog(out, catalog))
}

pub fn save_duplicates(path: &Path, pairs: &[DuplicatePair<'_>]) -> Result<(), ReportError> {
    save(path, |out| write_duplicates(out, pairs))
}
