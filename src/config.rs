use crate::core::classifier::DEFAULT_SNIFF_LEN;
use crate::core::duplicate::PairOrder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const VIDEOS_FILE: &str = "videos.json";
pub const DUPLICATES_FILE: &str = "duplicates.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    pub directory: PathBuf,
    pub output_dir: PathBuf,
    /// Fingerprint workers; 0 means one per CPU.
    pub workers: usize,
    pub file_timeout_secs: Option<u64>,
    pub pair_order: PairOrder,
    pub sniff_len: usize,
    pub progress: bool,
}

impl ScanOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    pub fn file_timeout(&self) -> Option<Duration> {
        self.file_timeout_secs.map(Duration::from_secs)
    }

    pub fn videos_path(&self) -> PathBuf {
        self.output_dir.join(VIDEOS_FILE)
    }

    pub fn duplicates_path(&self) -> PathBuf {
        self.output_dir.join(DUPLICATES_FILE)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            workers: 0,
            file_timeout_secs: None,
            pair_order: PairOrder::Ordered,
            sniff_len: DEFAULT_SNIFF_LEN,
            progress: true,
        }
    }
}

/// Settings for the ffmpeg-backed hasher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashOptions {
    pub ffmpeg: PathBuf,
    /// Frames sampled at one per second from the start of the video.
    pub frames: u32,
    /// Edge length in pixels each frame is scaled to.
    pub frame_size: u32,
    /// Largest Hamming distance still counted as similar.
    pub max_distance: u32,
    /// Parent of the per-file scratch dirs; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            frames: 16,
            frame_size: 64,
            max_distance: 15,
            scratch_dir: None,
        }
    }
}
