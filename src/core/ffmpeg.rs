use crate::config::HashOptions;
use crate::core::hash::{Fingerprint, FingerprintError, HashedVideo, VideoHasher};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use image_hasher::{HashAlg, HasherConfig};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Edge length, in bits, of the collage hash. 8x8 gives a 64-bit fingerprint.
const HASH_EDGE: u32 = 8;

const FRAME_PREFIX: &str = "frame-";
const FFMPEG_LOG: &str = "ffmpeg.log";

/// How often a running ffmpeg is checked for exit or an expired deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Samples frames with ffmpeg, tiles them into one collage and hashes it.
#[derive(Debug, Clone)]
pub struct FfmpegHasher {
    options: HashOptions,
}

impl FfmpegHasher {
    pub fn new(options: HashOptions) -> Self {
        Self { options }
    }

    fn tool_name(&self) -> String {
        self.options.ffmpeg.display().to_string()
    }

    fn extract_frames(
        &self,
        video: &Path,
        scratch: &Path,
        deadline: Option<Instant>,
    ) -> Result<(), FingerprintError> {
        let io_error = |source: std::io::Error| FingerprintError::Io {
            path: video.to_path_buf(),
            source,
        };

        // stderr goes to a file so a chatty ffmpeg never blocks on a full pipe.
        let log_path = scratch.join(FFMPEG_LOG);
        let log = File::create(&log_path).map_err(io_error)?;

        let size = self.options.frame_size.max(1);
        let spawned = Command::new(&self.options.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(format!("fps=1,scale={size}:{size}"))
            .arg("-frames:v")
            .arg(self.options.frames.max(1).to_string())
            .arg(scratch.join(format!("{FRAME_PREFIX}%04d.png")))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FingerprintError::ToolMissing {
                    tool: self.tool_name(),
                });
            }
            Err(e) => return Err(io_error(e)),
        };

        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_error)? {
                break status;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::debug!("Killing {} on {}", self.tool_name(), video.display());
                // kill fails only if the child already exited; wait reaps it either way.
                let _ = child.kill();
                child.wait().map_err(io_error)?;
                return Err(FingerprintError::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = fs::read_to_string(&log_path).unwrap_or_default();
            return Err(FingerprintError::ToolFailed {
                tool: self.tool_name(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn frame_paths(scratch: &Path) -> Vec<PathBuf> {
        WalkDir::new(scratch)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().starts_with(FRAME_PREFIX))
            .map(|e| e.into_path())
            .collect()
    }

    fn scratch_dir(&self, video: &Path) -> Result<TempDir, FingerprintError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("duplicate-videos-");
        let scratch = match &self.options.scratch_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        scratch.map_err(|e| FingerprintError::Io {
            path: video.to_path_buf(),
            source: e,
        })
    }

    /// Tile frames row-major into a square-ish grid.
    fn collage(&self, frames: &[PathBuf]) -> Result<RgbImage, FingerprintError> {
        let size = self.options.frame_size.max(1);
        let columns = (frames.len() as f64).sqrt().ceil().max(1.0) as u32;
        let rows = (frames.len() as u32).div_ceil(columns);
        let mut canvas = RgbImage::new(columns * size, rows * size);

        for (i, frame) in frames.iter().enumerate() {
            let img = image::open(frame)?.to_rgb8();
            let img = if img.dimensions() == (size, size) {
                img
            } else {
                imageops::resize(&img, size, size, FilterType::Triangle)
            };
            let (col, row) = (i as u32 % columns, i as u32 / columns);
            imageops::replace(&mut canvas, &img, (col * size) as i64, (row * size) as i64);
        }
        Ok(canvas)
    }

    /// Perceptual hash of an already assembled collage.
    pub fn hash_collage(collage: RgbImage) -> Fingerprint {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(HASH_EDGE, HASH_EDGE)
            .to_hasher();
        let hash = hasher.hash_image(&DynamicImage::ImageRgb8(collage));
        Fingerprint::from_bytes(hash.as_bytes().to_vec())
    }
}

impl Default for FfmpegHasher {
    fn default() -> Self {
        Self::new(HashOptions::default())
    }
}

impl VideoHasher for FfmpegHasher {
    fn fingerprint(
        &self,
        path: &Path,
        deadline: Option<Instant>,
    ) -> Result<HashedVideo, FingerprintError> {
        let scratch = self.scratch_dir(path)?;

        // On any early return `scratch` is dropped and removed.
        self.extract_frames(path, scratch.path(), deadline)?;
        let frames = Self::frame_paths(scratch.path());
        if frames.is_empty() {
            return Err(FingerprintError::NoFrames);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(FingerprintError::TimedOut);
        }
        let collage = self.collage(&frames)?;

        Ok(HashedVideo::new(Self::hash_collage(collage), Some(scratch)))
    }

    fn is_similar(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        a.hamming_distance(b)
            .is_some_and(|distance| distance <= self.options.max_distance)
    }
}
