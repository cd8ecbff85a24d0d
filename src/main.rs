use anyhow::{Context, Result};
use clap::Parser;
use duplicate_videos::pipeline;
use duplicate_videos::{FfmpegHasher, HashOptions, PairOrder, ScanOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "duplicate-videos",
    version,
    about = "Finds duplicate videos for given path"
)]
struct Cli {
    /// Directory to scan (top level only)
    #[arg(value_name = "PATH", value_parser = valid_directory_path)]
    path: PathBuf,

    /// Directory to write videos.json and duplicates.json into
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Fingerprint workers (default: one per CPU)
    #[arg(long, value_name = "N", default_value_t = 0)]
    workers: usize,

    /// Give up on a single file after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Report each duplicate pair once instead of in both orders
    #[arg(long)]
    unique_pairs: bool,

    /// Largest fingerprint bit difference still counted as a duplicate
    #[arg(long, value_name = "BITS")]
    max_distance: Option<u32>,

    /// Frames sampled per video
    #[arg(long, value_name = "N")]
    frames: Option<u32>,

    /// ffmpeg executable to use
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Directory for per-file scratch frames (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            directory: self.path.clone(),
            output_dir: self.output_dir.clone(),
            workers: self.workers,
            file_timeout_secs: self.timeout,
            pair_order: if self.unique_pairs {
                PairOrder::Unordered
            } else {
                PairOrder::Ordered
            },
            progress: !self.no_progress,
            ..ScanOptions::default()
        }
    }

    fn hash_options(&self) -> HashOptions {
        let defaults = HashOptions::default();
        HashOptions {
            ffmpeg: self.ffmpeg.clone().unwrap_or(defaults.ffmpeg),
            frames: self.frames.unwrap_or(defaults.frames),
            max_distance: self.max_distance.unwrap_or(defaults.max_distance),
            scratch_dir: self.scratch_dir.clone(),
            ..defaults
        }
    }
}

fn valid_directory_path(arg: &str) -> Result<PathBuf, String> {
    let path = std::path::absolute(arg).map_err(|e| e.to_string())?;
    if path.is_dir() {
        Ok(path)
    } else {
        Err("Invalid directory path".to_string())
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = cli.scan_options();
    let hasher = Arc::new(FfmpegHasher::new(cli.hash_options()));

    println!("▶ Scanning for videos in: {}", options.directory.display());
    let summary = pipeline::run(&options, hasher)
        .with_context(|| format!("Failed to scan {}", options.directory.display()))?;

    println!(
        "▶ Fingerprinted {} of {} video(s)",
        summary.hashed, summary.videos
    );
    for (path, cause) in &summary.failed {
        println!("   ⚠️  {}: {}", path.display(), cause);
    }
    if summary.duplicate_pairs == 0 {
        println!("No duplicates found.");
    } else {
        println!("Found {} duplicate pair(s).", summary.duplicate_pairs);
    }
    println!(
        "✅ Wrote {} and {}",
        summary.videos_path.display(),
        summary.duplicates_path.display()
    );

    Ok(())
}
