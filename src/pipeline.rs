use crate::config::ScanOptions;
use crate::core::catalog::CatalogBuilder;
use crate::core::classifier::FileClassifier;
use crate::core::duplicate::find_duplicates;
use crate::core::engine::FingerprintEngine;
use crate::core::error::ScanError;
use crate::core::hash::VideoHasher;
use crate::core::report;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub videos: usize,
    pub hashed: usize,
    /// Path and cause of every fingerprint failure.
    pub failed: Vec<(PathBuf, String)>,
    pub duplicate_pairs: usize,
    pub videos_path: PathBuf,
    pub duplicates_path: PathBuf,
}

/// Scan, fingerprint, write `videos.json`, match, write `duplicates.json`.
///
/// Only an invalid directory or an unwritable output stops the run; files
/// that cannot be classified or hashed are logged and carried on.
pub fn run(options: &ScanOptions, hasher: Arc<dyn VideoHasher>) -> Result<RunSummary, ScanError> {
    if let Ok(json) = serde_json::to_string(options) {
        log::debug!("Options: {}", json);
    }

    let builder = CatalogBuilder::new(FileClassifier::with_sniff_len(options.sniff_len));
    let catalog = benchmark("cataloguing videos", || builder.build(&options.directory))?;
    log::info!("Found {} video(s)", catalog.len());

    let engine = FingerprintEngine::new(Arc::clone(&hasher))
        .with_workers(options.worker_count())
        .with_timeout(options.file_timeout())
        .with_progress(progress_bar(options.progress));
    log::info!("Fingerprinting with {} worker(s)", engine.workers());
    let catalog = benchmark("fingerprinting", || engine.compute(catalog))?;

    let failed: Vec<(PathBuf, String)> = catalog
        .failures()
        .map(|(path, e)| (path.to_path_buf(), e.to_string()))
        .collect();
    log::info!(
        "Fingerprinted {} of {} video(s), {} failed",
        catalog.hashed_count(),
        catalog.len(),
        failed.len()
    );

    let videos_path = options.videos_path();
    report::save_catalog(&videos_path, &catalog)?;

    let pairs = benchmark("matching", || {
        find_duplicates(&catalog, options.pair_order, |a, b| hasher.is_similar(a, b))
    });
    log::info!("Found {} duplicate pair(s)", pairs.len());

    let duplicates_path = options.duplicates_path();
    report::save_duplicates(&duplicates_path, &pairs)?;

    Ok(RunSummary {
        videos: catalog.len(),
        hashed: catalog.hashed_count(),
        failed,
        duplicate_pairs: pairs.len(),
        videos_path,
        duplicates_path,
    })
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    ProgressBar::new(0).with_style(style)
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("{} took {:.2?}", label, start.elapsed());
    result
}
