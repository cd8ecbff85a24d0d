use crate::core::catalog::Catalog;
use crate::core::error::ScanError;
use crate::core::hash::{Fingerprint, FingerprintError, VideoHasher};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fingerprints every pending record of a catalog on a fixed-size pool.
///
/// A failure on one file is stored on that record and never stops the
/// others. [`FingerprintEngine::compute`] returns only once every record has
/// a terminal outcome.
pub struct FingerprintEngine {
    hasher: Arc<dyn VideoHasher>,
    workers: usize,
    timeout: Option<Duration>,
    progress: ProgressBar,
}

impl FingerprintEngine {
    pub fn new(hasher: Arc<dyn VideoHasher>) -> Self {
        Self {
            hasher,
            workers: num_cpus::get(),
            timeout: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn compute(&self, catalog: Catalog) -> Result<Catalog, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("fingerprint-{i}"))
            .build()?;

        let pending = catalog.records().iter().filter(|r| r.is_pending()).count();
        self.progress.set_length(pending as u64);

        let records = pool.install(|| {
            catalog
                .into_records()
                .into_par_iter()
                .map(|record| {
                    if !record.is_pending() {
                        return record;
                    }
                    self.progress.set_message(file_label(record.path()));
                    let outcome = self.fingerprint_one(record.path());
                    if let Err(e) = &outcome {
                        log::warn!("Failed to fingerprint {}: {}", record.path().display(), e);
                    }
                    self.progress.inc(1);
                    record.with_outcome(outcome)
                })
                .collect::<Vec<_>>()
        });

        self.progress.finish_and_clear();
        Ok(Catalog::new(records))
    }

    /// Runs on the pool worker itself: a deadline is handed to the hasher,
    /// which must stop its own work, so nothing outlives [`Self::compute`].
    fn fingerprint_one(&self, path: &Path) -> Result<Fingerprint, FingerprintError> {
        let deadline = self.timeout.map(|limit| Instant::now() + limit);
        let hashed = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.hasher.fingerprint(path, deadline)
        })) {
            Ok(result) => result?,
            Err(payload) => return Err(FingerprintError::Panicked(panic_message(payload.as_ref()))),
        };

        // A hasher that ignored the deadline still gets a timed-out outcome.
        if deadline.is_some_and(|d| Instant::now() > d) {
            hashed.finish();
            return Err(FingerprintError::TimedOut);
        }
        Ok(hashed.finish())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::VideoRecord;
    use crate::core::hash::HashedVideo;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    /// Fingerprint is the file name's bytes; scratch dirs are tracked so
    /// tests can check they were removed.
    #[derive(Default)]
    struct FakeHasher {
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
        /// Delay applied to one file name, or to every file when the name is "*".
        slow_on: Option<(&'static str, Duration)>,
        ignore_deadline: bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        scratch_dirs: Mutex<Vec<PathBuf>>,
    }

    impl FakeHasher {
        /// Sleeps in short steps, giving up like a real hasher would once the
        /// deadline passes.
        fn work(&self, delay: Duration, deadline: Option<Instant>) -> bool {
            let until = Instant::now() + delay;
            while Instant::now() < until {
                if !self.ignore_deadline && deadline.is_some_and(|d| Instant::now() >= d) {
                    return false;
                }
                thread::sleep(Duration::from_millis(10));
            }
            true
        }
    }

    impl VideoHasher for FakeHasher {
        fn fingerprint(
            &self,
            path: &Path,
            deadline: Option<Instant>,
        ) -> Result<HashedVideo, FingerprintError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let scratch = TempDir::new().unwrap();
            self.scratch_dirs
                .lock()
                .unwrap()
                .push(scratch.path().to_path_buf());

            let name = file_label(path);
            let mut delay = Duration::from_millis(20);
            if let Some((slow, extra)) = self.slow_on {
                if slow == "*" || name == slow {
                    delay += extra;
                }
            }
            let finished = self.work(delay, deadline);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if !finished {
                drop(scratch);
                return Err(FingerprintError::TimedOut);
            }
            if self.panic_on == Some(name.as_str()) {
                panic!("decoder blew up");
            }
            if self.fail_on == Some(name.as_str()) {
                return Err(FingerprintError::Unhashable {
                    reason: "corrupt stream".to_string(),
                });
            }
            Ok(HashedVideo::new(
                Fingerprint::from_bytes(name.into_bytes()),
                Some(scratch),
            ))
        }

        fn is_similar(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
            a == b
        }
    }

    fn catalog(names: &[&str]) -> Catalog {
        Catalog::new(
            names
                .iter()
                .map(|n| VideoRecord::new(format!("/videos/{n}")))
                .collect(),
        )
    }

    #[test]
    fn test_every_record_gets_an_outcome() {
        let hasher = Arc::new(FakeHasher::default());
        let engine = FingerprintEngine::new(hasher.clone()).with_workers(4);

        let result = engine.compute(catalog(&["a.mp4", "b.mp4", "c.mp4"])).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.hashed_count(), 3);
        assert!(result.records().iter().all(|r| !r.is_pending()));
        assert_eq!(
            result.records()[1].fingerprint().unwrap().as_bytes(),
            b"b.mp4"
        );
    }

    #[test]
    fn test_failure_is_isolated_to_one_record() {
        let hasher = Arc::new(FakeHasher {
            fail_on: Some("b.mp4"),
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher).with_workers(2);

        let result = engine
            .compute(catalog(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]))
            .unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.hashed_count(), 3);
        let failures: Vec<_> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, Path::new("/videos/b.mp4"));
    }

    #[test]
    fn test_panic_is_isolated_to_one_record() {
        let hasher = Arc::new(FakeHasher {
            panic_on: Some("a.mp4"),
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher).with_workers(2);

        let result = engine.compute(catalog(&["a.mp4", "b.mp4"])).unwrap();

        assert!(matches!(
            result.records()[0].error(),
            Some(FingerprintError::Panicked(msg)) if msg.contains("decoder blew up")
        ));
        assert!(result.records()[1].fingerprint().is_some());
    }

    #[test]
    fn test_scratch_storage_is_released() {
        let hasher = Arc::new(FakeHasher {
            fail_on: Some("b.mp4"),
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher.clone()).with_workers(2);
        engine.compute(catalog(&["a.mp4", "b.mp4", "c.mp4"])).unwrap();

        let dirs = hasher.scratch_dirs.lock().unwrap();
        assert_eq!(dirs.len(), 3);
        assert!(dirs.iter().all(|d| !d.exists()));
    }

    #[test]
    fn test_single_worker_runs_one_at_a_time() {
        let hasher = Arc::new(FakeHasher::default());
        let engine = FingerprintEngine::new(hasher.clone()).with_workers(1);
        engine
            .compute(catalog(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]))
            .unwrap();

        assert_eq!(hasher.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let engine = FingerprintEngine::new(Arc::new(FakeHasher::default())).with_workers(0);
        assert_eq!(engine.workers(), 1);
    }

    #[test]
    fn test_catalog_order_is_preserved() {
        let names = ["e.mp4", "a.mp4", "d.mp4", "b.mp4", "c.mp4"];
        let engine = FingerprintEngine::new(Arc::new(FakeHasher::default())).with_workers(3);
        let result = engine.compute(catalog(&names)).unwrap();

        let order: Vec<String> = result
            .records()
            .iter()
            .map(|r| file_label(r.path()))
            .collect();
        assert_eq!(order, names);
    }

    #[test]
    fn test_terminal_records_are_not_rehashed() {
        let hasher = Arc::new(FakeHasher::default());
        let engine = FingerprintEngine::new(hasher.clone()).with_workers(2);

        let first = engine.compute(catalog(&["a.mp4", "b.mp4"])).unwrap();
        let second = engine.compute(first).unwrap();

        assert_eq!(hasher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.hashed_count(), 2);
    }

    #[test]
    fn test_timeout_marks_slow_file() {
        let hasher = Arc::new(FakeHasher {
            slow_on: Some(("slow.mp4", Duration::from_millis(1500))),
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher)
            .with_workers(2)
            .with_timeout(Some(Duration::from_millis(300)));

        let result = engine.compute(catalog(&["fast.mp4", "slow.mp4"])).unwrap();

        assert!(result.records()[0].fingerprint().is_some());
        assert!(matches!(
            result.records()[1].error(),
            Some(FingerprintError::TimedOut)
        ));
    }

    #[test]
    fn test_timed_out_work_does_not_outlive_compute() {
        let hasher = Arc::new(FakeHasher {
            slow_on: Some(("*", Duration::from_millis(800))),
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher.clone())
            .with_workers(1)
            .with_timeout(Some(Duration::from_millis(50)));

        let started = Instant::now();
        let result = engine
            .compute(catalog(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]))
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(4 * 800));
        assert!(
            result
                .records()
                .iter()
                .all(|r| matches!(r.error(), Some(FingerprintError::TimedOut)))
        );
        // Nothing still running once compute is back, and never more than
        // the single worker at a time.
        assert_eq!(hasher.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(hasher.max_in_flight.load(Ordering::SeqCst), 1);
        let dirs = hasher.scratch_dirs.lock().unwrap();
        assert_eq!(dirs.len(), 4);
        assert!(dirs.iter().all(|d| !d.exists()));
    }

    #[test]
    fn test_late_result_is_recorded_as_timed_out() {
        let hasher = Arc::new(FakeHasher {
            slow_on: Some(("late.mp4", Duration::from_millis(200))),
            ignore_deadline: true,
            ..FakeHasher::default()
        });
        let engine = FingerprintEngine::new(hasher.clone())
            .with_workers(1)
            .with_timeout(Some(Duration::from_millis(50)));

        let result = engine.compute(catalog(&["late.mp4"])).unwrap();

        assert!(matches!(
            result.records()[0].error(),
            Some(FingerprintError::TimedOut)
        ));
        let dirs = hasher.scratch_dirs.lock().unwrap();
        assert!(dirs.iter().all(|d| !d.exists()));
    }

    #[test]
    fn test_empty_catalog() {
        let engine = FingerprintEngine::new(Arc::new(FakeHasher::default())).with_workers(2);
        assert!(engine.compute(Catalog::default()).unwrap().is_empty());
    }
}
