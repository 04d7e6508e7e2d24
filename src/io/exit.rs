use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, info};

use crate::io::gpio::PinError;

/// Something that must be closed before the process goes away.
pub trait ForceClose: Send + Sync {
    fn pin(&self) -> i64;

    fn is_open(&self) -> bool;

    /// The driver has been asked to open the pin and has not answered yet.
    fn is_opening(&self) -> bool;

    /// Closes the pin, first waiting up to `settle` for an open in flight.
    ///
    /// Returns whether a session was closed. A pin still opening once `settle`
    /// runs out is closed as soon as its open finishes.
    fn force_close(&self, settle: Duration) -> Result<bool, PinError>;
}

/// How long [`ExitRegistry::shutdown`] waits for each pin that is still opening.
pub const DEFAULT_OPEN_SETTLE: Duration = Duration::from_secs(5);

/// Process wide list of every pin handle handed out, drained once at
/// controlled termination.
///
/// Only weak references are held, so registering never keeps a handle alive.
/// Cloning gives another view of the same registry.
#[derive(Clone, Default)]
pub struct ExitRegistry {
    entries: Arc<Mutex<Vec<Weak<dyn ForceClose>>>>,
}

impl ExitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entry: Weak<dyn ForceClose>) {
        let mut entries = self.lock();
        entries.retain(|e| e.strong_count() > 0);
        entries.push(entry);
    }

    /// Number of registered handles that are currently open.
    pub fn open_count(&self) -> usize {
        self.lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|e| e.is_open())
            .count()
    }

    /// Closes every registered handle that is still open or opening.
    ///
    /// The registry is emptied, so a second call closes nothing.
    pub fn shutdown(&self) -> ShutdownReport {
        self.shutdown_within(DEFAULT_OPEN_SETTLE)
    }

    /// As [`ExitRegistry::shutdown`], waiting at most `settle` for each pin
    /// that is still opening.
    pub fn shutdown_within(&self, settle: Duration) -> ShutdownReport {
        let entries = std::mem::take(&mut *self.lock());
        let mut report = ShutdownReport::default();
        for entry in entries.iter().filter_map(Weak::upgrade) {
            if !entry.is_open() && !entry.is_opening() {
                continue;
            }
            debug!("Force closing pin {}", entry.pin());
            match entry.force_close(settle) {
                Ok(true) => report.closed.push(entry.pin()),
                Ok(false) => {}
                Err(err) => report.failed.push((entry.pin(), err)),
            }
        }
        info!(
            "Exit shutdown closed {} pin(s), {} failure(s)",
            report.closed.len(),
            report.failed.len()
        );
        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn ForceClose>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct ShutdownReport {
    closed: Vec<i64>,
    failed: Vec<(i64, PinError)>,
}

impl ShutdownReport {
    pub fn closed(&self) -> &[i64] {
        &self.closed
    }

    pub fn failed(&self) -> &[(i64, PinError)] {
        &self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    struct FakePin {
        open: AtomicBool,
        closes: AtomicUsize,
    }

    impl FakePin {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(FakePin {
                open: AtomicBool::new(open),
                closes: AtomicUsize::new(0),
            })
        }
    }

    impl ForceClose for FakePin {
        fn pin(&self) -> i64 {
            1
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn is_opening(&self) -> bool {
            false
        }

        fn force_close(&self, _settle: Duration) -> Result<bool, PinError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.open.store(false, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn weak(pin: &Arc<FakePin>) -> Weak<dyn ForceClose> {
        let pin: Arc<dyn ForceClose> = pin.clone();
        Arc::downgrade(&pin)
    }

    #[test]
    fn test_shutdown_closes_only_open_entries() {
        let registry = ExitRegistry::new();
        let open = FakePin::new(true);
        let closed = FakePin::new(false);
        registry.register(weak(&open));
        registry.register(weak(&closed));
        assert_eq!(registry.open_count(), 1);

        let report = registry.shutdown();
        assert_eq!(report.closed(), &[1]);
        assert!(report.is_clean());
        assert_eq!(open.closes.load(Ordering::SeqCst), 1);
        assert_eq!(closed.closes.load(Ordering::SeqCst), 0);

        let report = registry.shutdown();
        assert!(report.closed().is_empty(), "Registry should have been drained.");
        assert_eq!(open.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_entries_are_skipped() {
        let registry = ExitRegistry::new();
        {
            let gone = FakePin::new(true);
            registry.register(weak(&gone));
        }
        let kept = FakePin::new(true);
        registry.register(weak(&kept));
        assert_eq!(registry.lock().len(), 1, "Dead entries should be pruned on register.");
        assert_eq!(registry.shutdown().closed().len(), 1);
    }
}
