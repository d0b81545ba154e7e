//! Progress side channel.
//!
//! Engines report row-granularity completion as a percentage (0–100). A run
//! opens with 0 from the calling thread; the rest come from worker threads,
//! which may deliver them out of order. Observers that need a monotonic value
//! keep the maximum seen. Observers must not block.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;

pub trait ProgressObserver: Sync {
    fn report(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Logs every report at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn report(&self, percent: u8) {
        info!("fitting: {percent}%");
    }
}

/// Counts finished rows and forwards the percentage.
pub(crate) struct RowCounter<'a> {
    done: AtomicUsize,
    total: usize,
    observer: &'a dyn ProgressObserver,
}

impl<'a> RowCounter<'a> {
    /// Reports 0 before returning.
    pub(crate) fn start(total: usize, observer: &'a dyn ProgressObserver) -> Self {
        observer.report(0);
        Self {
            done: AtomicUsize::new(0),
            total,
            observer,
        }
    }

    pub(crate) fn row_done(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        self.observer.report(percent(done, self.total));
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_observe_every_row() {
        let seen = Mutex::new(Vec::new());
        let observer = |p: u8| seen.lock().unwrap().push(p);
        let counter = RowCounter::start(4, &observer);
        for _ in 0..4 {
            counter.row_done();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn log_progress_is_an_observer() {
        let counter = RowCounter::start(2, &LogProgress);
        counter.row_done();
        counter.row_done();
        assert_eq!(counter.done.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 3), 100);
    }
}
