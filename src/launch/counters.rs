use std::sync::atomic::{AtomicU64, Ordering};

/// Caller-owned launch statistics, shared with a [`Launcher`](super::Launcher).
#[derive(Debug, Default)]
pub struct LaunchCounters {
    submitted: AtomicU64,
    empty: AtomicU64,
    rejected: AtomicU64,
    faulted: AtomicU64,
    coords: AtomicU64,
}

/// A point-in-time copy of [`LaunchCounters`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterSnapshot {
    pub submitted: u64,
    pub empty: u64,
    pub rejected: u64,
    pub faulted: u64,
    /// Coordinates of all submitted launches.
    pub coords: u64,
}

impl LaunchCounters {
    pub(crate) fn submitted(&self, coords: usize) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.coords.fetch_add(coords as u64, Ordering::Relaxed);
    }

    pub(crate) fn empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn faulted(&self) {
        self.faulted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            coords: self.coords.load(Ordering::Relaxed),
        }
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        for counter in [
            &self.submitted,
            &self.empty,
            &self.rejected,
            &self.faulted,
            &self.coords,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
