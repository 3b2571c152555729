use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared bookkeeping for one aggregation run.
///
/// Buffers live in the channels; this only tracks the counters the
/// completion protocol is defined over.
#[derive(Debug, Default)]
pub struct Session {
    in_flight: AtomicUsize,
    started: AtomicBool,
    sort_completed: AtomicBool,
}

impl Session {
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_sort_completed(&self) -> bool {
        self.sort_completed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sort_completed(&self) {
        self.sort_completed.store(true, Ordering::Release);
    }

    /// Counts a newly submitted source. The returned guard settles it.
    pub(crate) fn begin(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            session: Arc::clone(self),
        }
    }
}

/// Decrements `in_flight` exactly once, when dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    session: Arc<Session>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.session.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
