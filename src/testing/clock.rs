use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::engine::backend::Clock;
use crate::session::AbortHandle;

/// Virtual clock whose `sleep` advances time instantly.
///
/// A whole session replays in the time it takes to run the DSP, with every
/// timing window honoured exactly.
#[derive(Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    abort_trigger: Mutex<Option<(Duration, AbortHandle)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
        self.fire_trigger();
    }

    /// Request an abort once virtual time reaches `at`
    pub fn abort_at(&self, at: Duration, handle: AbortHandle) {
        *self
            .abort_trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((at, handle));
    }

    fn fire_trigger(&self) {
        let now = self.now();
        let mut trigger = self
            .abort_trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(&*trigger, Some((at, _)) if now >= *at) {
            if let Some((_, handle)) = trigger.take() {
                handle.abort();
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
