//! Debounced preview scheduling.
//!
//! Mutations to rules or source text arrive in bursts; the preview only needs
//! the final state of each burst. The scheduler is a single-slot pending-work
//! register: scheduling replaces any unfired pending run, firing clears the
//! slot, and a superseded timer wakes up to find its generation stale and
//! does nothing. The job itself is synchronous and never overlaps.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default debounce window between the last mutation and a preview run.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    armed: bool,
}

/// Debounced scheduler around a synchronous job.
pub struct PreviewScheduler {
    window: Duration,
    slot: Arc<Mutex<Slot>>,
    job: Arc<dyn Fn() + Send + Sync>,
}

impl PreviewScheduler {
    pub fn new(window: Duration, job: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            window,
            slot: Arc::new(Mutex::new(Slot::default())),
            job: Arc::new(job),
        }
    }

    /// Arm (or re-arm) the slot. The job fires once the window elapses with
    /// no further `schedule` calls.
    pub fn schedule(&self) {
        let generation = {
            let mut slot = self.slot.lock().expect("scheduler slot poisoned");
            slot.generation += 1;
            slot.armed = true;
            slot.generation
        };

        let slot = Arc::clone(&self.slot);
        let job = Arc::clone(&self.job);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let fire = {
                let mut slot = slot.lock().expect("scheduler slot poisoned");
                if slot.armed && slot.generation == generation {
                    slot.armed = false;
                    true
                } else {
                    false
                }
            };
            if fire {
                job();
            }
        });
    }

    /// Run the job now, cancelling any pending run.
    pub fn flush(&self) {
        {
            let mut slot = self.slot.lock().expect("scheduler slot poisoned");
            slot.generation += 1;
            slot.armed = false;
        }
        (self.job)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_scheduler(window_ms: u64) -> (PreviewScheduler, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let scheduler = PreviewScheduler::new(Duration::from_millis(window_ms), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (scheduler, fired)
    }

    #[tokio::test]
    async fn test_burst_coalesces_to_one_run() {
        let (scheduler, fired) = counting_scheduler(20);
        for _ in 0..5 {
            scheduler.schedule();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_separate_bursts_each_fire() {
        let (scheduler, fired) = counting_scheduler(10);
        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.schedule();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flush_cancels_pending() {
        let (scheduler, fired) = counting_scheduler(20);
        scheduler.schedule();
        scheduler.flush();
        tokio::time::sleep(Duration::from_millis(80)).await;
        // Only the flush ran; the armed timer found a stale generation.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
