use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing-edge debounce: at most one delayed task is outstanding, and
/// scheduling a new one aborts the previous.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    pending: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any pending task.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Abort the pending task. Returns whether one was outstanding.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    /// Forget the pending task without aborting it. A fired task calls this
    /// on itself so later edits can't cancel work that is already running.
    pub fn detach(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_quiet_period() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        timer.schedule(Duration::from_secs(5), counter_task(&fired));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        for _ in 0..4 {
            timer.schedule(Duration::from_secs(5), counter_task(&fired));
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_drop_abort() {
        let fired = Arc::new(AtomicUsize::new(0));

        let mut timer = DebounceTimer::new();
        timer.schedule(Duration::from_secs(1), counter_task(&fired));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        {
            let mut dropped = DebounceTimer::new();
            dropped.schedule(Duration::from_secs(1), counter_task(&fired));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_task_still_runs() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        timer.schedule(Duration::from_secs(1), counter_task(&fired));
        timer.detach();
        assert!(!timer.is_pending());
        drop(timer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
