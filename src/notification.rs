//! Готовые наблюдатели прогресса

use std::sync::Arc;
use parking_lot::Mutex;
use crate::progress::{ProgressInfo, ProgressObserver};

/// Наблюдатель, пишущий прогресс в лог
pub struct LogProgressObserver {
    prefix: Option<String>,
}

impl LogProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl Default for LogProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        match progress.details.as_deref() {
            Some(details) if !details.is_empty() => log::info!(
                "{}{}: {:.1}% (total {:.1}%), {}",
                prefix, progress.step, progress.step_progress, progress.total_progress, details
            ),
            _ => log::info!(
                "{}{}: {:.1}% (total {:.1}%)",
                prefix, progress.step, progress.step_progress, progress.total_progress
            ),
        }
    }
}

/// Наблюдатель, сохраняющий историю обновлений в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history.lock().push(progress);
    }
}

/// Наблюдатель, вызывающий функцию при каждом обновлении
pub struct CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressObserver for CallbackProgressObserver<F>
where
    F: Fn(ProgressInfo) + Send + Sync + 'static,
{
    fn on_progress_update(&self, progress: ProgressInfo) {
        (self.callback)(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memory_observer_shares_history_between_clones() {
        let observer = MemoryProgressObserver::new();
        let handle = observer.clone();

        observer.on_progress_update(ProgressInfo::new("step", 10.0, 5.0, None));
        observer.on_progress_update(ProgressInfo::new("step", 150.0, 5.0, None));

        let history = handle.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].step_progress, 100.0);

        handle.clear_history();
        assert!(observer.history().is_empty());
    }

    #[test]
    fn test_callback_observer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let observer = CallbackProgressObserver::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        observer.on_progress_update(ProgressInfo::new("step", 1.0, 1.0, None));
        LogProgressObserver::with_prefix("[test] ").on_progress_update(ProgressInfo::new("step", 1.0, 1.0, Some("x".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
