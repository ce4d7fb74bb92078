//! Модуль для отслеживания прогресса выполнения конвейера
//!
//! Реализация паттерна Observer: трекер знает текущий этап и его вес,
//! репортер рассылает обновления зарегистрированным наблюдателям.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Репортер по умолчанию: синхронная рассылка всем наблюдателям
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Этапы конвейера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Извлечение маркеров и разбиение текста на чанки
    Segmentation,
    /// Построение разметки
    MarkupBuilding,
    /// Группировка чанков в батчи
    Batching,
    /// Синтез речи
    Synthesis,
    /// Склейка аудио
    Merging,
}

impl ProcessStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Segmentation => "Сегментация текста",
            Self::MarkupBuilding => "Построение разметки",
            Self::Batching => "Группировка в батчи",
            Self::Synthesis => "Синтез речи",
            Self::Merging => "Склейка аудио",
        }
    }

    /// Вес этапа в процентах от всего процесса
    pub fn weight(&self) -> f32 {
        match self {
            Self::Segmentation => 5.0,
            Self::MarkupBuilding => 5.0,
            Self::Batching => 5.0,
            Self::Synthesis => 75.0,
            Self::Merging => 10.0,
        }
    }
}

struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    /// Веса этапов в сумме дают 100, поэтому общий прогресс не убывает при смене этапа
    fn recompute_total(&mut self) {
        let completed: f32 = self
            .completed_steps
            .iter()
            .filter(|(step, _)| **step != self.current_step)
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        let current = self.current_step.weight() * self.step_progress / 100.0;
        self.total_progress = (completed + current).clamp(0.0, 100.0);
    }

    fn snapshot(&self, details: Option<String>) -> ProgressInfo {
        ProgressInfo::new(self.current_step.as_str(), self.step_progress, self.total_progress, details)
    }
}

/// Трекер прогресса конвейера
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: Mutex::new(TrackerState {
                current_step: ProcessStep::Segmentation,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    /// Добавить наблюдателя (только если репортер установлен)
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    /// Перейти к этапу; предыдущий считается завершенным
    pub fn set_step(&self, step: ProcessStep) {
        let info = {
            let mut state = self.state.lock();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            state.recompute_total();
            state.snapshot(None)
        };
        self.report(info);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let info = {
            let mut state = self.state.lock();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recompute_total();
            state.snapshot(details)
        };
        self.report(info);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        let info = {
            let mut state = self.state.lock();
            let current = state.current_step;
            state.completed_steps.insert(current, 100.0);
            state.step_progress = 100.0;
            state.total_progress = 100.0;
            state.snapshot(Some("Процесс завершен".to_string()))
        };
        self.report(info);
    }

    /// Начать новый прогон с первого этапа
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.current_step = ProcessStep::Segmentation;
        state.step_progress = 0.0;
        state.total_progress = 0.0;
        state.completed_steps.clear();
    }

    /// Общий прогресс
    pub fn total_progress(&self) -> f32 {
        self.state.lock().total_progress
    }

    fn report(&self, info: ProgressInfo) {
        if let Some(reporter) = &self.reporter {
            reporter.notify_progress(info);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
