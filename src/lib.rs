//! Основной файл библиотеки tts-markup
//!
//! Конвейер превращает текст со встроенными маркерами `[[voice=...;emotion=...]]`
//! в запросы к внешнему движку синтеза, группирует их в батчи, отправляет
//! и склеивает полученные фрагменты в одну дорожку, сообщая о прогрессе.

pub mod progress;
pub mod notification;
pub mod config;
pub mod error;
pub mod warning;
pub mod text;
pub mod markup;
pub mod batch;
pub mod tts;
pub mod media;
pub mod utils;

use std::sync::Arc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use crate::batch::{plan_batches, Batch};
use crate::error::Result;
use crate::markup::{build_markup, ResolvedChunk};
use crate::media::{merge_artifacts, MergedTrack};
use crate::progress::{DefaultProgressReporter, ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::text::Chunk;
use crate::tts::{SynthesisCache, SynthesisDispatcher, SynthesisEngine, VoiceCatalog};
use crate::warning::PipelineWarning;

pub use crate::config::TtsMarkupConfig;
pub use crate::error::TtsMarkupError;

/// Разметка и план батчей без обращения к движку
#[derive(Debug, Clone, Serialize)]
pub struct MarkupPreview {
    pub chunks: Vec<Chunk>,
    pub document: String,
    pub resolved_chunks: Vec<ResolvedChunk>,
    pub batches: Vec<Batch>,
    pub warnings: Vec<PipelineWarning>,
}

/// Результат синтеза
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutput {
    pub track: MergedTrack,
    pub warnings: Vec<PipelineWarning>,
    pub resolved_chunks: Vec<ResolvedChunk>,
}

/// Основная структура для работы с библиотекой
pub struct TtsMarkup {
    /// Конфигурация библиотеки
    config: TtsMarkupConfig,
    engine: Arc<dyn SynthesisEngine>,
    cache: SynthesisCache,
    voices: VoiceCatalog,
    /// Трекер прогресса
    progress_tracker: Option<ProgressTracker>,
}

impl TtsMarkup {
    /// Создать конвейер с указанной конфигурацией и движком
    pub fn new(config: TtsMarkupConfig, engine: Arc<dyn SynthesisEngine>) -> Result<Self> {
        config.validate()?;
        let cache = SynthesisCache::new(&config.cache)?;
        Ok(Self {
            config,
            engine,
            cache,
            voices: VoiceCatalog::new(),
            progress_tracker: None,
        })
    }

    /// Создать конвейер с репортером прогресса
    pub fn with_progress_reporter(
        config: TtsMarkupConfig,
        engine: Arc<dyn SynthesisEngine>,
        reporter: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        let mut pipeline = Self::new(config, engine)?;
        pipeline.set_progress_reporter(reporter);
        Ok(pipeline)
    }

    /// Установить репортер прогресса
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        match &mut self.progress_tracker {
            Some(tracker) => tracker.set_reporter(reporter),
            None => self.progress_tracker = Some(ProgressTracker::with_reporter(reporter)),
        }
    }

    /// Добавить наблюдателя прогресса; без трекера создается репортер по умолчанию
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        let tracker = self.progress_tracker.get_or_insert_with(|| {
            ProgressTracker::with_reporter(Box::new(DefaultProgressReporter::new()))
        });
        tracker.add_observer(observer)
    }

    pub fn config(&self) -> &TtsMarkupConfig {
        &self.config
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    /// Разметить текст и спланировать батчи, ничего не синтезируя
    pub fn preview(&self, text: &str) -> MarkupPreview {
        let chunks = text::process_text(text, &self.config.chunking);
        let document = build_markup(&chunks, &self.config.markup);
        let (batches, batch_warnings) = plan_batches(&chunks, &self.config.batching);

        let mut warnings = document.warnings;
        warnings.extend(batch_warnings);

        MarkupPreview {
            chunks,
            document: document.document,
            resolved_chunks: document.resolved_chunks,
            batches,
            warnings,
        }
    }

    /// Синтезировать текст со встроенными маркерами
    pub async fn synthesize_text(&self, text: &str, cancel: Option<CancellationToken>) -> Result<SynthesisOutput> {
        log::info!("Starting synthesis of {} chars", text.chars().count());
        self.start_run();
        let chunks = text::process_text(text, &self.config.chunking);
        self.run(chunks, cancel).await
    }

    /// Синтезировать заранее подготовленные чанки.
    ///
    /// Пустые чанки отбрасываются, слишком длинные делятся заново.
    pub async fn synthesize_chunks(&self, chunks: &[Chunk], cancel: Option<CancellationToken>) -> Result<SynthesisOutput> {
        log::info!("Starting synthesis of {} prepared chunks", chunks.len());
        self.start_run();
        let chunks = text::enforce_chunk_limits(chunks, &self.config.chunking);
        self.run(chunks, cancel).await
    }

    /// Сбросить состояние процесса: кэш в памяти и каталог голосов
    pub async fn shutdown(&self) {
        self.cache.clear_memory();
        self.voices.invalidate().await;
        log::info!("Pipeline state released");
    }

    fn start_run(&self) {
        if let Some(t) = &self.progress_tracker {
            t.reset();
            t.update_step_progress(0.0, Some("Разбиение текста на чанки".to_string()));
        }
    }

    fn step(&self, step: ProcessStep, details: &str) {
        if let Some(t) = &self.progress_tracker {
            t.set_step(step);
            t.update_step_progress(0.0, Some(details.to_string()));
        }
    }

    async fn run(&self, chunks: Vec<Chunk>, cancel: Option<CancellationToken>) -> Result<SynthesisOutput> {
        let tracker = self.progress_tracker.as_ref();

        if chunks.is_empty() {
            log::info!("Nothing to synthesize, returning an empty track");
            if let Some(t) = tracker {
                t.complete();
            }
            return Ok(SynthesisOutput {
                track: MergedTrack::empty(),
                warnings: Vec::new(),
                resolved_chunks: Vec::new(),
            });
        }

        // 1. Проверка стилей по каталогу голосов
        self.step(ProcessStep::MarkupBuilding, "Проверка стилей голосов");
        let (chunks, mut warnings) = if chunks.iter().any(|c| c.emotion.is_some()) {
            self.voices
                .sanitize_chunks(
                    self.engine.as_ref(),
                    &chunks,
                    &self.config.markup.default_voice,
                    self.config.dispatch.request_timeout(),
                )
                .await
        } else {
            (chunks, Vec::new())
        };

        // 2. Батчи
        self.step(ProcessStep::Batching, "Группировка чанков");
        let (batches, batch_warnings) = plan_batches(&chunks, &self.config.batching);
        warnings.extend(batch_warnings);
        log::info!("Planned {} batches for {} chunks", batches.len(), chunks.len());

        // 3. Синтез
        self.step(ProcessStep::Synthesis, "Отправка батчей движку");
        let mut dispatcher = SynthesisDispatcher::new(
            self.engine.as_ref(),
            &self.cache,
            &self.config.markup,
            &self.config.dispatch,
        )
        .with_progress(tracker);
        if let Some(token) = cancel {
            dispatcher = dispatcher.with_cancellation(token);
        }
        let outcome = dispatcher.dispatch(&batches).await.map_err(|e| {
            log::error!("Synthesis failed: {}", e);
            e
        })?;
        warnings.extend(outcome.warnings);

        // 4. Склейка
        self.step(ProcessStep::Merging, "Склейка фрагментов");
        let track = merge_artifacts(&outcome.artifacts, &self.config.merge)?;

        if let Some(t) = tracker {
            t.complete();
        }
        log::info!(
            "Synthesis completed: {} bytes of {:?}, {} warnings",
            track.len(),
            track.format.container,
            warnings.len()
        );

        Ok(SynthesisOutput {
            track,
            warnings,
            resolved_chunks: outcome.resolved_chunks,
        })
    }
}

/// Публичный API для удобного использования
pub async fn synthesize_text(
    text: &str,
    config: TtsMarkupConfig,
    engine: Arc<dyn SynthesisEngine>,
) -> Result<SynthesisOutput> {
    let pipeline = TtsMarkup::new(config, engine)?;
    let output = pipeline.synthesize_text(text, None).await;
    pipeline.shutdown().await;
    output
}
