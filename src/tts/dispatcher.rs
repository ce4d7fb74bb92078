//! Отправка батчей движку синтеза
//!
//! По умолчанию запросы идут строго последовательно: батч за батчем, чанк за
//! чанком. Отмена проверяется только между батчами, каждый вызов движка
//! ограничен таймаутом. Результаты возвращаются в исходном порядке чанков.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use crate::batch::Batch;
use crate::config::{DispatchConfig, MarkupConfig, RequestGranularity};
use crate::error::{Result, TtsMarkupError};
use crate::markup::{MarkupBuilder, Parameter, ResolvedChunk};
use crate::media::AudioArtifact;
use crate::progress::ProgressTracker;
use crate::text::Chunk;
use crate::warning::PipelineWarning;
use super::cache::SynthesisCache;
use super::engine::{EngineCapabilities, EngineError, SynthesisEngine};
use super::request::SynthesisRequest;

/// Результат отправки всех батчей
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Аудиофрагменты в порядке следования чанков
    pub artifacts: Vec<AudioArtifact>,
    pub resolved_chunks: Vec<ResolvedChunk>,
    pub warnings: Vec<PipelineWarning>,
}

impl DispatchOutcome {
    fn extend(&mut self, other: DispatchOutcome) {
        self.artifacts.extend(other.artifacts);
        self.resolved_chunks.extend(other.resolved_chunks);
        self.warnings.extend(other.warnings);
    }
}

/// Как будет построен один запрос
#[derive(Debug, Clone, Copy)]
enum RequestPlan<'b> {
    /// Документ разметки для одного или нескольких соседних чанков
    Markup { first_index: usize, chunks: &'b [Chunk] },
    /// Текст одного чанка и параметры отдельными полями
    Plain {
        index: usize,
        chunk: &'b Chunk,
        with_style: bool,
        with_prosody: bool,
    },
}

impl RequestPlan<'_> {
    fn first_index(&self) -> usize {
        match self {
            Self::Markup { first_index, .. } => *first_index,
            Self::Plain { index, .. } => *index,
        }
    }
}

struct BuiltRequest {
    request: SynthesisRequest,
    resolved: Vec<ResolvedChunk>,
    warnings: Vec<PipelineWarning>,
}

/// Диспетчер запросов к движку
pub struct SynthesisDispatcher<'a> {
    engine: &'a dyn SynthesisEngine,
    cache: &'a SynthesisCache,
    markup: &'a MarkupConfig,
    config: &'a DispatchConfig,
    progress: Option<&'a ProgressTracker>,
    cancel: Option<CancellationToken>,
}

impl<'a> SynthesisDispatcher<'a> {
    pub fn new(
        engine: &'a dyn SynthesisEngine,
        cache: &'a SynthesisCache,
        markup: &'a MarkupConfig,
        config: &'a DispatchConfig,
    ) -> Self {
        Self {
            engine,
            cache,
            markup,
            config,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, tracker: Option<&'a ProgressTracker>) -> Self {
        self.progress = tracker;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn report_batch_done(&self, done: usize, total: usize) {
        if let Some(tracker) = self.progress {
            tracker.update_step_progress(
                done as f32 / total as f32 * 100.0,
                Some(format!("Батч {}/{}", done, total)),
            );
        }
    }

    /// Отправить все батчи и собрать фрагменты в порядке чанков
    pub async fn dispatch(&self, batches: &[Batch]) -> Result<DispatchOutcome> {
        let capabilities = self.engine.capabilities();
        log::info!(
            "Dispatching {} batches to {} {} (markup: {}, native style: {})",
            batches.len(),
            capabilities.name,
            capabilities.version,
            capabilities.markup,
            capabilities.native_style
        );

        if self.config.max_concurrent_batches > 1 && batches.len() > 1 {
            return self.dispatch_concurrent(batches, &capabilities).await;
        }

        let total = batches.len();
        let mut outcome = DispatchOutcome::default();
        for (i, batch) in batches.iter().enumerate() {
            if self.is_cancelled() {
                log::warn!("Synthesis cancelled after {} of {} batches", i, total);
                return Err(TtsMarkupError::Cancelled {
                    completed_batches: i,
                    total_batches: total,
                });
            }
            outcome.extend(self.dispatch_batch(batch, &capabilities).await?);
            self.report_batch_done(i + 1, total);
        }
        Ok(outcome)
    }

    async fn dispatch_concurrent(
        &self,
        batches: &[Batch],
        capabilities: &EngineCapabilities,
    ) -> Result<DispatchOutcome> {
        let total = batches.len();
        let semaphore = Semaphore::new(self.config.max_concurrent_batches);
        let completed = AtomicUsize::new(0);

        let tasks = batches.iter().map(|batch| {
            let semaphore = &semaphore;
            let completed = &completed;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| TtsMarkupError::Other(format!("dispatch semaphore closed: {}", e)))?;
                if self.is_cancelled() {
                    return Err(TtsMarkupError::Cancelled {
                        completed_batches: completed.load(Ordering::SeqCst),
                        total_batches: total,
                    });
                }
                let outcome = self.dispatch_batch(batch, capabilities).await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.report_batch_done(done, total);
                Ok::<_, TtsMarkupError>(outcome)
            }
        });

        let mut outcome = DispatchOutcome::default();
        for result in join_all(tasks).await {
            outcome.extend(result?);
        }
        Ok(outcome)
    }

    fn has_prosody(&self, chunk: &Chunk) -> bool {
        chunk.speed.or(self.markup.global_rate).is_some()
            || chunk.pitch.or(self.markup.global_pitch).is_some()
            || chunk.volume.or(self.markup.global_volume).is_some()
    }

    fn plan_requests<'b>(
        &self,
        batch: &'b Batch,
        capabilities: &EngineCapabilities,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Vec<RequestPlan<'b>> {
        if !capabilities.markup {
            return batch
                .chunks
                .iter()
                .enumerate()
                .map(|(offset, chunk)| {
                    let index = batch.first_index + offset;
                    if chunk.emotion.is_some() && !capabilities.native_style {
                        warnings.push(self.downgrade(index, capabilities, "style"));
                    }
                    if self.has_prosody(chunk) && !capabilities.prosody_parameters {
                        warnings.push(self.downgrade(index, capabilities, "prosody"));
                    }
                    RequestPlan::Plain {
                        index,
                        chunk,
                        with_style: capabilities.native_style,
                        with_prosody: capabilities.prosody_parameters,
                    }
                })
                .collect();
        }

        if let [chunk] = batch.chunks.as_slice() {
            let prosody_ok = capabilities.prosody_parameters || !self.has_prosody(chunk);
            if chunk.emotion.is_some() && capabilities.native_style && prosody_ok {
                return vec![RequestPlan::Plain {
                    index: batch.first_index,
                    chunk,
                    with_style: true,
                    with_prosody: capabilities.prosody_parameters,
                }];
            }
        }

        match self.config.granularity {
            RequestGranularity::PerChunk => (0..batch.len())
                .map(|offset| RequestPlan::Markup {
                    first_index: batch.first_index + offset,
                    chunks: &batch.chunks[offset..offset + 1],
                })
                .collect(),
            RequestGranularity::PerBatch => vec![RequestPlan::Markup {
                first_index: batch.first_index,
                chunks: &batch.chunks,
            }],
        }
    }

    fn downgrade(&self, index: usize, capabilities: &EngineCapabilities, feature: &str) -> PipelineWarning {
        log::warn!("chunk {}: engine {} does not support {}, dropped", index, capabilities.name, feature);
        PipelineWarning::CapabilityDowngrade {
            chunk_index: index,
            engine: capabilities.name.clone(),
            feature: feature.to_string(),
        }
    }

    async fn dispatch_batch(&self, batch: &Batch, capabilities: &EngineCapabilities) -> Result<DispatchOutcome> {
        log::debug!(
            "Batch starting at chunk {}: {} chunks, {} chars",
            batch.first_index,
            batch.len(),
            batch.char_len()
        );

        let mut outcome = DispatchOutcome::default();
        let plans = self.plan_requests(batch, capabilities, &mut outcome.warnings);
        for plan in &plans {
            let (artifact, resolved, warnings) = self.execute(plan).await?;
            outcome.artifacts.push(artifact);
            outcome.resolved_chunks.extend(resolved);
            outcome.warnings.extend(warnings);
        }
        Ok(outcome)
    }

    fn build_request(&self, plan: &RequestPlan<'_>, suppressed: &BTreeSet<Parameter>) -> BuiltRequest {
        let builder = MarkupBuilder::new(self.markup).with_suppressed(suppressed);
        match *plan {
            RequestPlan::Markup { first_index, chunks } => {
                let document = builder.build_from(first_index, chunks);
                let voice = document
                    .resolved_chunks
                    .first()
                    .map_or_else(|| self.markup.default_voice.clone(), |c| c.voice.clone());
                BuiltRequest {
                    request: SynthesisRequest::markup(document.document, voice),
                    resolved: document.resolved_chunks,
                    warnings: document.warnings,
                }
            }
            RequestPlan::Plain { index, chunk, with_style, with_prosody } => {
                let mut warnings = Vec::new();
                let resolved = builder.resolve(index, chunk, &mut warnings);
                BuiltRequest {
                    request: SynthesisRequest::plain(&resolved, with_style, with_prosody, suppressed),
                    resolved: vec![resolved],
                    warnings,
                }
            }
        }
    }

    /// Выполнить запрос; при отказе из-за параметра повторить ровно один раз без него
    async fn execute(
        &self,
        plan: &RequestPlan<'_>,
    ) -> Result<(AudioArtifact, Vec<ResolvedChunk>, Vec<PipelineWarning>)> {
        let index = plan.first_index();
        let mut suppressed = BTreeSet::new();
        let BuiltRequest { request, resolved, mut warnings } = self.build_request(plan, &suppressed);

        let artifact = match self.synthesize(index, &request).await {
            Ok(artifact) => artifact,
            Err(TtsMarkupError::Synthesis {
                chunk_index,
                source: EngineError::UnsupportedParameter { parameter, reason },
            }) => {
                log::warn!(
                    "chunk {}: engine rejected {} ({}), retrying without it",
                    chunk_index, parameter, reason
                );
                warnings.push(PipelineWarning::ParameterDropped {
                    chunk_index,
                    parameter,
                    reason,
                });
                suppressed.insert(parameter);
                // styledegree без style не передается
                if parameter == Parameter::Style {
                    suppressed.insert(Parameter::StyleDegree);
                }
                let retry = self.build_request(plan, &suppressed);
                self.synthesize(index, &retry.request).await?
            }
            Err(e) => return Err(e),
        };

        Ok((artifact, resolved, warnings))
    }

    /// Один вызов движка через кэш и с таймаутом
    async fn synthesize(&self, index: usize, request: &SynthesisRequest) -> Result<AudioArtifact> {
        let timeout = self.config.request_timeout();
        self.cache
            .get_or_synthesize(&request.cache_key, || async move {
                log::debug!(
                    "Synthesizing chunk {} ({} chars, markup: {}, voice: {})",
                    index,
                    request.payload.chars().count(),
                    request.is_markup,
                    request.voice
                );
                let bytes = tokio::time::timeout(timeout, self.engine.synthesize(request))
                    .await
                    .map_err(|_| TtsMarkupError::Timeout { chunk_index: index, timeout })?
                    .map_err(|source| TtsMarkupError::Synthesis { chunk_index: index, source })?;

                if bytes.is_empty() {
                    return Err(TtsMarkupError::Synthesis {
                        chunk_index: index,
                        source: EngineError::Failed("engine returned no audio".to_string()),
                    });
                }
                Ok(AudioArtifact::from_bytes(bytes))
            })
            .await
    }
}
