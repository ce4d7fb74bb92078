//! Каталог голосов движка
//!
//! Загружается при первом обращении и живет до [`VoiceCatalog::invalidate`].
//! Используется, чтобы убрать из чанков стили, которые голос не поддерживает.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use crate::text::Chunk;
use crate::warning::PipelineWarning;
use super::engine::{EngineError, SynthesisEngine, VoiceInfo};

type VoiceMap = HashMap<String, VoiceInfo>;

#[derive(Default)]
pub struct VoiceCatalog {
    voices: Mutex<Option<Arc<VoiceMap>>>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить каталог, загрузив его при первом обращении.
    ///
    /// Загрузка ограничена `timeout`. Неудачная загрузка не запоминается.
    pub async fn voices(&self, engine: &dyn SynthesisEngine, timeout: Duration) -> Result<Arc<VoiceMap>, EngineError> {
        let mut guard = self.voices.lock().await;
        if let Some(voices) = guard.as_ref() {
            return Ok(voices.clone());
        }

        let list = tokio::time::timeout(timeout, engine.list_voices())
            .await
            .map_err(|_| EngineError::Unavailable(format!("voice list timed out after {:?}", timeout)))??;
        log::info!("Loaded {} voices from {}", list.len(), engine.capabilities().name);
        let voices: Arc<VoiceMap> = Arc::new(list.into_iter().map(|v| (v.name.to_lowercase(), v)).collect());
        *guard = Some(voices.clone());
        Ok(voices)
    }

    /// Сбросить каталог; следующее обращение загрузит его заново
    pub async fn invalidate(&self) {
        *self.voices.lock().await = None;
    }

    /// Убрать эмоции, которые голос чанка не поддерживает.
    ///
    /// Неизвестные каталогу голоса, голоса без списка стилей и недоступный
    /// каталог оставляют чанки без изменений.
    pub async fn sanitize_chunks(
        &self,
        engine: &dyn SynthesisEngine,
        chunks: &[Chunk],
        default_voice: &str,
        timeout: Duration,
    ) -> (Vec<Chunk>, Vec<PipelineWarning>) {
        let voices = match self.voices(engine, timeout).await {
            Ok(voices) => voices,
            Err(e) => {
                log::warn!("Voice catalog unavailable, styles are not checked: {}", e);
                return (chunks.to_vec(), Vec::new());
            }
        };

        let mut warnings = Vec::new();
        let sanitized = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                let Some(style) = chunk.emotion.as_deref() else {
                    return chunk.clone();
                };
                let voice = chunk.voice.as_deref().unwrap_or(default_voice);
                match voices.get(&voice.to_lowercase()) {
                    Some(info) if !info.styles.is_empty() && !info.supports_style(style) => {
                        log::warn!("chunk {}: emotion '{}' not supported by {}, removed", index, style, voice);
                        warnings.push(PipelineWarning::StyleRemoved {
                            chunk_index: index,
                            voice: voice.to_string(),
                            style: style.to_string(),
                        });
                        Chunk {
                            emotion: None,
                            ..chunk.clone()
                        }
                    }
                    _ => chunk.clone(),
                }
            })
            .collect();

        (sanitized, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use bytes::Bytes;
    use crate::tts::engine::EngineCapabilities;
    use crate::tts::request::SynthesisRequest;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct CatalogEngine {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl SynthesisEngine for CatalogEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities::full("catalog", "1")
        }

        async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Bytes, EngineError> {
            Err(EngineError::Failed("not used".to_string()))
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                VoiceInfo {
                    name: "en-US-JennyNeural".to_string(),
                    locale: Some("en-US".to_string()),
                    styles: vec!["Cheerful".to_string(), "sad".to_string()],
                },
                VoiceInfo {
                    name: "en-US-GuyNeural".to_string(),
                    locale: Some("en-US".to_string()),
                    styles: Vec::new(),
                },
            ])
        }
    }

    /// Движок, у которого список голосов не отвечает
    struct HangingCatalogEngine;

    #[async_trait]
    impl SynthesisEngine for HangingCatalogEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities::full("hanging", "1")
        }

        async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Bytes, EngineError> {
            Err(EngineError::Failed("not used".to_string()))
        }

        async fn list_voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn styled(content: &str, voice: Option<&str>, emotion: &str) -> Chunk {
        let mut chunk = Chunk::new(content);
        chunk.voice = voice.map(str::to_string);
        chunk.emotion = Some(emotion.to_string());
        chunk
    }

    #[tokio::test]
    async fn test_catalog_loads_once_until_invalidated() {
        let engine = CatalogEngine { loads: AtomicUsize::new(0) };
        let catalog = VoiceCatalog::new();

        catalog.voices(&engine, TIMEOUT).await.unwrap();
        catalog.voices(&engine, TIMEOUT).await.unwrap();
        assert_eq!(engine.loads.load(Ordering::SeqCst), 1);

        catalog.invalidate().await;
        catalog.voices(&engine, TIMEOUT).await.unwrap();
        assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsupported_style_is_removed() {
        let engine = CatalogEngine { loads: AtomicUsize::new(0) };
        let catalog = VoiceCatalog::new();
        let chunks = vec![
            styled("One", None, "cheerful"),
            styled("Two", None, "angry"),
            styled("Three", Some("unknown-voice"), "angry"),
            styled("Four", Some("en-US-GuyNeural"), "angry"),
        ];

        let (sanitized, warnings) = catalog.sanitize_chunks(&engine, &chunks, "en-US-JennyNeural", TIMEOUT).await;

        assert_eq!(sanitized[0].emotion.as_deref(), Some("cheerful"));
        assert_eq!(sanitized[1].emotion, None);
        assert_eq!(sanitized[2].emotion.as_deref(), Some("angry"));
        // Пустой список стилей означает, что стили голоса неизвестны
        assert_eq!(sanitized[3].emotion.as_deref(), Some("angry"));
        assert_eq!(
            warnings,
            vec![PipelineWarning::StyleRemoved {
                chunk_index: 1,
                voice: "en-US-JennyNeural".to_string(),
                style: "angry".to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_catalog_times_out_and_keeps_chunks() {
        let catalog = VoiceCatalog::new();
        let chunks = vec![styled("One", None, "angry")];

        let (sanitized, warnings) = catalog
            .sanitize_chunks(&HangingCatalogEngine, &chunks, "en-US-JennyNeural", Duration::from_secs(1))
            .await;

        assert_eq!(sanitized, chunks);
        assert!(warnings.is_empty());
        assert!(matches!(
            catalog.voices(&HangingCatalogEngine, Duration::from_secs(1)).await,
            Err(EngineError::Unavailable(_))
        ));
    }
}
