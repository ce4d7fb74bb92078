//! Пример использования конвейера разметки
//!
//! Показывает предварительный просмотр разметки и синтез с локальным движком,
//! который возвращает тишину в формате WAV, с выводом прогресса в консоль.

use std::io::Cursor;
use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use tts_markup::notification::CallbackProgressObserver;
use tts_markup::tts::{EngineCapabilities, EngineError, SynthesisEngine, SynthesisRequest};
use tts_markup::{TtsMarkup, TtsMarkupConfig};

/// Движок, возвращающий 100 мс тишины на каждый запрос
struct SilenceEngine;

#[async_trait]
impl SynthesisEngine for SilenceEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::full("silence", "1.0")
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes, EngineError> {
        println!("  -> {} ({} chars, markup: {})", request.voice, request.payload.len(), request.is_markup);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| EngineError::Failed(e.to_string()))?;
        for _ in 0..1600 {
            writer.write_sample(0i16).map_err(|e| EngineError::Failed(e.to_string()))?;
        }
        writer.finalize().map_err(|e| EngineError::Failed(e.to_string()))?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tts_markup::utils::logger::init_logger();

    let text = "Welcome to the show. [[voice=en-US-GuyNeural;emotion=cheerful;intensity=3]]\
                Today we have great news for everyone! [[speed=-20;volume=3]]Please listen carefully, \
                because this part matters…";

    let mut pipeline = TtsMarkup::new(TtsMarkupConfig::default(), Arc::new(SilenceEngine))?;

    println!("Пример 1: предварительный просмотр");
    let preview = pipeline.preview(text);
    println!("{}", serde_json::to_string_pretty(&preview)?);

    println!("Пример 2: синтез с отслеживанием прогресса");
    pipeline.add_observer(Box::new(CallbackProgressObserver::new(|info| {
        println!("[{:>5.1}%] {} {}", info.total_progress, info.step, info.details.unwrap_or_default());
    })));

    let output = pipeline.synthesize_text(text, None).await?;
    println!(
        "Готово: {} байт, {} чанков, {} предупреждений",
        output.track.len(),
        output.resolved_chunks.len(),
        output.warnings.len()
    );
    for warning in &output.warnings {
        println!("  ! {}", warning);
    }

    pipeline.shutdown().await;
    Ok(())
}
