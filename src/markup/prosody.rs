//! Разрешение и ограничение параметров просодии и стиля

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::config::MarkupConfig;
use crate::text::Chunk;
use crate::warning::PipelineWarning;

/// Допустимый диапазон скорости речи, %
pub const RATE_RANGE: (f64, f64) = (-50.0, 50.0);
/// Допустимый диапазон высоты тона, %
pub const PITCH_RANGE: (f64, f64) = (-50.0, 50.0);
/// Допустимый диапазон громкости, dB
pub const VOLUME_RANGE_DB: (f64, f64) = (-10.0, 10.0);

/// Интенсивность 1..3 -> styledegree
pub const STYLEDEGREE_MAP: [(i32, f64); 3] = [(1, 0.7), (2, 1.0), (3, 1.3)];
/// styledegree для отсутствующей или неизвестной интенсивности
pub const DEFAULT_STYLEDEGREE: f64 = 1.0;

/// Параметр запроса, который движок может не поддерживать
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Style,
    StyleDegree,
    Rate,
    Pitch,
    Volume,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::StyleDegree => "style_degree",
            Self::Rate => "rate",
            Self::Pitch => "pitch",
            Self::Volume => "volume",
        }
    }

    /// Разобрать имя параметра, как его называет движок
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "style" | "emotion" => Some(Self::Style),
            "style_degree" | "styledegree" => Some(Self::StyleDegree),
            "rate" | "speed" => Some(Self::Rate),
            "pitch" => Some(Self::Pitch),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Чанк с полностью разрешенными и ограниченными значениями
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChunk {
    pub content: String,
    pub voice: String,
    pub emotion: Option<String>,
    pub intensity: Option<i32>,
    pub styledegree: f64,
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
}

/// Ограничить значение диапазоном `[low, high]`.
///
/// Второй элемент равен `true`, если значение пришлось изменить.
/// NaN заменяется на 0, ограниченный тем же диапазоном.
pub fn clamp(value: f64, low: f64, high: f64) -> (f64, bool) {
    if value.is_nan() {
        (0.0_f64.max(low).min(high), true)
    } else if value < low {
        (low, true)
    } else if value > high {
        (high, true)
    } else {
        (value, false)
    }
}

/// styledegree по интенсивности
pub fn styledegree(intensity: Option<i32>) -> f64 {
    intensity
        .and_then(|i| STYLEDEGREE_MAP.iter().find(|(level, _)| *level == i))
        .map_or(DEFAULT_STYLEDEGREE, |(_, degree)| *degree)
}

/// Формат процентов для атрибутов rate/pitch: `+10%`
pub fn format_percent(value: f64) -> String {
    format!("{:+.0}%", value)
}

/// Формат громкости: `-2.5dB`
pub fn format_volume_db(value: f64) -> String {
    format!("{:+.1}dB", value)
}

fn resolve_value(
    index: usize,
    parameter: Parameter,
    chunk_value: Option<f64>,
    global: Option<f64>,
    range: (f64, f64),
    warnings: &mut Vec<PipelineWarning>,
) -> f64 {
    let original = chunk_value.or(global).unwrap_or(0.0);
    let (value, changed) = clamp(original, range.0, range.1);
    if changed {
        log::warn!("chunk {}: {} clamped {} -> {}", index, parameter, original, value);
        warnings.push(PipelineWarning::Clamped {
            chunk_index: index,
            parameter,
            original,
            clamped: value,
        });
    }
    value
}

/// Разрешить чанк: переопределение чанка -> глобальное значение -> 0, затем ограничение
pub fn resolve_chunk(
    index: usize,
    chunk: &Chunk,
    config: &MarkupConfig,
    warnings: &mut Vec<PipelineWarning>,
) -> ResolvedChunk {
    let voice = chunk
        .voice
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(&config.default_voice)
        .to_string();

    ResolvedChunk {
        content: chunk.content.trim().to_string(),
        voice,
        emotion: chunk.emotion.clone().filter(|e| !e.trim().is_empty()),
        intensity: chunk.intensity,
        styledegree: styledegree(chunk.intensity),
        rate: resolve_value(index, Parameter::Rate, chunk.speed, config.global_rate, RATE_RANGE, warnings),
        pitch: resolve_value(index, Parameter::Pitch, chunk.pitch, config.global_pitch, PITCH_RANGE, warnings),
        volume: resolve_value(index, Parameter::Volume, chunk.volume, config.global_volume, VOLUME_RANGE_DB, warnings),
    }
}
