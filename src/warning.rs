//! Нефатальные предупреждения конвейера
//!
//! Предупреждения накапливаются на этапах разметки, батчинга и отправки
//! и возвращаются вызывающему вместе с итоговой дорожкой.

use std::fmt;
use serde::Serialize;
use crate::markup::Parameter;

/// Нефатальное предупреждение
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// Значение параметра вышло за допустимый диапазон и было зажато
    Clamped {
        chunk_index: usize,
        parameter: Parameter,
        original: f64,
        clamped: f64,
    },
    /// Документ разметки превысил рекомендуемую длину
    DocumentTooLong { length: usize, limit: usize },
    /// Чанк длиннее лимита батча и вынесен в отдельный батч
    OversizedChunk {
        chunk_index: usize,
        chars: usize,
        cap: usize,
    },
    /// Стиль не поддерживается голосом и удален
    StyleRemoved {
        chunk_index: usize,
        voice: String,
        style: String,
    },
    /// Движок отклонил параметр, запрос повторен без него
    ParameterDropped {
        chunk_index: usize,
        parameter: Parameter,
        reason: String,
    },
    /// Движок не умеет чего-то, что требовалось чанку
    CapabilityDowngrade {
        chunk_index: usize,
        engine: String,
        feature: String,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clamped { chunk_index, parameter, original, clamped } => {
                write!(f, "chunk {}: {} clamped {} -> {}", chunk_index, parameter, original, clamped)
            }
            Self::DocumentTooLong { length, limit } => write!(
                f,
                "SSML length {} exceeded {}; consider chunking input further",
                length, limit
            ),
            Self::OversizedChunk { chunk_index, chars, cap } => write!(
                f,
                "chunk {}: {} chars exceed batch cap {}, sent as its own batch",
                chunk_index, chars, cap
            ),
            Self::StyleRemoved { chunk_index, voice, style } => write!(
                f,
                "chunk {}: emotion '{}' not supported by {}, removed",
                chunk_index, style, voice
            ),
            Self::ParameterDropped { chunk_index, parameter, reason } => write!(
                f,
                "chunk {}: engine rejected {} ({}), retried without it",
                chunk_index, parameter, reason
            ),
            Self::CapabilityDowngrade { chunk_index, engine, feature } => write!(
                f,
                "chunk {}: engine {} does not support {}, dropped",
                chunk_index, engine, feature
            ),
        }
    }
}
