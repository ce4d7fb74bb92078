//! Модуль обработки ошибок библиотеки tts-markup
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе конвейера.
//! Нефатальные ситуации (зажатые значения, слишком длинный документ) ошибками не
//! являются и собираются как предупреждения, см. [`crate::warning`].

use std::time::Duration;
use thiserror::Error;
use crate::tts::engine::EngineError;

/// Ошибки библиотеки tts-markup
#[derive(Debug, Error)]
pub enum TtsMarkupError {
    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка движка синтеза для конкретного чанка
    #[error("Synthesis failed for chunk {chunk_index}: {source}")]
    Synthesis {
        chunk_index: usize,
        #[source]
        source: EngineError,
    },

    /// Движок не ответил за отведенное время
    #[error("Synthesis of chunk {chunk_index} timed out after {timeout:?}")]
    Timeout {
        chunk_index: usize,
        timeout: Duration,
    },

    /// Обработка отменена на границе батча
    #[error("Synthesis cancelled after {completed_batches} of {total_batches} batches")]
    Cancelled {
        completed_batches: usize,
        total_batches: usize,
    },

    /// Аудиофрагменты нельзя склеить в одну дорожку
    #[error("Audio format mismatch: {0}")]
    FormatMismatch(String),

    /// Неверный или неподдерживаемый формат аудио
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// Нечего склеивать
    #[error("No audio parts to merge")]
    NothingToMerge,

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for TtsMarkupError {
    fn from(s: &str) -> Self {
        TtsMarkupError::Other(s.to_string())
    }
}

impl From<String> for TtsMarkupError {
    fn from(s: String) -> Self {
        TtsMarkupError::Other(s)
    }
}

/// Тип Result для библиотеки tts-markup
pub type Result<T> = std::result::Result<T, TtsMarkupError>;
