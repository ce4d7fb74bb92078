//! Контракт внешнего движка синтеза речи

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::markup::Parameter;
use super::request::SynthesisRequest;

/// Статическое описание возможностей движка
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    pub name: String,
    pub version: String,
    /// Принимает документы разметки
    pub markup: bool,
    /// Умеет применять стиль, переданный отдельным полем запроса
    pub native_style: bool,
    /// Принимает rate/pitch/volume отдельными полями
    pub prosody_parameters: bool,
}

impl EngineCapabilities {
    /// Движок, поддерживающий все возможности
    pub fn full(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            markup: true,
            native_style: true,
            prosody_parameters: true,
        }
    }
}

/// Ошибки движка синтеза
#[derive(Debug, Error)]
pub enum EngineError {
    /// Движок отклонил конкретный параметр запроса
    #[error("Unsupported parameter '{parameter}': {reason}")]
    UnsupportedParameter { parameter: Parameter, reason: String },

    /// Движок недоступен
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Любая другая ошибка синтеза
    #[error("Synthesis failed: {0}")]
    Failed(String),

    /// Ошибка HTTP-транспорта
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Голос и поддерживаемые им стили
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub styles: Vec<String>,
}

impl VoiceInfo {
    pub fn supports_style(&self, style: &str) -> bool {
        self.styles.iter().any(|s| s.eq_ignore_ascii_case(style))
    }
}

/// Внешний движок синтеза: запрос -> байты аудио или типизированная ошибка
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Возможности движка
    fn capabilities(&self) -> EngineCapabilities;

    /// Синтезировать один запрос
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes, EngineError>;

    /// Список голосов; движок без каталога возвращает пустой список
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
        Ok(Vec::new())
    }
}
