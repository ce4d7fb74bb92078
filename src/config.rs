//! Модуль конфигурации библиотеки tts-markup
//!
//! Этот модуль содержит структуры и перечисления для настройки конвейера.
//! Все секции имеют значения по умолчанию, поэтому JSON-файл конфигурации
//! может содержать только нужные поля.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Result, TtsMarkupError};

/// Максимальная длина чанка в символах по умолчанию
pub const DEFAULT_MAX_CHARS: usize = 240;
/// Минимальная длина самостоятельного фрагмента
pub const DEFAULT_MIN_FRAGMENT_CHARS: usize = 10;
/// Предел количества фрагментов в кэше в памяти
pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 1024;
/// Голос по умолчанию
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";

/// Переменная окружения для бюджета символов на чанк
pub const ENV_MAX_CHARS: &str = "TTS_MARKUP_MAX_CHARS_PER_CHUNK";
/// Переменная окружения для голоса по умолчанию
pub const ENV_DEFAULT_VOICE: &str = "TTS_MARKUP_DEFAULT_VOICE";

/// Настройки сегментации текста
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Максимальная длина чанка в символах
    pub max_chars: usize,
    /// Фрагменты короче этого значения приклеиваются к соседу
    pub min_fragment_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            min_fragment_chars: DEFAULT_MIN_FRAGMENT_CHARS,
        }
    }
}

/// Настройки построения разметки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkupConfig {
    /// Голос для чанков без явного переопределения
    pub default_voice: String,
    /// Значение атрибута xml:lang корневого элемента
    pub language: String,
    /// Автоматические паузы по завершающей пунктуации
    pub auto_pauses: bool,
    /// Автоматическое выделение ключевых слов
    pub auto_emphasis: bool,
    /// Глобальная скорость речи, %
    pub global_rate: Option<f64>,
    /// Глобальная высота тона, %
    pub global_pitch: Option<f64>,
    /// Глобальная громкость, dB
    pub global_volume: Option<f64>,
    /// Длина документа, после которой выдается предупреждение
    pub max_document_chars: usize,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            default_voice: DEFAULT_VOICE.to_string(),
            language: "en-US".to_string(),
            auto_pauses: true,
            auto_emphasis: true,
            global_rate: None,
            global_pitch: None,
            global_volume: None,
            max_document_chars: 50_000,
        }
    }
}

/// Настройки группировки чанков в батчи
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    /// Максимальная суммарная длина батча в символах
    pub max_batch_chars: usize,
    /// Максимальное количество чанков в батче
    pub max_batch_chunks: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_chars: 2500,
            max_batch_chunks: 5,
        }
    }
}

/// Гранулярность запросов к движку
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestGranularity {
    /// Отдельный документ на каждый чанк
    #[default]
    PerChunk,
    /// Один документ на весь батч
    PerBatch,
}

/// Настройки отправки запросов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Гранулярность запросов
    pub granularity: RequestGranularity,
    /// Таймаут одного запроса к движку, в секундах
    pub request_timeout_secs: u64,
    /// Максимальное количество одновременно обрабатываемых батчей
    pub max_concurrent_batches: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            granularity: RequestGranularity::default(),
            request_timeout_secs: 600,
            max_concurrent_batches: 1,
        }
    }
}

impl DispatchConfig {
    /// Таймаут запроса как Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Настройки кэша синтеза
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Использовать кэширование
    pub enabled: bool,
    /// Директория для дискового кэша (без нее кэш только в памяти)
    pub cache_dir: Option<String>,
    /// Максимальный размер дискового кэша в байтах
    pub max_cache_size: Option<u64>,
    /// Максимальное количество фрагментов в памяти
    pub max_memory_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
            max_cache_size: Some(1024 * 1024 * 1024), // 1 GB
            max_memory_entries: Some(DEFAULT_MAX_MEMORY_ENTRIES),
        }
    }
}

/// Настройки склейки аудио
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MergeConfig {
    /// Тишина между частями PCM WAV, в миллисекундах
    pub silence_between_ms: u32,
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TtsMarkupConfig {
    pub chunking: ChunkingConfig,
    pub markup: MarkupConfig,
    pub batching: BatchConfig,
    pub dispatch: DispatchConfig,
    pub cache: CacheConfig,
    pub merge: MergeConfig,
}

impl TtsMarkupConfig {
    /// Загрузить конфигурацию из JSON-файла
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Применить переопределения из переменных окружения
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_MAX_CHARS) {
            self.chunking.max_chars = value.trim().parse().map_err(|_| {
                TtsMarkupError::Configuration(format!("{} must be a positive integer, got '{}'", ENV_MAX_CHARS, value))
            })?;
        }
        if let Ok(voice) = std::env::var(ENV_DEFAULT_VOICE) {
            if !voice.trim().is_empty() {
                self.markup.default_voice = voice.trim().to_string();
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Проверить согласованность настроек
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(TtsMarkupError::Configuration("chunking.max_chars must be greater than zero".to_string()));
        }
        if self.chunking.min_fragment_chars > self.chunking.max_chars {
            return Err(TtsMarkupError::Configuration(format!(
                "chunking.min_fragment_chars ({}) exceeds chunking.max_chars ({})",
                self.chunking.min_fragment_chars, self.chunking.max_chars
            )));
        }
        if self.markup.default_voice.trim().is_empty() {
            return Err(TtsMarkupError::Configuration("markup.default_voice is required".to_string()));
        }
        if self.batching.max_batch_chars == 0 || self.batching.max_batch_chunks == 0 {
            return Err(TtsMarkupError::Configuration("batching caps must be greater than zero".to_string()));
        }
        if self.dispatch.request_timeout_secs == 0 {
            return Err(TtsMarkupError::Configuration("dispatch.request_timeout_secs must be greater than zero".to_string()));
        }
        if self.cache.max_memory_entries == Some(0) {
            return Err(TtsMarkupError::Configuration("cache.max_memory_entries must be at least 1".to_string()));
        }
        if self.dispatch.max_concurrent_batches == 0 {
            return Err(TtsMarkupError::Configuration("dispatch.max_concurrent_batches must be at least 1".to_string()));
        }
        Ok(())
    }
}
