//! Модуль построения разметки речи (SSML)
//!
//! Разрешает параметры чанков, экранирует текст, расставляет выделения и
//! паузы и собирает документ с корректно вложенными областями голоса.

pub mod prosody;
pub mod emphasis;
pub mod builder;

pub use builder::{MarkupBuilder, MarkupDocument};
pub use prosody::{Parameter, ResolvedChunk};

use crate::config::MarkupConfig;
use crate::text::Chunk;

/// Построить документ разметки для списка чанков
pub fn build_markup(chunks: &[Chunk], config: &MarkupConfig) -> MarkupDocument {
    MarkupBuilder::new(config).build(chunks)
}
