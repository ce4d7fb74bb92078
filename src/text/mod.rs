//! Модуль подготовки текста
//!
//! Превращает сырой текст со встроенными маркерами в упорядоченный список
//! чанков: извлечение маркеров, разбиение по пунктуации, склейка коротких
//! фрагментов, деление длинных и привязка маркеров.

pub mod markers;
pub mod segmenter;
pub mod chunks;

pub use chunks::Chunk;
pub use markers::{Marker, Overrides};

use crate::config::ChunkingConfig;

/// Преобразовать текст (с необязательными маркерами) в список чанков.
///
/// Пустой текст дает пустой список, это не ошибка.
pub fn process_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let (cleaned, markers) = markers::extract_markers(text);
    let fragments = segmenter::split_fragments(&cleaned);
    let fragments = segmenter::merge_short_fragments(fragments, config.min_fragment_chars);
    let fragments = segmenter::split_long_fragments(fragments, config.max_chars, config.min_fragment_chars);
    let chunks = chunks::apply_markers_to_chunks(&fragments, &markers);

    log::debug!(
        "Segmented {} chars into {} chunks ({} markers)",
        cleaned.chars().count(),
        chunks.len(),
        markers.len()
    );
    chunks
}

/// Привести готовый список чанков к лимиту длины.
///
/// Пустые чанки отбрасываются, слишком длинные режутся заново; части
/// наследуют переопределения родителя, а маркеры внутри текста их перекрывают.
pub fn enforce_chunk_limits(chunks: &[Chunk], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut normalized = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let content = chunk.content.trim();
        if content.is_empty() {
            continue;
        }
        if content.chars().count() <= config.max_chars {
            normalized.push(chunk.with_content(content));
            continue;
        }

        for sub in process_text(content, config) {
            normalized.push(chunk.with_content(sub.content.clone()).with_overrides(&sub.overrides()));
        }
    }

    normalized
}
