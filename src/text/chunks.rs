//! Сборка чанков: фрагменты + привязанные к ним маркеры

use serde::{Deserialize, Serialize};
use super::markers::{Marker, Overrides};
use super::segmenter::Fragment;

/// Атомарная единица синтеза: непустой текст и необязательные переопределения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub intensity: Option<i32>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default, alias = "rate")]
    pub speed: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Chunk {
    /// Создать чанк без переопределений
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            voice: None,
            emotion: None,
            intensity: None,
            pitch: None,
            speed: None,
            volume: None,
        }
    }

    /// Производная копия с наложенными переопределениями
    pub fn with_overrides(&self, overrides: &Overrides) -> Self {
        let mut merged = self.overrides();
        merged.merge_from(overrides);
        Self {
            content: self.content.clone(),
            voice: merged.voice,
            emotion: merged.emotion,
            intensity: merged.intensity,
            pitch: merged.pitch,
            speed: merged.speed,
            volume: merged.volume,
        }
    }

    /// Производная копия с другим текстом
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Переопределения чанка в виде разреженного набора
    pub fn overrides(&self) -> Overrides {
        Overrides {
            voice: self.voice.clone(),
            emotion: self.emotion.clone(),
            intensity: self.intensity,
            pitch: self.pitch,
            speed: self.speed,
            volume: self.volume,
        }
    }

    /// Длина текста в символах
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Распределить маркеры по фрагментам одним проходом.
///
/// Маркер со смещением `o` достается первому фрагменту, чей конец `>= o`;
/// маркеры после всего текста достаются последнему фрагменту.
pub fn apply_markers_to_chunks(fragments: &[Fragment], markers: &[Marker]) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(fragments.len());
    let mut pending = markers.iter().peekable();

    for fragment in fragments {
        let end = fragment.end();
        let mut overrides = Overrides::default();
        while let Some(marker) = pending.next_if(|m| m.offset <= end) {
            overrides.merge_from(&marker.overrides);
        }
        chunks.push(Chunk::new(fragment.text()).with_overrides(&overrides));
    }

    if let Some(last) = chunks.last_mut() {
        let mut trailing = Overrides::default();
        for marker in pending {
            trailing.merge_from(&marker.overrides);
        }
        if !trailing.is_empty() {
            *last = last.with_overrides(&trailing);
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::segmenter::split_fragments;

    fn marker(offset: usize, voice: &str) -> Marker {
        Marker {
            offset,
            overrides: Overrides {
                voice: Some(voice.to_string()),
                ..Overrides::default()
            },
        }
    }

    #[test]
    fn test_marker_attaches_by_end_offset() {
        let fragments = split_fragments("Hello world. This is great!");
        let chunks = apply_markers_to_chunks(
            &fragments,
            &[marker(0, "first"), marker(12, "still-first"), marker(13, "second")],
        );
        assert_eq!(chunks[0].voice.as_deref(), Some("still-first"));
        assert_eq!(chunks[1].voice.as_deref(), Some("second"));
    }

    #[test]
    fn test_trailing_marker_goes_to_last_chunk() {
        let fragments = split_fragments("One sentence. Two sentence.");
        let chunks = apply_markers_to_chunks(&fragments, &[marker(500, "tail")]);
        assert_eq!(chunks[0].voice, None);
        assert_eq!(chunks[1].voice.as_deref(), Some("tail"));
    }

    #[test]
    fn test_no_fragments_drops_markers() {
        assert!(apply_markers_to_chunks(&[], &[marker(0, "x")]).is_empty());
    }

    #[test]
    fn test_chunk_json_accepts_rate_alias() {
        let chunk: Chunk = serde_json::from_str(r#"{"content": "Hi there", "rate": 10}"#).unwrap();
        assert_eq!(chunk.speed, Some(10.0));
        assert_eq!(chunk.voice, None);
    }
}
