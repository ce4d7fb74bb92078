//! Извлечение встроенных маркеров вида `[[voice=...;emotion=...;intensity=2]]`
//!
//! Маркер удаляется из текста и запоминается вместе со смещением (в символах),
//! которое он занимал в очищенном тексте. Неизвестные ключи и некорректные
//! значения молча отбрасываются по одному, маркер целиком никогда не отвергается.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref MARKER_RE: Regex = Regex::new(r"\[\[(.*?)\]\]").expect("valid marker regex");
}

/// Разреженный набор переопределений голоса, эмоции и просодии
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub voice: Option<String>,
    pub emotion: Option<String>,
    pub intensity: Option<i32>,
    pub pitch: Option<f64>,
    pub speed: Option<f64>,
    pub volume: Option<f64>,
}

impl Overrides {
    /// Нет ни одного заданного поля
    pub fn is_empty(&self) -> bool {
        self.voice.is_none()
            && self.emotion.is_none()
            && self.intensity.is_none()
            && self.pitch.is_none()
            && self.speed.is_none()
            && self.volume.is_none()
    }

    /// Наложить другой набор поверх текущего: заданные поля `other` побеждают
    pub fn merge_from(&mut self, other: &Overrides) {
        if other.voice.is_some() {
            self.voice = other.voice.clone();
        }
        if other.emotion.is_some() {
            self.emotion = other.emotion.clone();
        }
        if other.intensity.is_some() {
            self.intensity = other.intensity;
        }
        if other.pitch.is_some() {
            self.pitch = other.pitch;
        }
        if other.speed.is_some() {
            self.speed = other.speed;
        }
        if other.volume.is_some() {
            self.volume = other.volume;
        }
    }
}

/// Маркер, привязанный к позиции в очищенном тексте
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Смещение в символах в очищенном тексте
    pub offset: usize,
    pub overrides: Overrides,
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Разобрать содержимое маркера (без скобок) в набор переопределений
pub fn parse_inline_marker(raw: &str) -> Overrides {
    let mut overrides = Overrides::default();

    for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "voice" => overrides.voice = Some(value.to_string()),
            "emotion" | "style" => overrides.emotion = Some(value.to_string()),
            "intensity" | "styledegree" => {
                if let Ok(intensity) = value.parse::<i32>() {
                    overrides.intensity = Some(intensity);
                }
            }
            "pitch" => {
                if let Some(pitch) = parse_number(value) {
                    overrides.pitch = Some(pitch);
                }
            }
            "speed" | "rate" => {
                if let Some(speed) = parse_number(value) {
                    overrides.speed = Some(speed);
                }
            }
            "volume" => {
                if let Some(volume) = parse_number(value) {
                    overrides.volume = Some(volume);
                }
            }
            other => log::debug!("Ignoring unknown marker key '{}'", other),
        }
    }

    overrides
}

/// Удалить маркеры из текста.
///
/// Возвращает очищенный текст и список маркеров в порядке появления.
pub fn extract_markers(text: &str) -> (String, Vec<Marker>) {
    let mut cleaned = String::with_capacity(text.len());
    let mut cleaned_chars = 0;
    let mut markers = Vec::new();
    let mut cursor = 0;

    for caps in MARKER_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let before = &text[cursor..whole.start()];
        cleaned.push_str(before);
        cleaned_chars += before.chars().count();

        let raw = caps.get(1).map_or("", |m| m.as_str());
        markers.push(Marker {
            offset: cleaned_chars,
            overrides: parse_inline_marker(raw),
        });
        cursor = whole.end();
    }
    cleaned.push_str(&text[cursor..]);

    (cleaned, markers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_keys_and_aliases() {
        let overrides = parse_inline_marker("voice=en-US-GuyNeural; style=sad ;styledegree=3;pitch=-5;rate=95;volume=2.5");
        assert_eq!(overrides.voice.as_deref(), Some("en-US-GuyNeural"));
        assert_eq!(overrides.emotion.as_deref(), Some("sad"));
        assert_eq!(overrides.intensity, Some(3));
        assert_eq!(overrides.pitch, Some(-5.0));
        assert_eq!(overrides.speed, Some(95.0));
        assert_eq!(overrides.volume, Some(2.5));
    }

    #[test]
    fn test_malformed_pairs_are_dropped_per_key() {
        let overrides = parse_inline_marker("emotion=cheerful;intensity=high;pitch;speed=;volume=loud;color=red;PITCH=7");
        assert_eq!(overrides.emotion.as_deref(), Some("cheerful"));
        assert_eq!(overrides.intensity, None);
        assert_eq!(overrides.speed, None);
        assert_eq!(overrides.volume, None);
        assert_eq!(overrides.pitch, Some(7.0));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let overrides = parse_inline_marker("pitch=NaN;volume=inf");
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_extract_records_offsets_in_cleaned_text() {
        let (cleaned, markers) = extract_markers("[[emotion=cheerful]]Héllo. [[voice=b]]Bye[[pitch=3]]");
        assert_eq!(cleaned, "Héllo. Bye");
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].offset, 0);
        assert_eq!(markers[1].offset, 7);
        assert_eq!(markers[2].offset, 10);
        assert_eq!(markers[1].overrides.voice.as_deref(), Some("b"));
    }

    #[test]
    fn test_merge_from_later_wins() {
        let mut base = parse_inline_marker("voice=a;pitch=1");
        base.merge_from(&parse_inline_marker("pitch=2;emotion=calm"));
        assert_eq!(base.voice.as_deref(), Some("a"));
        assert_eq!(base.pitch, Some(2.0));
        assert_eq!(base.emotion.as_deref(), Some("calm"));
    }
}
