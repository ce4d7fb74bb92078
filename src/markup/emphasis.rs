//! Экранирование текста и автоматическое выделение ключевых слов

use std::collections::HashSet;
use lazy_static::lazy_static;
use regex::Regex;

/// Максимум выделяемых слов на чанк
pub const MAX_KEYWORDS: usize = 3;
/// Слова короче этого не выделяются
pub const MIN_KEYWORD_CHARS: usize = 5;

lazy_static! {
    static ref KEYWORD_RE: Regex = Regex::new(r"\b[\w']+\b").expect("valid keyword regex");
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "a", "an", "and", "or", "but", "if", "then", "else", "this", "that",
        "of", "for", "to", "in", "on", "with", "at", "by", "from",
    ]
    .into_iter()
    .collect();
}

/// Экранировать текст для XML-разметки
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Выбрать до `max_keywords` самых длинных слов, не являющихся стоп-словами.
///
/// При равной длине побеждает слово, встретившееся раньше.
pub fn find_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&str> = KEYWORD_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|w| !STOPWORDS.contains(w.to_lowercase().as_str()))
        .filter(|w| seen.insert(w.to_lowercase()))
        .collect();

    // sort_by стабильна, поэтому порядок появления сохраняется при равной длине
    candidates.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    candidates.into_iter().take(max_keywords).map(str::to_string).collect()
}

/// Обернуть первое вхождение каждого ключевого слова в `<emphasis>`.
///
/// Вхождения ищутся в уже экранированном тексте до любых вставок,
/// поэтому теги не могут попасть внутрь других тегов.
pub fn apply_emphasis(escaped: &str, keywords: &[String]) -> String {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for keyword in keywords {
        let Ok(pattern) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword))) else {
            continue;
        };
        if let Some(m) = pattern.find(escaped) {
            let overlaps = ranges.iter().any(|&(s, e)| m.start() < e && s < m.end());
            if !overlaps {
                ranges.push((m.start(), m.end()));
            }
        }
    }
    ranges.sort_unstable();

    let mut result = String::with_capacity(escaped.len() + ranges.len() * 40);
    let mut cursor = 0;
    for (start, end) in ranges {
        result.push_str(&escaped[cursor..start]);
        result.push_str("<emphasis level=\"moderate\">");
        result.push_str(&escaped[start..end]);
        result.push_str("</emphasis>");
        cursor = end;
    }
    result.push_str(&escaped[cursor..]);
    result
}
