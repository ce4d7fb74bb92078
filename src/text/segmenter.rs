//! Разбиение очищенного текста на произносимые фрагменты
//!
//! Три последовательных шага:
//! 1. [`split_fragments`] режет по сильной пунктуации, оставляя ее при фрагменте;
//! 2. [`merge_short_fragments`] приклеивает слишком короткие фрагменты к соседу;
//! 3. [`split_long_fragments`] делит слишком длинные фрагменты по пробелам.
//!
//! Каждое слово помнит свой диапазон в очищенном тексте, чтобы маркеры
//! можно было привязать к фрагментам по точным смещениям.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Серия разделителей вместе с закрывающими кавычками и скобками
    static ref DELIMITER_RE: Regex =
        Regex::new(r#"[.!?,;:…—]+["'”’»)\]]*"#).expect("valid delimiter regex");
    static ref WORD_RE: Regex = Regex::new(r"\S+").expect("valid word regex");
}

/// Слово с диапазоном символов `[start, end)` в очищенном тексте
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Word {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Фрагмент текста: последовательность слов, соединяемых одним пробелом
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub words: Vec<Word>,
}

impl Fragment {
    /// Текст фрагмента с нормализованными пробелами
    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ")
    }

    /// Длина текста фрагмента в символах
    pub fn char_len(&self) -> usize {
        let words: usize = self.words.iter().map(Word::char_len).sum();
        words + self.words.len().saturating_sub(1)
    }

    /// Смещение конца фрагмента в очищенном тексте
    pub fn end(&self) -> usize {
        self.words.last().map_or(0, |w| w.end)
    }

    fn absorb(&mut self, other: Fragment) {
        self.words.extend(other.words);
    }
}

/// Перевод байтовых позиций в символьные
struct CharIndex {
    starts: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(b, _)| b).collect(),
        }
    }

    fn char_at(&self, byte: usize) -> usize {
        self.starts.partition_point(|&b| b < byte)
    }
}

fn push_fragment(fragments: &mut Vec<Fragment>, text: &str, base: usize, index: &CharIndex) {
    let words: Vec<Word> = WORD_RE
        .find_iter(&text[base..])
        .map(|m| Word {
            text: m.as_str().to_string(),
            start: index.char_at(base + m.start()),
            end: index.char_at(base + m.end()),
        })
        .collect();

    if !words.is_empty() {
        fragments.push(Fragment { words });
    }
}

/// Разрезать текст по сильной пунктуации
pub fn split_fragments(text: &str) -> Vec<Fragment> {
    let index = CharIndex::new(text);
    let mut fragments = Vec::new();
    let mut last = 0;

    for m in DELIMITER_RE.find_iter(text) {
        push_fragment(&mut fragments, &text[..m.end()], last, &index);
        last = m.end();
    }
    push_fragment(&mut fragments, text, last, &index);

    fragments
}

/// Приклеить фрагменты короче `min_len` к предыдущему.
///
/// Короткий первый фрагмент поглощает следующий, так что одиночный короткий
/// фрагмент остается только если он единственный.
pub fn merge_short_fragments(fragments: Vec<Fragment>, min_len: usize) -> Vec<Fragment> {
    let mut merged: Vec<Fragment> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        match merged.last_mut() {
            Some(last) if fragment.char_len() < min_len => last.absorb(fragment),
            _ => merged.push(fragment),
        }
    }

    if merged.len() > 1 && merged[0].char_len() < min_len {
        let second = merged.remove(1);
        merged[0].absorb(second);
    }

    merged
}

/// Слово длиннее бюджета режется по символам: это единственный случай разрыва слова
fn split_oversized_word(word: Word, max_len: usize) -> Vec<Word> {
    let chars: Vec<char> = word.text.chars().collect();
    chars
        .chunks(max_len)
        .enumerate()
        .map(|(i, piece)| {
            let start = word.start + i * max_len;
            Word {
                text: piece.iter().collect(),
                start,
                end: (start + piece.len()).min(word.end),
            }
        })
        .collect()
}

/// Перенести слова с конца предыдущего куска, если последний получился коротким
fn rebalance_tail(pieces: &mut [Fragment], min_len: usize, max_len: usize) {
    let n = pieces.len();
    if n < 2 {
        return;
    }
    let (head, tail) = pieces.split_at_mut(n - 1);
    let prev = &mut head[n - 2];
    let last = &mut tail[0];

    while last.char_len() < min_len && prev.words.len() > 1 {
        let Some(word) = prev.words.last() else { break };
        if last.char_len() + 1 + word.char_len() > max_len {
            break;
        }
        if let Some(word) = prev.words.pop() {
            last.words.insert(0, word);
        }
    }
}

/// Разделить фрагменты длиннее `max_len` по пробелам, не разрывая слова
pub fn split_long_fragments(fragments: Vec<Fragment>, max_len: usize, min_len: usize) -> Vec<Fragment> {
    let mut result = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        if fragment.char_len() <= max_len {
            result.push(fragment);
            continue;
        }

        let words = fragment.words.into_iter().flat_map(|w| {
            if w.char_len() > max_len {
                split_oversized_word(w, max_len)
            } else {
                vec![w]
            }
        });

        let mut pieces: Vec<Fragment> = Vec::new();
        let mut buf = Fragment::default();
        for word in words {
            if !buf.words.is_empty() && buf.char_len() + 1 + word.char_len() > max_len {
                pieces.push(std::mem::take(&mut buf));
            }
            buf.words.push(word);
        }
        if !buf.words.is_empty() {
            pieces.push(buf);
        }

        rebalance_tail(&mut pieces, min_len, max_len);
        result.extend(pieces);
    }

    result
}
