//! Группировка чанков в батчи с двумя ограничениями: по символам и по количеству

use serde::Serialize;
use crate::config::BatchConfig;
use crate::text::Chunk;
use crate::warning::PipelineWarning;

/// Упорядоченная непустая группа соседних чанков
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Batch {
    /// Глобальный индекс первого чанка батча
    pub first_index: usize,
    pub chunks: Vec<Chunk>,
}

impl Batch {
    /// Суммарная длина текста в символах
    pub fn char_len(&self) -> usize {
        self.chunks.iter().map(Chunk::char_len).sum()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Глобальные индексы чанков батча
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.first_index..self.first_index + self.chunks.len()
    }
}

/// Разбить чанки на батчи одним проходом.
///
/// Чанк длиннее лимита символов образует отдельный батч и никогда не обрезается.
pub fn plan_batches(chunks: &[Chunk], config: &BatchConfig) -> (Vec<Batch>, Vec<PipelineWarning>) {
    let mut batches = Vec::new();
    let mut warnings = Vec::new();
    let mut current = Batch::default();
    let mut current_chars = 0;

    for (index, chunk) in chunks.iter().enumerate() {
        let chars = chunk.char_len();

        if chars > config.max_batch_chars {
            log::warn!(
                "chunk {}: {} chars exceed batch cap {}, sent as its own batch",
                index, chars, config.max_batch_chars
            );
            warnings.push(PipelineWarning::OversizedChunk {
                chunk_index: index,
                chars,
                cap: config.max_batch_chars,
            });
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            batches.push(Batch { first_index: index, chunks: vec![chunk.clone()] });
            current_chars = 0;
            continue;
        }

        let fits = current_chars + chars <= config.max_batch_chars && current.len() < config.max_batch_chunks;
        if !current.is_empty() && !fits {
            batches.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current.is_empty() {
            current.first_index = index;
        }
        current.chunks.push(chunk.clone());
        current_chars += chars;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    log::debug!("Planned {} batches for {} chunks", batches.len(), chunks.len());
    (batches, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(contents: &[&str]) -> Vec<Chunk> {
        contents.iter().map(|c| Chunk::new(*c)).collect()
    }

    fn contents(batches: &[Batch]) -> Vec<Vec<String>> {
        batches
            .iter()
            .map(|b| b.chunks.iter().map(|c| c.content.clone()).collect())
            .collect()
    }

    #[test]
    fn test_char_cap_flushes_batch() {
        let config = BatchConfig { max_batch_chars: 10, max_batch_chunks: 5 };
        let (batches, warnings) = plan_batches(&chunks(&["abcde", "fghij", "k"]), &config);

        assert_eq!(contents(&batches), vec![vec!["abcde", "fghij"], vec!["k"]]);
        assert_eq!(batches[1].first_index, 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_count_cap_flushes_batch() {
        let config = BatchConfig { max_batch_chars: 100, max_batch_chunks: 2 };
        let (batches, _) = plan_batches(&chunks(&["a", "b", "c", "d", "e"]), &config);
        assert_eq!(contents(&batches), vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[test]
    fn test_oversized_chunk_is_singleton() {
        let config = BatchConfig { max_batch_chars: 5, max_batch_chunks: 5 };
        let (batches, warnings) = plan_batches(&chunks(&["ab", "abcdefgh", "cd", "ef"]), &config);

        assert_eq!(contents(&batches), vec![vec!["ab"], vec!["abcdefgh"], vec!["cd", "ef"]]);
        assert_eq!(batches.iter().map(|b| b.first_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(
            warnings,
            vec![PipelineWarning::OversizedChunk { chunk_index: 1, chars: 8, cap: 5 }]
        );
    }

    #[test]
    fn test_batches_reproduce_order_and_respect_caps() {
        let input: Vec<Chunk> = (0..23).map(|i| Chunk::new("x".repeat(1 + i % 7))).collect();
        let config = BatchConfig { max_batch_chars: 12, max_batch_chunks: 3 };
        let (batches, warnings) = plan_batches(&input, &config);

        assert!(warnings.is_empty());
        for batch in &batches {
            assert!(!batch.is_empty());
            assert!(batch.char_len() <= 12);
            assert!(batch.len() <= 3);
        }
        let flattened: Vec<Chunk> = batches.iter().flat_map(|b| b.chunks.clone()).collect();
        assert_eq!(flattened, input);

        let mut expected_index = 0;
        for batch in &batches {
            assert_eq!(batch.first_index, expected_index);
            expected_index += batch.len();
        }
    }

    #[test]
    fn test_empty_input() {
        let (batches, warnings) = plan_batches(&[], &BatchConfig::default());
        assert!(batches.is_empty());
        assert!(warnings.is_empty());
    }
}
