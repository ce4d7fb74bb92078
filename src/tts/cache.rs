//! Модуль для кэширования результатов синтеза
//!
//! Ключ кэша вычисляется по запросу (см. [`SynthesisRequest::compute_cache_key`]).
//! Для каждого ключа выполняется не больше одного синтеза одновременно:
//! второй запрос с тем же ключом ждет завершения первого.
//! Количество фрагментов в памяти ограничено, самые старые вытесняются первыми.
//!
//! [`SynthesisRequest::compute_cache_key`]: super::request::SynthesisRequest::compute_cache_key

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use crate::config::CacheConfig;
use crate::error::{Result, TtsMarkupError};
use crate::media::AudioArtifact;

/// Расширения, под которыми фрагменты лежат на диске
const DISK_EXTENSIONS: [&str; 3] = ["wav", "mp3", "bin"];

struct MemoryEntry {
    cell: Arc<OnceCell<AudioArtifact>>,
    /// Порядковый номер вставки, для вытеснения старых записей
    seq: u64,
}

#[derive(Default)]
struct MemoryEntries {
    map: HashMap<String, MemoryEntry>,
    next_seq: u64,
}

impl MemoryEntries {
    fn cell(&mut self, key: &str) -> Arc<OnceCell<AudioArtifact>> {
        if let Some(entry) = self.map.get(key) {
            return entry.cell.clone();
        }
        let cell = Arc::new(OnceCell::new());
        self.map.insert(key.to_string(), MemoryEntry { cell: cell.clone(), seq: self.next_seq });
        self.next_seq += 1;
        cell
    }

    /// Убрать пустую ячейку после неудачного синтеза
    fn discard_if_empty(&mut self, key: &str, cell: &Arc<OnceCell<AudioArtifact>>) {
        let stale = self
            .map
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.cell, cell) && !entry.cell.initialized());
        if stale {
            self.map.remove(key);
        }
    }

    /// Вытеснить самые старые готовые фрагменты сверх `max_entries`
    fn evict(&mut self, max_entries: usize) {
        let ready = self.map.values().filter(|e| e.cell.initialized()).count();
        if ready <= max_entries {
            return;
        }

        let mut candidates: Vec<(u64, String)> = self
            .map
            .iter()
            .filter(|(_, e)| e.cell.initialized())
            .map(|(key, e)| (e.seq, key.clone()))
            .collect();
        candidates.sort_unstable();

        for (_, key) in candidates.into_iter().take(ready - max_entries) {
            self.map.remove(&key);
            log::debug!("Evicted {} from memory cache", key);
        }
    }
}

/// Кэш синтезированных фрагментов: в памяти и, опционально, на диске
pub struct SynthesisCache {
    enabled: bool,
    /// Директория для дискового кэша
    cache_dir: Option<PathBuf>,
    /// Максимальный размер дискового кэша в байтах
    max_size: Option<u64>,
    /// Максимальное количество фрагментов в памяти
    max_entries: Option<usize>,
    entries: Mutex<MemoryEntries>,
}

impl SynthesisCache {
    /// Создать кэш по конфигурации (директория создается при необходимости)
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let cache_dir = match &config.cache_dir {
            Some(dir) if config.enabled => {
                let dir = PathBuf::from(dir);
                if !dir.exists() {
                    fs::create_dir_all(&dir)?;
                }
                Some(dir)
            }
            _ => None,
        };

        Ok(Self {
            enabled: config.enabled,
            cache_dir,
            max_size: config.max_cache_size,
            max_entries: config.max_memory_entries,
            entries: Mutex::new(MemoryEntries::default()),
        })
    }

    /// Кэш, который ничего не хранит
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            cache_dir: None,
            max_size: None,
            max_entries: None,
            entries: Mutex::new(MemoryEntries::default()),
        }
    }

    /// Получить фрагмент из кэша или вычислить его через `synthesize`.
    ///
    /// Ошибки не кэшируются: следующий запрос с тем же ключом попробует снова.
    pub async fn get_or_synthesize<F, Fut>(&self, key: &str, synthesize: F) -> Result<AudioArtifact>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AudioArtifact>>,
    {
        if !self.enabled {
            return synthesize().await;
        }

        let cell = self.entries.lock().cell(key);

        if let Some(artifact) = cell.get() {
            log::debug!("Cache hit for {}", key);
            return Ok(artifact.clone());
        }

        let result = cell
            .get_or_try_init(|| async {
                if let Some(artifact) = self.load_from_disk(key).await {
                    log::debug!("Disk cache hit for {}", key);
                    return Ok(artifact);
                }
                let artifact = synthesize().await?;
                self.store_on_disk(key, &artifact).await;
                Ok::<_, TtsMarkupError>(artifact)
            })
            .await
            .cloned();

        let mut entries = self.entries.lock();
        match &result {
            Ok(_) => {
                if let Some(max_entries) = self.max_entries {
                    entries.evict(max_entries);
                }
            }
            Err(_) => entries.discard_if_empty(key, &cell),
        }
        result
    }

    /// Есть ли готовый фрагмент для ключа в памяти
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map
            .get(key)
            .is_some_and(|entry| entry.cell.initialized())
    }

    /// Количество готовых фрагментов в памяти
    pub fn len(&self) -> usize {
        self.entries.lock().map.values().filter(|entry| entry.cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Забыть фрагменты в памяти; дисковый кэш остается
    pub fn clear_memory(&self) {
        self.entries.lock().map.clear();
    }

    /// Очистить кэш в памяти и на диске
    pub fn clear(&self) -> Result<()> {
        self.entries.lock().map.clear();

        if let Some(dir) = &self.cache_dir {
            for file in fs::read_dir(dir)? {
                let file = file?;
                if file.file_type()?.is_file() {
                    fs::remove_file(file.path())?;
                }
            }
        }
        Ok(())
    }

    fn disk_path(dir: &Path, key: &str, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", key, extension))
    }

    async fn load_from_disk(&self, key: &str) -> Option<AudioArtifact> {
        let dir = self.cache_dir.as_ref()?;
        for extension in DISK_EXTENSIONS {
            let path = Self::disk_path(dir, key, extension);
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if !bytes.is_empty() {
                    return Some(AudioArtifact::from_bytes(bytes));
                }
            }
        }
        None
    }

    /// Ошибки записи на диск не фатальны: фрагмент остается в памяти
    async fn store_on_disk(&self, key: &str, artifact: &AudioArtifact) {
        let Some(dir) = &self.cache_dir else { return };

        let path = Self::disk_path(dir, key, artifact.format.container.extension());
        if let Err(e) = tokio::fs::write(&path, &artifact.bytes).await {
            log::warn!("Failed to write cache file {}: {}", path.display(), e);
            return;
        }
        if let Err(e) = self.check_cache_size() {
            log::warn!("Failed to trim cache directory {}: {}", dir.display(), e);
        }
    }

    /// Удалить самые старые файлы, если размер кэша превышает максимальный
    fn check_cache_size(&self) -> Result<()> {
        let (Some(dir), Some(max_size)) = (&self.cache_dir, self.max_size) else {
            return Ok(());
        };

        let mut total_size = 0;
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let metadata = entry.metadata()?;
                total_size += metadata.len();
                files.push((entry.path(), metadata.len(), metadata.modified()?));
            }
        }

        if total_size > max_size {
            // От старых к новым
            files.sort_by(|a, b| a.2.cmp(&b.2));
            for (path, len, _) in files {
                if total_size <= max_size {
                    break;
                }
                fs::remove_file(&path)?;
                total_size -= len;
                log::debug!("Evicted cache file {}", path.display());
            }
        }

        Ok(())
    }
}
