//! Модуль для работы с аудио
//!
//! Распознавание формата фрагментов, полученных от движка, и их склейка
//! в итоговую дорожку без перекодирования.

pub mod format;
pub mod merge;

pub use format::{AudioArtifact, AudioFormat, Container};
pub use merge::{merge_artifacts, MergedTrack};
