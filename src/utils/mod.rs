//! Вспомогательные утилиты

pub mod logger;
