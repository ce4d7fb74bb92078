use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Фильтр по умолчанию, если RUST_LOG не задан
pub const DEFAULT_FILTER: &str = "warn,tts_markup=info";

/// Фильтр для подробного вывода
pub const VERBOSE_FILTER: &str = "warn,tts_markup=debug";

/// Инициализировать логирование.
///
/// Повторный вызов ничего не делает.
pub fn init_logger() {
    init_logger_with_default(DEFAULT_FILTER);
}

/// Инициализировать логирование с собственным фильтром; RUST_LOG имеет приоритет
pub fn init_logger_with_default(default_filter: &str) {
    let env = Env::default().filter_or("RUST_LOG", default_filter);

    let mut builder = Builder::from_env(env);

    // Шумные зависимости HTTP-клиента
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("tokio_util", LevelFilter::Error)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_does_not_panic() {
        init_logger();
        init_logger_with_default(VERBOSE_FILTER);
        log::info!("logger initialized twice");
    }
}
