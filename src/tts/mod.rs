//! Модуль для работы с движком синтеза речи
//!
//! Контракт движка, построение запросов, кэш синтеза, каталог голосов,
//! диспетчер батчей и HTTP-реализация движка.

pub mod engine;
pub mod request;
pub mod cache;
pub mod voices;
pub mod dispatcher;
pub mod http;

pub use cache::SynthesisCache;
pub use dispatcher::{DispatchOutcome, SynthesisDispatcher};
pub use engine::{EngineCapabilities, EngineError, SynthesisEngine, VoiceInfo};
pub use http::HttpEngine;
pub use request::SynthesisRequest;
pub use voices::VoiceCatalog;
