//! Запрос к движку синтеза и его ключ кэша

use std::collections::BTreeSet;
use serde::Serialize;
use crate::markup::{Parameter, ResolvedChunk};

/// Один запрос к движку: документ разметки или простой текст с параметрами
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub payload: String,
    pub voice: String,
    pub is_markup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_degree: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip)]
    pub cache_key: String,
}

impl SynthesisRequest {
    /// Запрос с готовым документом разметки
    pub fn markup(document: String, voice: impl Into<String>) -> Self {
        let mut request = Self {
            payload: document,
            voice: voice.into(),
            is_markup: true,
            style: None,
            style_degree: None,
            rate: None,
            pitch: None,
            volume: None,
            cache_key: String::new(),
        };
        request.cache_key = request.compute_cache_key();
        request
    }

    /// Простой запрос: текст чанка и отдельные поля параметров.
    ///
    /// `with_style` и `with_prosody` отражают возможности движка,
    /// `suppressed` содержит параметры, которые движок уже отклонил.
    pub fn plain(
        chunk: &ResolvedChunk,
        with_style: bool,
        with_prosody: bool,
        suppressed: &BTreeSet<Parameter>,
    ) -> Self {
        let keep = |parameter: Parameter, enabled: bool| enabled && !suppressed.contains(&parameter);

        let style = chunk.emotion.clone().filter(|_| keep(Parameter::Style, with_style));
        let style_degree = style
            .as_ref()
            .and(Some(chunk.styledegree))
            .filter(|_| keep(Parameter::StyleDegree, with_style));

        let mut request = Self {
            payload: chunk.content.clone(),
            voice: chunk.voice.clone(),
            is_markup: false,
            style,
            style_degree,
            rate: Some(chunk.rate).filter(|_| keep(Parameter::Rate, with_prosody)),
            pitch: Some(chunk.pitch).filter(|_| keep(Parameter::Pitch, with_prosody)),
            volume: Some(chunk.volume).filter(|_| keep(Parameter::Volume, with_prosody)),
            cache_key: String::new(),
        };
        request.cache_key = request.compute_cache_key();
        request
    }

    /// Детерминированный ключ: md5 от голоса, текста и всех параметров
    pub fn compute_cache_key(&self) -> String {
        fn field(value: Option<f64>) -> String {
            value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
        }

        let mut hasher = md5::Context::new();
        hasher.consume(self.voice.as_bytes());
        hasher.consume([0u8]);
        hasher.consume(self.payload.as_bytes());
        hasher.consume([0u8]);
        hasher.consume(if self.is_markup { b"markup" as &[u8] } else { b"plain" });
        hasher.consume([0u8]);
        hasher.consume(self.style.as_deref().unwrap_or("-").as_bytes());
        for value in [self.style_degree, self.rate, self.pitch, self.volume] {
            hasher.consume([0u8]);
            hasher.consume(field(value).as_bytes());
        }

        format!("{:x}", hasher.compute())
    }

    /// Параметры, присутствующие в запросе как отдельные поля
    pub fn parameters(&self) -> Vec<Parameter> {
        [
            (Parameter::Style, self.style.is_some()),
            (Parameter::StyleDegree, self.style_degree.is_some()),
            (Parameter::Rate, self.rate.is_some()),
            (Parameter::Pitch, self.pitch.is_some()),
            (Parameter::Volume, self.volume.is_some()),
        ]
        .into_iter()
        .filter_map(|(parameter, present)| present.then_some(parameter))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ResolvedChunk {
        ResolvedChunk {
            content: "Great news!".to_string(),
            voice: "en-US-JennyNeural".to_string(),
            emotion: Some("cheerful".to_string()),
            intensity: Some(2),
            styledegree: 1.0,
            rate: 10.0,
            pitch: 0.0,
            volume: -2.0,
        }
    }

    #[test]
    fn test_plain_request_fields() {
        let request = SynthesisRequest::plain(&resolved(), true, true, &BTreeSet::new());
        assert!(!request.is_markup);
        assert_eq!(request.style.as_deref(), Some("cheerful"));
        assert_eq!(request.style_degree, Some(1.0));
        assert_eq!(request.rate, Some(10.0));
        assert_eq!(request.parameters().len(), 5);
    }

    #[test]
    fn test_suppressed_and_unsupported_fields_are_omitted() {
        let suppressed: BTreeSet<Parameter> = [Parameter::Style].into_iter().collect();
        let request = SynthesisRequest::plain(&resolved(), true, false, &suppressed);
        assert_eq!(request.style, None);
        assert_eq!(request.style_degree, None);
        assert!(request.parameters().is_empty());
    }

    #[test]
    fn test_cache_key_depends_on_every_field() {
        let base = SynthesisRequest::plain(&resolved(), true, true, &BTreeSet::new());
        assert_eq!(base.cache_key, SynthesisRequest::plain(&resolved(), true, true, &BTreeSet::new()).cache_key);

        let mut louder = resolved();
        louder.volume = 3.0;
        assert_ne!(base.cache_key, SynthesisRequest::plain(&louder, true, true, &BTreeSet::new()).cache_key);

        let markup = SynthesisRequest::markup(base.payload.clone(), base.voice.clone());
        assert_ne!(base.cache_key, markup.cache_key);
        assert_eq!(markup.cache_key.len(), 32);
    }

    #[test]
    fn test_serialized_request_skips_absent_fields() {
        let request = SynthesisRequest::markup("<speak/>".to_string(), "v");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"payload": "<speak/>", "voice": "v", "is_markup": true}));
    }
}
