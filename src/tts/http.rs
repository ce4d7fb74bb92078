//! Движок синтеза, доступный по HTTP
//!
//! `POST {base}/synthesize` принимает JSON-запрос и возвращает байты аудио.
//! Ошибки приходят как JSON `{"error": "...", "unsupported_parameter": "style"}`.
//! `GET {base}/voices` возвращает список голосов.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use super::engine::{EngineCapabilities, EngineError, SynthesisEngine, VoiceInfo};
use super::request::SynthesisRequest;
use crate::markup::Parameter;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    unsupported_parameter: Option<String>,
}

/// Классифицировать ответ с ошибкой.
///
/// Явное поле `unsupported_parameter` дает [`EngineError::UnsupportedParameter`];
/// клиентская ошибка, в тексте которой упоминается стиль, считается отказом от стиля.
pub fn classify_error(status: StatusCode, body: &str) -> EngineError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    if let Some(parameter) = parsed
        .as_ref()
        .and_then(|b| b.unsupported_parameter.as_deref())
        .and_then(Parameter::from_name)
    {
        return EngineError::UnsupportedParameter { parameter, reason: message };
    }

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let lower = message.to_lowercase();
        if lower.contains("style") {
            return EngineError::UnsupportedParameter {
                parameter: Parameter::Style,
                reason: message,
            };
        }
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => EngineError::Unavailable(format!("{} ({})", message, status)),
        _ => EngineError::Failed(format!("{} ({})", message, status)),
    }
}

/// HTTP-клиент движка синтеза
pub struct HttpEngine {
    client: Client,
    base_url: String,
    capabilities: EngineCapabilities,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>, capabilities: EngineCapabilities) -> Self {
        Self::with_client(Client::new(), base_url, capabilities)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, capabilities: EngineCapabilities) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            capabilities,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl SynthesisEngine for HttpEngine {
    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities.clone()
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes, EngineError> {
        let response = self
            .client
            .post(self.url("synthesize"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    EngineError::Unavailable(e.to_string())
                } else {
                    EngineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            log::error!("Engine error (status {}): {}", status, body);
            return Err(classify_error(status, &body));
        }

        let bytes = response.bytes().await?;
        log::debug!("Received {} bytes of audio", bytes.len());
        Ok(bytes)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, EngineError> {
        let response = self.client.get(self.url("voices")).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            log::debug!("Engine at {} has no voice catalog", self.base_url);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        Ok(response.json::<Vec<VoiceInfo>>().await?)
    }
}
