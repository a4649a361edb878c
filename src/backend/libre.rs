//! LibreTranslate 后端
//!
//! 兼容公共实例与自托管实例。POST JSON 到 `/translate`，
//! 响应取 `translatedText` 字段。

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::{
    classify_transport, truncate_body, BackendAdapter, TranslationRequest, HTTP_TIMEOUT,
};
use crate::error::BackendError;

/// 公共实例默认地址
pub const DEFAULT_URL: &str = "https://libretranslate.com/translate";

#[derive(Serialize)]
struct LibrePayload<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

pub struct LibreBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LibreBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        LibreBackend {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl BackendAdapter for LibreBackend {
    fn name(&self) -> &str {
        "libretranslate"
    }

    fn translate(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        let payload = LibrePayload {
            q: request.text(),
            source: request.source_lang(),
            target: request.target_lang(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| BackendError::InvalidResponse(format!("读取响应失败: {}", e)))?;

        match status {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(BackendError::RateLimited),
            StatusCode::BAD_REQUEST if body.to_lowercase().contains("not supported") => {
                return Err(BackendError::Unsupported {
                    source_lang: request.source_lang().to_string(),
                    target_lang: request.target_lang().to_string(),
                });
            }
            other => {
                return Err(BackendError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    other,
                    truncate_body(&body)
                )));
            }
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(format!("响应不是 JSON: {}", e)))?;
        let translated = parsed
            .get("translatedText")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::InvalidResponse("响应缺少 translatedText 字段".to_string())
            })?;

        debug!(endpoint = %self.endpoint, chars = request.text().len(), "LibreTranslate 调用成功");
        Ok(translated.to_string())
    }
}
