//! MyMemory 后端
//!
//! GET `api.mymemory.translated.net/get?q=..&langpair=a|b`。注意
//! MyMemory 即使被限流也返回 HTTP 200，真实状态在响应体的
//! `responseStatus` 字段里。

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::backend::{
    classify_transport, truncate_body, BackendAdapter, TranslationRequest, HTTP_TIMEOUT,
};
use crate::error::BackendError;

pub const DEFAULT_URL: &str = "https://api.mymemory.translated.net/get";

pub struct MyMemoryBackend {
    client: Client,
    endpoint: String,
}

impl MyMemoryBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        MyMemoryBackend {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl BackendAdapter for MyMemoryBackend {
    fn name(&self) -> &str {
        "mymemory"
    }

    fn translate(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        let langpair = format!("{}|{}", request.source_lang(), request.target_lang());
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", request.text()), ("langpair", &langpair)])
            .send()
            .map_err(classify_transport)?;

        let body = response
            .text()
            .map_err(|e| BackendError::InvalidResponse(format!("读取响应失败: {}", e)))?;
        let parsed: Value = serde_json::from_str(&body).map_err(|_| {
            BackendError::InvalidResponse(format!("响应不是 JSON: {}", truncate_body(&body)))
        })?;

        match parsed.get("responseStatus").and_then(Value::as_i64) {
            Some(200) => {}
            Some(429) => return Err(BackendError::RateLimited),
            Some(other) => {
                let detail = parsed
                    .get("responseDetails")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if detail.to_lowercase().contains("invalid") && detail.contains('|') {
                    // "'xx|yy' is an invalid source|target language pair"
                    return Err(BackendError::Unsupported {
                        source_lang: request.source_lang().to_string(),
                        target_lang: request.target_lang().to_string(),
                    });
                }
                return Err(BackendError::InvalidResponse(format!(
                    "responseStatus {}: {}",
                    other, detail
                )));
            }
            None => {
                return Err(BackendError::InvalidResponse(
                    "响应缺少 responseStatus 字段".to_string(),
                ));
            }
        }

        let translated = parsed
            .pointer("/responseData/translatedText")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                BackendError::InvalidResponse("响应缺少 translatedText 字段".to_string())
            })?;

        debug!(langpair = %langpair, "MyMemory 调用成功");
        Ok(translated.to_string())
    }
}
