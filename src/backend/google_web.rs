//! Google 网页端点后端
//!
//! 使用 `translate_a/single?client=gtx` 这一无需密钥的网页接口。
//! 响应是深度嵌套的 JSON 数组，首元素是分段数组，每段的第 0 项
//! 为译文，逐段拼接得到完整结果。

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::backend::{
    classify_transport, truncate_body, BackendAdapter, TranslationRequest, HTTP_TIMEOUT,
};
use crate::error::BackendError;

pub const DEFAULT_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub struct GoogleWebBackend {
    client: Client,
    endpoint: String,
}

impl GoogleWebBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        GoogleWebBackend {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl BackendAdapter for GoogleWebBackend {
    fn name(&self) -> &str {
        "google_web"
    }

    fn translate(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", request.source_lang()),
                ("tl", request.target_lang()),
                ("dt", "t"),
                ("q", request.text()),
            ])
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| BackendError::InvalidResponse(format!("读取响应失败: {}", e)))?;

        match status {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(BackendError::RateLimited),
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

        // 结构: [[["译文段", "原文段", ...], ...], ...]
        let segments = parsed
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::InvalidResponse("响应缺少分段数组".to_string()))?;

        let mut translated = String::new();
        for segment in segments {
            if let Some(piece) = segment.get(0).and_then(Value::as_str) {
                translated.push_str(piece);
            }
        }
        if translated.is_empty() {
            return Err(BackendError::InvalidResponse(
                "响应分段中没有译文".to_string(),
            ));
        }

        debug!(chars = request.text().len(), "Google 网页端点调用成功");
        Ok(translated)
    }
}
