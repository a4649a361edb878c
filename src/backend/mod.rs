//! 翻译后端抽象
//!
//! 每个后端实现 [`BackendAdapter`]：一次请求进、一段译文或一个
//! 分类错误出。后端自身不做重试，重试与节流属于调度器的职责。

pub mod chain;
pub mod google_web;
pub mod libre;
pub mod mock;
pub mod mymemory;
pub mod probe;

use std::time::Duration;

use crate::error::{BackendError, EngineError, EngineResult};

pub use chain::BackendChain;
pub use probe::{probe_local_instance, ProbeOutcome};

/// 默认 HTTP 请求超时
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// 把 reqwest 传输层错误映射到后端错误分类
pub(crate) fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_connect() || err.is_timeout() {
        BackendError::Unreachable(err.to_string())
    } else {
        BackendError::InvalidResponse(err.to_string())
    }
}

/// 截断响应体用于错误信息，避免日志爆炸
pub(crate) fn truncate_body(body: &str) -> &str {
    let limit = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..limit]
}

/// 一次翻译请求
///
/// 构造时校验文本非空。语言代码使用后端通用的 ISO 639 形式
/// （如 `en`、`zh`），由宿主程序保证合法性。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationRequest {
    /// 创建请求，空文本或纯空白文本被拒绝
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> EngineResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(EngineError::EmptyRequest);
        }
        Ok(TranslationRequest {
            text,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// 以相同语言对、不同文本派生新请求
    pub fn with_text(&self, text: impl Into<String>) -> EngineResult<Self> {
        TranslationRequest::new(text, self.source_lang.clone(), self.target_lang.clone())
    }
}

/// 翻译后端接口
///
/// 实现必须可跨线程共享：批量翻译的工作线程会并发调用同一个
/// 后端实例。`translate` 阻塞当前线程直到后端返回。
pub trait BackendAdapter: Send + Sync {
    /// 后端标识名，用于配置键、日志与错误汇总
    fn name(&self) -> &str;

    /// 翻译一段文本，不做内部重试
    fn translate(&self, request: &TranslationRequest) -> Result<String, BackendError>;
}

/// 链中一个后端的静态描述
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub name: String,
    /// 有效优先级，0 最高；本地实例验证通过后被提升到 0
    pub priority_rank: usize,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// 估算吞吐量（片段/秒），仅用于日志参考
    pub estimated_throughput: f64,
}
