//! 测试用后端
//!
//! 确定性翻译（`"[目标语言] 原文"`），失败可编排，调用次数可观测。
//! 集成测试依赖它验证重试、回退与批量语义，不产生任何网络流量。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{BackendAdapter, TranslationRequest};
use crate::error::BackendError;

pub struct MockBackend {
    name: String,
    calls: AtomicUsize,
    /// 逐次调用的脚本：`Some(err)` 失败、`None` 成功，耗尽后按
    /// `permanent_failure` 行为
    script: Mutex<VecDeque<Option<BackendError>>>,
    /// 脚本耗尽后每次调用都返回该错误；`None` 表示成功
    permanent_failure: Option<BackendError>,
}

impl MockBackend {
    /// 永远成功的后端
    pub fn new(name: impl Into<String>) -> Self {
        MockBackend {
            name: name.into(),
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            permanent_failure: None,
        }
    }

    /// 每次调用都失败的后端
    pub fn always_failing(name: impl Into<String>, error: BackendError) -> Self {
        MockBackend {
            name: name.into(),
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            permanent_failure: Some(error),
        }
    }

    /// 前几次调用依次返回给定错误，之后成功
    pub fn with_scripted_failures(
        name: impl Into<String>,
        failures: Vec<BackendError>,
    ) -> Self {
        MockBackend::with_call_script(name, failures.into_iter().map(Some).collect())
    }

    /// 逐次调用的完整脚本，成功与失败可任意交错
    pub fn with_call_script(
        name: impl Into<String>,
        script: Vec<Option<BackendError>>,
    ) -> Self {
        MockBackend {
            name: name.into(),
            calls: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            permanent_failure: None,
        }
    }

    /// 迄今被调用的总次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 确定性译文格式，测试据此断言
    pub fn expected_translation(target_lang: &str, text: &str) -> String {
        format!("[{}] {}", target_lang, text)
    }
}

impl BackendAdapter for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn translate(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .script
            .lock()
            .map(|mut q| q.pop_front())
            .unwrap_or(None);
        match scripted {
            Some(Some(err)) => return Err(err),
            Some(None) => {
                return Ok(Self::expected_translation(
                    request.target_lang(),
                    request.text(),
                ));
            }
            None => {}
        }
        if let Some(err) = &self.permanent_failure {
            return Err(err.clone());
        }
        Ok(Self::expected_translation(
            request.target_lang(),
            request.text(),
        ))
    }
}
