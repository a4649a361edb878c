//! 重试调度器
//!
//! 节流与重试策略集中在这里，后端实现保持干净。每次真实调用前
//! 固定等待 `request_delay`；可重试失败按 `base * 2^(attempt-1)`
//! 指数退避，最多 `max_retries` 次尝试；不可重试错误立即放弃。
//!
//! 默认参数（5ms 间隔 / 3 次尝试 / 20ms 退避基数）来自对公共
//! 实例的实测调优，改动前先量一量。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{BackendAdapter, TranslationRequest};
use crate::config::Settings;
use crate::error::BackendError;

/// 睡眠接口，测试里换成记录型假实现
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// 真实线程睡眠
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// 只记录不睡的假实现，用于退避时序断言
#[derive(Default)]
pub struct RecordingSleeper {
    slept: std::sync::Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的全部睡眠时长，按发生顺序
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// 一次成功调度的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub text: String,
    /// 实际发出的调用次数（含成功的那一次）
    pub attempts: u32,
}

/// 带节流与退避的调度器
pub struct Dispatcher {
    request_delay: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Dispatcher {
    pub fn from_settings(settings: &Settings) -> Self {
        Dispatcher::with_sleeper(settings, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(settings: &Settings, sleeper: Arc<dyn Sleeper>) -> Self {
        Dispatcher {
            request_delay: settings.request_delay,
            // 0 次尝试没有意义，至少调一次
            max_retries: settings.max_retries.max(1),
            retry_base_delay: settings.retry_base_delay,
            sleeper,
        }
    }

    /// 对单个后端发起一次带重试的调度
    ///
    /// 返回的 `attempts` 计入成功那次调用。`Unsupported` 不重试，
    /// 其余错误重试至上限后返回最后一次错误。
    pub fn dispatch(
        &self,
        backend: &dyn BackendAdapter,
        request: &TranslationRequest,
    ) -> Result<Dispatched, BackendError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            self.sleeper.sleep(self.request_delay);

            match backend.translate(request) {
                Ok(text) => {
                    if attempt > 1 {
                        debug!(backend = backend.name(), attempt, "重试后成功");
                    }
                    return Ok(Dispatched { text, attempts: attempt });
                }
                Err(err) if !err.is_retryable() => {
                    warn!(backend = backend.name(), error = %err, "确定性失败，不再重试");
                    return Err(err);
                }
                Err(err) => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        backend = backend.name(),
                        attempt,
                        max = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "调用失败，退避后重试"
                    );
                    self.sleeper.sleep(backoff);
                    last_error = Some(err);
                }
            }
        }

        // max_retries >= 1，走到这里必然至少失败过一次
        Err(last_error.unwrap_or(BackendError::InvalidResponse(
            "调度器未发出任何调用".to_string(),
        )))
    }

    /// 第 `attempt` 次失败后的退避时长: base * 2^(attempt-1)
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
