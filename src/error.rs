//! 统一错误处理
//!
//! 定义翻译引擎的错误分类体系。核心原则：
//!
//! - 后端错误分为可重试（网络抖动、限流、响应异常）与不可重试（语言对不支持）；
//! - 单个片段的失败永远不会升级为整批失败，更不会终止进程；
//! - 词汇表规则行损坏只导致该行被跳过并记录日志。

use std::fmt;

use thiserror::Error;

/// 单个翻译后端一次调用的失败原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// 请求频率超限，等待后可重试
    #[error("请求频率超限")]
    RateLimited,

    /// 网络层面不可达（连接失败、超时等）
    #[error("后端不可达: {0}")]
    Unreachable(String),

    /// 后端有响应但格式不符合预期
    #[error("响应格式异常: {0}")]
    InvalidResponse(String),

    /// 后端声明不支持该语言对，重试无意义
    #[error("不支持的语言对: {source_lang} -> {target_lang}")]
    Unsupported {
        source_lang: String,
        target_lang: String,
    },
}

impl BackendError {
    /// 检查错误是否可重试
    ///
    /// 只有 `Unsupported` 属于确定性失败，调度器遇到它会立即放弃
    /// 当前后端；其余三类视为瞬态错误，进入退避重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::RateLimited => true,
            BackendError::Unreachable(_) => true,
            BackendError::InvalidResponse(_) => true,
            BackendError::Unsupported { .. } => false,
        }
    }
}

/// 后端链整体耗尽：每个后端的最后一次错误按尝试顺序汇总
///
/// 该错误不会向上传播为批次失败——持有它的片段会以原文回退，
/// 错误本身仅用于日志与统计。
#[derive(Debug, Clone)]
pub struct ExhaustedError {
    /// (后端名, 该后端的最后一次错误)，按链的有效顺序排列
    pub failures: Vec<(String, BackendError)>,
}

impl fmt::Display for ExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "所有翻译后端均失败")?;
        for (name, err) in &self.failures {
            write!(f, "; {}: {}", name, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExhaustedError {}

/// 词汇表规则行损坏
///
/// 解析时跳过该行并记录警告，不中断整个词汇表的加载。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("词汇表第 {line} 行无效: {reason}")]
pub struct GlossaryRuleError {
    pub line: usize,
    pub reason: String,
}

/// 引擎层错误（配置、输入校验）
#[derive(Error, Debug)]
pub enum EngineError {
    /// 翻译请求文本为空或仅含空白
    #[error("翻译请求文本为空")]
    EmptyRequest,

    /// 配置的后端顺序为空，或没有一个名字能被识别
    #[error("没有可用的翻译后端: {0}")]
    NoBackends(String),

    /// 工作线程池创建失败
    #[error("工作线程池创建失败: {0}")]
    WorkerPool(String),
}

/// 错误结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
