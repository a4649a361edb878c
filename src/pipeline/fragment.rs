//! 片段与坐标
//!
//! 片段是批量翻译的最小单位：一段待翻译文本加上它在宿主结构里
//! 的坐标。坐标必须在整个批次内唯一，重新组装时据此回填。

use crate::error::ExhaustedError;

/// 树中的子索引路径，根为空路径
///
/// 嵌入式子文档（原始块里解析出的树）的路径接在宿主原始块的
/// 路径之后，保证整篇文档的坐标仍然唯一。
pub type NodePath = Vec<usize>;

/// 片段在宿主结构中的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coordinate {
    /// 表格单元格（行, 列）
    Cell { row: usize, column: usize },
    /// 文档树中的文本节点
    Node(NodePath),
}

/// 一个待翻译片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub coordinate: Coordinate,
    pub text: String,
}

impl Fragment {
    pub fn new(coordinate: Coordinate, text: impl Into<String>) -> Self {
        Fragment {
            coordinate,
            text: text.into(),
        }
    }
}

/// 单个片段的最终结果
///
/// 不存在"被丢弃的片段"：要么翻译成功，要么带着原文失败。
/// 失败是退化而不是缺失，调用方用 [`FragmentOutcome::text`]
/// 总能拿到一个确定的值。
#[derive(Debug, Clone)]
pub enum FragmentOutcome {
    Translated {
        text: String,
        /// 给出译文的后端
        backend: String,
        /// 成功后端上的调用次数
        attempts: u32,
    },
    Failed {
        /// 与输入逐字节相同的原文
        original: String,
        error: ExhaustedError,
    },
}

impl FragmentOutcome {
    /// 结果文本：译文，或失败时的原文
    pub fn text(&self) -> &str {
        match self {
            FragmentOutcome::Translated { text, .. } => text,
            FragmentOutcome::Failed { original, .. } => original,
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, FragmentOutcome::Translated { .. })
    }
}
