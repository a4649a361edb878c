//! 文档树模型与结构保持翻译
//!
//! 宿主程序把任意来源的标记解析成 [`DocumentNode`] 树交给引擎；
//! 引擎只认这一种树，不关心它来自 XML、HTML 还是别的格式。
//! `parser` 与 `serializer` 只服务于原始块里嵌入的子文档。

pub mod engine;
pub mod parser;
pub mod serializer;

pub use engine::{SubstitutionEngine, TreeStats};
pub use parser::parse_fragment;
pub use serializer::serialize_fragment;

/// 文档树节点
///
/// `RawBlock` 承载嵌入的标记子文档，`cdata_wrapped` 记录来源的
/// 定界约定：`true` 表示 CDATA 段，`false` 表示以实体转义形式
/// 写在文本里的标记。输出时原样恢复该约定，CDATA 内容永不转义。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    Element {
        name: String,
        /// 属性按源文档顺序保存
        attributes: Vec<(String, String)>,
        children: Vec<DocumentNode>,
    },
    Text(String),
    RawBlock {
        content: String,
        cdata_wrapped: bool,
    },
}

impl DocumentNode {
    /// 无属性元素的便捷构造
    pub fn element(name: impl Into<String>, children: Vec<DocumentNode>) -> Self {
        DocumentNode::Element {
            name: name.into(),
            attributes: Vec::new(),
            children,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        DocumentNode::Text(content.into())
    }

    /// 查询属性值，属性名不区分大小写
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            DocumentNode::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// 整棵子树的节点总数（含自身）
    pub fn node_count(&self) -> usize {
        match self {
            DocumentNode::Element { children, .. } => {
                1 + children.iter().map(DocumentNode::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_ignores_case() {
        let node = DocumentNode::Element {
            name: "p".to_string(),
            attributes: vec![("Ignore".to_string(), "true".to_string())],
            children: vec![],
        };
        assert_eq!(node.attribute("ignore"), Some("true"));
        assert_eq!(node.attribute("missing"), None);
    }

    #[test]
    fn node_count_walks_subtree() {
        let tree = DocumentNode::element(
            "root",
            vec![
                DocumentNode::text("hi"),
                DocumentNode::element("child", vec![DocumentNode::text("deep")]),
            ],
        );
        assert_eq!(tree.node_count(), 4);
    }
}
