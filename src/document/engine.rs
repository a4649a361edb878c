//! 树替换引擎
//!
//! 对一棵文档树做结构保持翻译：两段式遍历，先深度优先收集全部
//! 可译文本，整棵树共用一个批次，再按坐标回填译文。两次遍历的
//! 路径完全一致，这是坐标寻址正确性的前提。
//!
//! 翻译永远只改文本节点的内容。元素名、属性、命名空间、被忽略
//! 的子树以及文本两侧的空白原样保留；失败的片段逐字节回退为
//! 原文。

use tracing::{debug, info};

use crate::backend::BackendChain;
use crate::document::parser::parse_fragment;
use crate::document::serializer::serialize_fragment;
use crate::document::DocumentNode;
use crate::glossary::Glossary;
use crate::pipeline::batch::BatchTranslator;
use crate::pipeline::fragment::{Coordinate, Fragment, FragmentOutcome, NodePath};
use std::collections::HashMap;

/// 一次树翻译的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// 收集到的片段数
    pub fragments: usize,
    /// 成功翻译的片段数
    pub translated: usize,
    /// 回退为原文的片段数
    pub failed: usize,
}

/// 结构保持替换引擎
pub struct SubstitutionEngine {
    /// 带该属性且值为 true（不区分大小写）的元素整棵子树跳过
    ignore_attr: String,
}

impl Default for SubstitutionEngine {
    fn default() -> Self {
        SubstitutionEngine::new("ignore")
    }
}

impl SubstitutionEngine {
    pub fn new(ignore_attr: impl Into<String>) -> Self {
        SubstitutionEngine {
            ignore_attr: ignore_attr.into(),
        }
    }

    /// 翻译一棵文档树
    ///
    /// 返回新树与统计。输入树不被修改；收集不到片段时直接返回
    /// 原树的拷贝。
    pub fn translate_tree(
        &self,
        root: &DocumentNode,
        translator: &BatchTranslator,
        chain: &BackendChain,
        glossary: &Glossary,
        source_lang: &str,
        target_lang: &str,
    ) -> (DocumentNode, TreeStats) {
        let mut fragments = Vec::new();
        let mut path = NodePath::new();
        self.collect(root, &mut path, &mut fragments);

        if fragments.is_empty() {
            debug!("树中没有可译文本");
            return (root.clone(), TreeStats::default());
        }

        let total = fragments.len();
        let outcomes =
            translator.translate_batch(fragments, chain, glossary, source_lang, target_lang);

        let translated = outcomes.values().filter(|o| o.is_translated()).count();
        let stats = TreeStats {
            fragments: total,
            translated,
            failed: total - translated,
        };
        info!(
            fragments = stats.fragments,
            translated = stats.translated,
            failed = stats.failed,
            "树翻译完成"
        );

        let mut path = NodePath::new();
        let rebuilt = self.rebuild(root, &mut path, &outcomes);
        (rebuilt, stats)
    }

    fn is_ignored(&self, node: &DocumentNode) -> bool {
        node.attribute(&self.ignore_attr)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// 深度优先收集，`path` 为当前节点的子索引路径
    fn collect(&self, node: &DocumentNode, path: &mut NodePath, fragments: &mut Vec<Fragment>) {
        match node {
            DocumentNode::Element { children, .. } => {
                if self.is_ignored(node) {
                    return;
                }
                for (index, child) in children.iter().enumerate() {
                    path.push(index);
                    self.collect(child, path, fragments);
                    path.pop();
                }
            }
            DocumentNode::Text(text) => {
                if !text.trim().is_empty() {
                    fragments.push(Fragment::new(
                        Coordinate::Node(path.clone()),
                        text.trim(),
                    ));
                }
            }
            DocumentNode::RawBlock { content, .. } => {
                if !raw_content_is_markup(content) {
                    // 纯文本内容不进标记解析器，整块作为一个片段
                    if !content.trim().is_empty() {
                        fragments.push(Fragment::new(
                            Coordinate::Node(path.clone()),
                            content.trim(),
                        ));
                    }
                    return;
                }
                // 原始块没有真正的子节点，嵌入子文档的路径接在块
                // 自身路径之后不会与任何实际坐标冲突
                let forest = parse_fragment(content);
                for (index, sub_root) in forest.iter().enumerate() {
                    path.push(index);
                    self.collect(sub_root, path, fragments);
                    path.pop();
                }
            }
        }
    }

    /// 检查子树内是否存在任何成功译文，遍历与 `collect` 一致
    fn subtree_translated(
        &self,
        node: &DocumentNode,
        path: &mut NodePath,
        outcomes: &HashMap<Coordinate, FragmentOutcome>,
    ) -> bool {
        match node {
            DocumentNode::Element { children, .. } => {
                if self.is_ignored(node) {
                    return false;
                }
                children.iter().enumerate().any(|(index, child)| {
                    path.push(index);
                    let translated = self.subtree_translated(child, path, outcomes);
                    path.pop();
                    translated
                })
            }
            DocumentNode::Text(text) => {
                !text.trim().is_empty()
                    && outcomes
                        .get(&Coordinate::Node(path.clone()))
                        .map(FragmentOutcome::is_translated)
                        .unwrap_or(false)
            }
            DocumentNode::RawBlock { content, .. } => {
                if !raw_content_is_markup(content) {
                    return outcomes
                        .get(&Coordinate::Node(path.clone()))
                        .map(FragmentOutcome::is_translated)
                        .unwrap_or(false);
                }
                parse_fragment(content)
                    .iter()
                    .enumerate()
                    .any(|(index, sub_root)| {
                        path.push(index);
                        let translated = self.subtree_translated(sub_root, path, outcomes);
                        path.pop();
                        translated
                    })
            }
        }
    }

    /// 按与收集完全相同的遍历回填译文
    fn rebuild(
        &self,
        node: &DocumentNode,
        path: &mut NodePath,
        outcomes: &HashMap<Coordinate, FragmentOutcome>,
    ) -> DocumentNode {
        match node {
            DocumentNode::Element {
                name,
                attributes,
                children,
            } => {
                if self.is_ignored(node) {
                    return node.clone();
                }
                let rebuilt_children = children
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        path.push(index);
                        let rebuilt = self.rebuild(child, path, outcomes);
                        path.pop();
                        rebuilt
                    })
                    .collect();
                DocumentNode::Element {
                    name: name.clone(),
                    attributes: attributes.clone(),
                    children: rebuilt_children,
                }
            }
            DocumentNode::Text(text) => {
                if text.trim().is_empty() {
                    return node.clone();
                }
                match outcomes.get(&Coordinate::Node(path.clone())) {
                    Some(outcome) => {
                        DocumentNode::Text(with_margins_of(text, outcome.text()))
                    }
                    None => node.clone(),
                }
            }
            DocumentNode::RawBlock {
                content,
                cdata_wrapped,
            } => {
                if !raw_content_is_markup(content) {
                    return match outcomes.get(&Coordinate::Node(path.clone())) {
                        Some(outcome) if outcome.is_translated() => DocumentNode::RawBlock {
                            content: with_margins_of(content, outcome.text()),
                            cdata_wrapped: *cdata_wrapped,
                        },
                        _ => node.clone(),
                    };
                }
                let forest = parse_fragment(content);
                // 子树里一个译文都没有就保留源字节，不做任何规范化
                let any_translated = forest.iter().enumerate().any(|(index, sub_root)| {
                    path.push(index);
                    let translated = self.subtree_translated(sub_root, path, outcomes);
                    path.pop();
                    translated
                });
                if !any_translated {
                    return node.clone();
                }
                let rebuilt: Vec<DocumentNode> = forest
                    .iter()
                    .enumerate()
                    .map(|(index, sub_root)| {
                        path.push(index);
                        let node = self.rebuild(sub_root, path, outcomes);
                        path.pop();
                        node
                    })
                    .collect();
                DocumentNode::RawBlock {
                    content: serialize_fragment(&rebuilt),
                    cdata_wrapped: *cdata_wrapped,
                }
            }
        }
    }
}

/// 判断原始块内容是不是嵌入的标记子文档
///
/// 只有 `<` 后面紧跟标签起始字符（名字、`/`、`!`、`?`）才算标记。
/// 带比较运算符的普通文本（`a < b && c > d`）不能进标记解析器，
/// 否则会被拆出残缺的假元素。
fn raw_content_is_markup(content: &str) -> bool {
    let bytes = content.as_bytes();
    bytes.windows(2).any(|pair| {
        pair[0] == b'<'
            && (pair[1].is_ascii_alphabetic()
                || pair[1] == b'/'
                || pair[1] == b'!'
                || pair[1] == b'?'
                || pair[1] == b'_')
    })
}

/// 用原文本的首尾空白包住替换文本
fn with_margins_of(original: &str, replacement: &str) -> String {
    let trimmed = original.trim();
    let start = match original.find(trimmed) {
        Some(start) => start,
        None => return replacement.to_string(),
    };
    let end = start + trimmed.len();
    format!(
        "{}{}{}",
        &original[..start],
        replacement,
        &original[end..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::config::Settings;
    use crate::error::BackendError;
    use std::time::Duration;

    fn harness() -> (BatchTranslator, BackendChain) {
        let mut settings = Settings::default();
        settings.request_delay = Duration::ZERO;
        settings.retry_base_delay = Duration::ZERO;
        let translator = BatchTranslator::from_settings(&settings).unwrap();
        let chain =
            BackendChain::from_adapters(vec![Box::new(MockBackend::new("mock"))]).unwrap();
        (translator, chain)
    }

    fn failing_chain() -> BackendChain {
        BackendChain::from_adapters(vec![Box::new(MockBackend::always_failing(
            "mock",
            BackendError::Unreachable("down".into()),
        ))])
        .unwrap()
    }

    fn sample_tree() -> DocumentNode {
        DocumentNode::Element {
            name: "doc".to_string(),
            attributes: vec![("version".to_string(), "1.0".to_string())],
            children: vec![
                DocumentNode::element("title", vec![DocumentNode::text("  hello  ")]),
                DocumentNode::Element {
                    name: "code".to_string(),
                    attributes: vec![("ignore".to_string(), "TRUE".to_string())],
                    children: vec![DocumentNode::text("do not touch")],
                },
                DocumentNode::text("\n  "),
            ],
        }
    }

    #[test]
    fn translates_text_and_preserves_margins() {
        let (translator, chain) = harness();
        let engine = SubstitutionEngine::default();
        let (result, stats) = engine.translate_tree(
            &sample_tree(),
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );

        assert_eq!(stats.fragments, 1);
        assert_eq!(stats.translated, 1);
        match &result {
            DocumentNode::Element { children, .. } => match &children[0] {
                DocumentNode::Element { children, .. } => {
                    assert_eq!(children[0], DocumentNode::Text("  [zh] hello  ".to_string()));
                }
                other => panic!("expected title element, got {:?}", other),
            },
            other => panic!("expected doc element, got {:?}", other),
        }
    }

    #[test]
    fn ignored_subtree_is_untouched_and_whitespace_kept() {
        let (translator, chain) = harness();
        let engine = SubstitutionEngine::default();
        let tree = sample_tree();
        let (result, _) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );

        match (&tree, &result) {
            (
                DocumentNode::Element { children: before, .. },
                DocumentNode::Element { children: after, .. },
            ) => {
                // 忽略子树与纯空白文本逐字节不变
                assert_eq!(before[1], after[1]);
                assert_eq!(before[2], after[2]);
            }
            _ => panic!("expected elements"),
        }
    }

    #[test]
    fn structure_survives_translation() {
        let (translator, chain) = harness();
        let engine = SubstitutionEngine::default();
        let tree = sample_tree();
        let (result, _) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );

        assert_eq!(tree.node_count(), result.node_count());
        match (&tree, &result) {
            (
                DocumentNode::Element {
                    name: n1,
                    attributes: a1,
                    ..
                },
                DocumentNode::Element {
                    name: n2,
                    attributes: a2,
                    ..
                },
            ) => {
                assert_eq!(n1, n2);
                assert_eq!(a1, a2);
            }
            _ => panic!("expected elements"),
        }
    }

    #[test]
    fn all_failed_tree_round_trips_byte_identical_text() {
        let (translator, _) = harness();
        let engine = SubstitutionEngine::default();
        let tree = sample_tree();
        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &failing_chain(),
            &Glossary::empty(),
            "en",
            "zh",
        );

        assert_eq!(stats.failed, stats.fragments);
        assert_eq!(tree, result);
    }

    #[test]
    fn cdata_sub_document_is_translated_and_rewrapped() {
        let (translator, chain) = harness();
        let engine = SubstitutionEngine::default();
        let tree = DocumentNode::element(
            "entry",
            vec![DocumentNode::RawBlock {
                content: "<p>inner text</p>".to_string(),
                cdata_wrapped: true,
            }],
        );

        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.translated, 1);
        match &result {
            DocumentNode::Element { children, .. } => {
                assert_eq!(
                    children[0],
                    DocumentNode::RawBlock {
                        content: "<p>[zh] inner text</p>".to_string(),
                        cdata_wrapped: true,
                    }
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn raw_content_markup_detection() {
        assert!(raw_content_is_markup("<p>hi</p>"));
        assert!(raw_content_is_markup("text then </closer>"));
        assert!(raw_content_is_markup("<!-- comment -->"));
        assert!(raw_content_is_markup("<?pi?>"));
        assert!(!raw_content_is_markup("check that a < b && c > d holds"));
        assert!(!raw_content_is_markup("1 < 2"));
        assert!(!raw_content_is_markup("no angles at all"));
    }

    #[test]
    fn plain_text_cdata_is_one_fragment_and_fails_open() {
        let engine = SubstitutionEngine::default();
        let tree = DocumentNode::element(
            "entry",
            vec![DocumentNode::RawBlock {
                content: "check that a < b && c > d holds".to_string(),
                cdata_wrapped: true,
            }],
        );

        // 全部后端失败：整棵树与输入逐字节相同
        let (translator, _) = harness();
        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &failing_chain(),
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.fragments, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(tree, result);

        // 翻译成功：比较运算符随整块文本一起存活
        let (translator, chain) = harness();
        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.translated, 1);
        match &result {
            DocumentNode::Element { children, .. } => {
                assert_eq!(
                    children[0],
                    DocumentNode::RawBlock {
                        content: "[zh] check that a < b && c > d holds".to_string(),
                        cdata_wrapped: true,
                    }
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn untranslated_markup_raw_block_keeps_source_bytes() {
        let engine = SubstitutionEngine::default();

        // 全部失败：注释等无法建模的内容不会被规范化掉
        let (translator, _) = harness();
        let tree = DocumentNode::element(
            "entry",
            vec![DocumentNode::RawBlock {
                content: "<p>text</p><!-- note --><img src='x'/>".to_string(),
                cdata_wrapped: true,
            }],
        );
        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &failing_chain(),
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.failed, stats.fragments);
        assert_eq!(tree, result);

        // 没有可译文本的块同样保留源字节
        let (translator, chain) = harness();
        let tree = DocumentNode::element(
            "entry",
            vec![DocumentNode::RawBlock {
                content: "<hr/><br/>".to_string(),
                cdata_wrapped: false,
            }],
        );
        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.fragments, 0);
        assert_eq!(tree, result);
    }

    #[test]
    fn nested_ignore_marker_inside_raw_block_is_honored() {
        let (translator, chain) = harness();
        let engine = SubstitutionEngine::default();
        let tree = DocumentNode::element(
            "entry",
            vec![DocumentNode::RawBlock {
                content: r#"<p>translate me</p><p ignore="true">keep me</p>"#.to_string(),
                cdata_wrapped: false,
            }],
        );

        let (result, stats) = engine.translate_tree(
            &tree,
            &translator,
            &chain,
            &Glossary::empty(),
            "en",
            "zh",
        );
        assert_eq!(stats.fragments, 1);
        match &result {
            DocumentNode::Element { children, .. } => match &children[0] {
                DocumentNode::RawBlock { content, .. } => {
                    assert_eq!(
                        content,
                        r#"<p>[zh] translate me</p><p ignore="true">keep me</p>"#
                    );
                }
                other => panic!("expected raw block, got {:?}", other),
            },
            other => panic!("expected element, got {:?}", other),
        }
    }
}
