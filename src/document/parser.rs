//! 容错片段解析
//!
//! 解析原始块里嵌入的标记子文档。真实文档里的这类片段常年
//! 残缺：多余的闭合标签、没闭合的元素、私有实体。恢复路径只有
//! 一条：游离的闭合标签忽略，未闭合的元素在输入结尾自动闭合，
//! 语法彻底坏掉时剩余输入整段按文本保留。绝不因为内容不规范
//! 而丢内容。

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::document::DocumentNode;

/// 未闭合的元素栈帧
struct OpenElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<DocumentNode>,
}

/// 把一段标记解析成节点森林
///
/// 片段可以有多个根。注释、声明与处理指令不进入树模型。
pub fn parse_fragment(input: &str) -> Vec<DocumentNode> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;

    // 栈底帧收集森林的根节点
    let mut stack = vec![OpenElement {
        name: String::new(),
        attributes: Vec::new(),
        children: Vec::new(),
    }];
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                flush_text(&mut text_buf, &mut stack);
                stack.push(OpenElement {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    attributes: read_attributes(&e),
                    children: Vec::new(),
                });
            }
            Ok(Event::Empty(e)) => {
                flush_text(&mut text_buf, &mut stack);
                let element = DocumentNode::Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    attributes: read_attributes(&e),
                    children: Vec::new(),
                };
                append(&mut stack, element);
            }
            Ok(Event::End(_)) => {
                flush_text(&mut text_buf, &mut stack);
                if stack.len() > 1 {
                    close_top(&mut stack);
                }
                // 游离的闭合标签直接忽略
            }
            Ok(Event::Text(t)) => {
                text_buf.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Ok(Event::GeneralRef(r)) => {
                let name = String::from_utf8_lossy(r.as_ref()).into_owned();
                match resolve_entity(&name) {
                    Some(resolved) => text_buf.push_str(&resolved),
                    None => {
                        // 私有实体原样保留
                        text_buf.push('&');
                        text_buf.push_str(&name);
                        text_buf.push(';');
                    }
                }
            }
            Ok(Event::CData(t)) => {
                flush_text(&mut text_buf, &mut stack);
                append(
                    &mut stack,
                    DocumentNode::RawBlock {
                        content: String::from_utf8_lossy(t.as_ref()).into_owned(),
                        cdata_wrapped: true,
                    },
                );
            }
            Ok(Event::Comment(_)) | Ok(Event::Decl(_)) | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) => {
                flush_text(&mut text_buf, &mut stack);
            }
            Ok(Event::Eof) => {
                flush_text(&mut text_buf, &mut stack);
                // 未闭合的元素在输入结尾自动闭合
                while stack.len() > 1 {
                    debug!(element = %stack.last().map(|f| f.name.clone()).unwrap_or_default(), "自动闭合未结束的元素");
                    close_top(&mut stack);
                }
                break;
            }
            Err(e) => {
                let pos = reader.buffer_position() as usize;
                warn!(error = %e, position = pos, "标记语法损坏，剩余输入按文本保留");
                flush_text(&mut text_buf, &mut stack);
                if pos < input.len() {
                    text_buf.push_str(&input[pos..]);
                    flush_text(&mut text_buf, &mut stack);
                }
                while stack.len() > 1 {
                    close_top(&mut stack);
                }
                break;
            }
        }
    }

    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn flush_text(text_buf: &mut String, stack: &mut Vec<OpenElement>) {
    if text_buf.is_empty() {
        return;
    }
    let content = std::mem::take(text_buf);
    // 解码后仍含标记的文本是实体转义的嵌入子文档
    let node = if content.contains('<') && content.contains('>') {
        DocumentNode::RawBlock {
            content,
            cdata_wrapped: false,
        }
    } else {
        DocumentNode::Text(content)
    };
    append(stack, node);
}

fn append(stack: &mut [OpenElement], node: DocumentNode) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn close_top(stack: &mut Vec<OpenElement>) {
    if let Some(frame) = stack.pop() {
        append(
            stack,
            DocumentNode::Element {
                name: frame.name,
                attributes: frame.attributes,
                children: frame.children,
            },
        );
    }
}

fn read_attributes(e: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            (key, decode_entities(&raw))
        })
        .collect()
}

/// 解码五个标准实体与数字字符引用，未知实体原样保留
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) if semi > 0 && semi <= 10 => {
                let name = &after[..semi];
                match resolve_entity(name) {
                    Some(resolved) => output.push_str(&resolved),
                    None => {
                        output.push('&');
                        output.push_str(name);
                        output.push(';');
                    }
                }
                rest = &after[semi + 1..];
            }
            _ => {
                output.push('&');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            return char::from_u32(code).map(|c| c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#') {
        if let Ok(code) = dec.parse::<u32>() {
            return char::from_u32(code).map(|c| c.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_attributes() {
        let forest = parse_fragment(r#"<p class="intro">hello <b>world</b></p>"#);
        assert_eq!(forest.len(), 1);
        match &forest[0] {
            DocumentNode::Element {
                name,
                attributes,
                children,
            } => {
                assert_eq!(name, "p");
                assert_eq!(attributes, &vec![("class".to_string(), "intro".to_string())]);
                assert_eq!(children.len(), 2);
                assert_eq!(children[0], DocumentNode::Text("hello ".to_string()));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn multiple_roots_form_a_forest() {
        let forest = parse_fragment("<a>x</a><b>y</b>trailing");
        assert_eq!(forest.len(), 3);
        assert_eq!(forest[2], DocumentNode::Text("trailing".to_string()));
    }

    #[test]
    fn stray_end_tag_is_ignored() {
        let forest = parse_fragment("<p>text</span></p>");
        assert_eq!(forest.len(), 1);
        match &forest[0] {
            DocumentNode::Element { name, children, .. } => {
                // </span> 弹出了 <p>，后续游离的 </p> 被忽略
                assert_eq!(name, "p");
                assert_eq!(children.len(), 1);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_element_is_auto_closed_at_eof() {
        let forest = parse_fragment("<div><p>dangling");
        assert_eq!(forest.len(), 1);
        match &forest[0] {
            DocumentNode::Element { name, children, .. } => {
                assert_eq!(name, "div");
                match &children[0] {
                    DocumentNode::Element { name, children, .. } => {
                        assert_eq!(name, "p");
                        assert_eq!(children[0], DocumentNode::Text("dangling".to_string()));
                    }
                    other => panic!("expected p, got {:?}", other),
                }
            }
            other => panic!("expected div, got {:?}", other),
        }
    }

    #[test]
    fn cdata_becomes_wrapped_raw_block() {
        let forest = parse_fragment("<desc><![CDATA[<b>bold</b>]]></desc>");
        match &forest[0] {
            DocumentNode::Element { children, .. } => {
                assert_eq!(
                    children[0],
                    DocumentNode::RawBlock {
                        content: "<b>bold</b>".to_string(),
                        cdata_wrapped: true,
                    }
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn escaped_markup_in_text_becomes_unwrapped_raw_block() {
        let forest = parse_fragment("<desc>&lt;b&gt;bold&lt;/b&gt;</desc>");
        match &forest[0] {
            DocumentNode::Element { children, .. } => {
                assert_eq!(
                    children[0],
                    DocumentNode::RawBlock {
                        content: "<b>bold</b>".to_string(),
                        cdata_wrapped: false,
                    }
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn standard_entities_are_decoded_in_plain_text() {
        let forest = parse_fragment("<p>fish &amp; chips &gt; salad</p>");
        match &forest[0] {
            DocumentNode::Element { children, .. } => {
                assert_eq!(
                    children[0],
                    DocumentNode::Text("fish & chips > salad".to_string())
                );
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn unknown_entities_survive_literally() {
        let forest = parse_fragment("<p>a&nbsp;b</p>");
        match &forest[0] {
            DocumentNode::Element { children, .. } => {
                assert_eq!(children[0], DocumentNode::Text("a&nbsp;b".to_string()));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn decode_entities_handles_numeric_refs() {
        assert_eq!(decode_entities("&#60;tag&#62;"), "<tag>");
        assert_eq!(decode_entities("&#x3C;x&#x3E;"), "<x>");
        assert_eq!(decode_entities("a &amp;&amp; b"), "a && b");
        assert_eq!(decode_entities("bare & ampersand"), "bare & ampersand");
    }

    #[test]
    fn whitespace_only_text_is_preserved() {
        let forest = parse_fragment("<a>x</a>\n  <b>y</b>");
        assert_eq!(forest.len(), 3);
        assert_eq!(forest[1], DocumentNode::Text("\n  ".to_string()));
    }
}
