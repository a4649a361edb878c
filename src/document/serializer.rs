//! 片段序列化
//!
//! 把节点森林写回标记文本。属性保持存储顺序、统一双引号；文本
//! 做最小转义（`&`、`<`、`>`），已保留的实体引用不二次转义；
//! CDATA 原样输出；HTML 空元素不写闭合标签。

use crate::document::DocumentNode;

/// 无子节点也照 HTML 约定省略闭合标签的元素
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

/// 把节点森林序列化为标记文本
pub fn serialize_fragment(nodes: &[DocumentNode]) -> String {
    let mut output = String::new();
    for node in nodes {
        write_node(&mut output, node);
    }
    output
}

fn write_node(output: &mut String, node: &DocumentNode) {
    match node {
        DocumentNode::Element {
            name,
            attributes,
            children,
        } => {
            output.push('<');
            output.push_str(name);
            for (key, value) in attributes {
                output.push(' ');
                output.push_str(key);
                output.push_str("=\"");
                output.push_str(&escape_attribute(value));
                output.push('"');
            }
            if children.is_empty() {
                if is_void_element(name) {
                    output.push('>');
                } else {
                    output.push_str("/>");
                }
                return;
            }
            output.push('>');
            for child in children {
                write_node(output, child);
            }
            output.push_str("</");
            output.push_str(name);
            output.push('>');
        }
        DocumentNode::Text(text) => {
            output.push_str(&escape_text(text));
        }
        DocumentNode::RawBlock {
            content,
            cdata_wrapped,
        } => {
            if *cdata_wrapped {
                output.push_str("<![CDATA[");
                output.push_str(content);
                output.push_str("]]>");
            } else {
                // 实体转义约定：标记以转义形式写回文本
                output.push_str(&escape_text(content));
            }
        }
    }
}

fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| name.eq_ignore_ascii_case(v))
}

/// 最小文本转义，保留已存在的实体引用
fn escape_text(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    for (pos, c) in text.char_indices() {
        if pos < i {
            continue;
        }
        match c {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '&' => {
                if let Some(len) = entity_reference_len(&bytes[pos..]) {
                    output.push_str(&text[pos..pos + len]);
                    i = pos + len;
                    continue;
                }
                output.push_str("&amp;");
            }
            other => output.push(other),
        }
        i = pos + c.len_utf8();
    }
    output
}

fn escape_attribute(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            other => output.push(other),
        }
    }
    output
}

/// `&` 处如果紧跟一个完整的实体引用，返回其字节长度
fn entity_reference_len(bytes: &[u8]) -> Option<usize> {
    debug_assert_eq!(bytes.first(), Some(&b'&'));
    let body = &bytes[1..];
    let mut end = None;
    for (i, b) in body.iter().enumerate().take(11) {
        if *b == b';' {
            end = Some(i);
            break;
        }
    }
    let semi = end?;
    if semi == 0 {
        return None;
    }
    let name = &body[..semi];
    let valid = if name[0] == b'#' {
        if name.len() > 2 && (name[1] == b'x' || name[1] == b'X') {
            name[2..].iter().all(u8::is_ascii_hexdigit)
        } else {
            name.len() > 1 && name[1..].iter().all(u8::is_ascii_digit)
        }
    } else {
        name[0].is_ascii_alphabetic()
            && name.iter().all(|b| b.is_ascii_alphanumeric())
    };
    if valid {
        Some(semi + 2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parser::parse_fragment;

    #[test]
    fn attributes_keep_order_and_double_quotes() {
        let node = DocumentNode::Element {
            name: "a".to_string(),
            attributes: vec![
                ("href".to_string(), "x?a=1&b=2".to_string()),
                ("title".to_string(), "say \"hi\"".to_string()),
            ],
            children: vec![DocumentNode::Text("go".to_string())],
        };
        assert_eq!(
            serialize_fragment(&[node]),
            r#"<a href="x?a=1&amp;b=2" title="say &quot;hi&quot;">go</a>"#
        );
    }

    #[test]
    fn childless_elements_self_close_except_void_names() {
        let empty = DocumentNode::element("note", vec![]);
        assert_eq!(serialize_fragment(&[empty]), "<note/>");
        let void = DocumentNode::element("br", vec![]);
        assert_eq!(serialize_fragment(&[void]), "<br>");
    }

    #[test]
    fn text_escaping_is_minimal_and_keeps_entities() {
        let text = DocumentNode::Text("a < b & 'quoted' &nbsp; done".to_string());
        assert_eq!(
            serialize_fragment(&[text]),
            "a &lt; b &amp; 'quoted' &nbsp; done"
        );
    }

    #[test]
    fn cdata_content_is_never_escaped() {
        let block = DocumentNode::RawBlock {
            content: "<b>if (a < b && c > d)</b>".to_string(),
            cdata_wrapped: true,
        };
        assert_eq!(
            serialize_fragment(&[block]),
            "<![CDATA[<b>if (a < b && c > d)</b>]]>"
        );
    }

    #[test]
    fn escaped_raw_block_round_trips_its_convention() {
        let input = "<desc>&lt;b&gt;bold&lt;/b&gt;</desc>";
        let forest = parse_fragment(input);
        assert_eq!(serialize_fragment(&forest), input);
    }

    #[test]
    fn cdata_raw_block_round_trips_its_convention() {
        let input = "<desc><![CDATA[<b>bold</b>]]></desc>";
        let forest = parse_fragment(input);
        assert_eq!(serialize_fragment(&forest), input);
    }

    #[test]
    fn plain_markup_round_trips() {
        let input = r#"<p class="x">hello <b>world</b> &amp; more</p>"#;
        let forest = parse_fragment(input);
        assert_eq!(serialize_fragment(&forest), input);
    }
}
