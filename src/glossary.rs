//! 词汇表
//!
//! 术语强制替换：翻译完成后对译文做一次整词、大小写不敏感的
//! 扫描，把命中的术语替换为配置的目标形式。规则来自
//! `source;target;keep_case` 格式的行（原样对应 glossary.csv）。
//!
//! 替换是幂等的：目标形式自身也会命中同一条规则并替换为自身，
//! 因此重复应用不会改变结果。

use regex::Regex;
use tracing::{debug, warn};

use crate::error::GlossaryRuleError;

/// 一条术语规则
#[derive(Debug, Clone)]
pub struct GlossaryRule {
    pub source: String,
    pub target: String,
    /// true 时按命中文本的大小写形态调整目标casing
    pub keep_case: bool,
    matcher: Regex,
}

impl GlossaryRule {
    fn compile(
        source: &str,
        target: &str,
        keep_case: bool,
    ) -> Result<Self, regex::Error> {
        // 整词 + 大小写不敏感
        let pattern = format!(r"(?i)\b{}\b", regex::escape(source));
        Ok(GlossaryRule {
            source: source.to_string(),
            target: target.to_string(),
            keep_case,
            matcher: Regex::new(&pattern)?,
        })
    }

    /// 按大小写策略计算命中处的替换文本
    ///
    /// `keep_case=false`：始终使用目标的规范形式。
    /// `keep_case=true`：全大写命中 -> 目标转全大写；首字母大写的
    /// 命中且目标为全小写 -> 目标首字母大写；其余情况用目标原形。
    fn replacement(&self, matched: &str) -> String {
        if !self.keep_case {
            return self.target.clone();
        }
        if is_all_caps(matched) {
            return self.target.to_uppercase();
        }
        if is_title_case(matched) && is_all_lowercase(&self.target) {
            return capitalize(&self.target);
        }
        self.target.clone()
    }
}

/// 已解析并编译的规则集
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    rules: Vec<GlossaryRule>,
}

impl Glossary {
    /// 空词汇表，`apply` 退化为恒等变换
    pub fn empty() -> Self {
        Glossary::default()
    }

    /// 从 `source;target;keep_case` 行解析
    ///
    /// 空行、`#` 注释行与表头行被忽略；损坏的行记录警告后跳过，
    /// 从不让整个词汇表加载失败。keep_case 省略时视为 false。
    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        let mut first_content_line = true;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split(';').map(str::trim).collect();
            // 表头只可能是第一个有内容的行，前面的注释与空行不算
            let is_header = first_content_line
                && fields.first().map(|f| f.eq_ignore_ascii_case("source")) == Some(true);
            first_content_line = false;
            if is_header {
                continue;
            }

            match parse_fields(&fields, line_no) {
                Ok((source, target, keep_case)) => {
                    match GlossaryRule::compile(source, target, keep_case) {
                        Ok(rule) => rules.push(rule),
                        Err(e) => warn!(
                            line = line_no,
                            error = %e,
                            "术语规则编译失败，已跳过"
                        ),
                    }
                }
                Err(err) => warn!(error = %err, "已跳过损坏的术语规则行"),
            }
        }

        debug!(rules = rules.len(), "词汇表加载完成");
        Glossary { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[GlossaryRule] {
        &self.rules
    }

    /// 对一段文本做一次替换扫描
    ///
    /// 从左到右单趟扫描：每个位置取最早的命中，并列时按规则行序
    /// 取先者；替换完成后从替换文本之后继续，不会对替换结果再次
    /// 匹配。
    pub fn apply(&self, text: &str) -> String {
        if self.rules.is_empty() || text.is_empty() {
            return text.to_string();
        }

        let mut output = String::with_capacity(text.len());
        let mut pos = 0;

        while pos < text.len() {
            let mut best: Option<(usize, usize, &GlossaryRule)> = None;
            for rule in &self.rules {
                if let Some(m) = rule.matcher.find_at(text, pos) {
                    let replace = match best {
                        None => true,
                        // 规则顺序靠前者已占住同一起点
                        Some((start, _, _)) => m.start() < start,
                    };
                    if replace {
                        best = Some((m.start(), m.end(), rule));
                    }
                }
            }

            match best {
                Some((start, end, rule)) => {
                    output.push_str(&text[pos..start]);
                    output.push_str(&rule.replacement(&text[start..end]));
                    pos = end;
                }
                None => {
                    output.push_str(&text[pos..]);
                    break;
                }
            }
        }

        output
    }
}

fn parse_fields<'a>(
    fields: &[&'a str],
    line_no: usize,
) -> Result<(&'a str, &'a str, bool), GlossaryRuleError> {
    if fields.len() < 2 {
        return Err(GlossaryRuleError {
            line: line_no,
            reason: "至少需要 source;target 两列".to_string(),
        });
    }
    let source = fields[0];
    let target = fields[1];
    if source.is_empty() || target.is_empty() {
        return Err(GlossaryRuleError {
            line: line_no,
            reason: "source 与 target 不能为空".to_string(),
        });
    }
    let keep_case = match fields.get(2) {
        None => false,
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            other => {
                return Err(GlossaryRuleError {
                    line: line_no,
                    reason: format!("keep_case 值无法解析: {}", other),
                });
            }
        },
    };
    Ok((source, target, keep_case))
}

fn is_all_caps(s: &str) -> bool {
    let mut saw_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            saw_alpha = true;
            if !c.is_uppercase() {
                return false;
            }
        }
    }
    saw_alpha
}

fn is_all_lowercase(s: &str) -> bool {
    s.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_lowercase())
}

fn is_title_case(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            chars.filter(|c| c.is_alphabetic()).all(|c| c.is_lowercase())
        }
        _ => false,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
