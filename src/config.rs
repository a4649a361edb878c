//! 引擎配置
//!
//! 引擎不负责读取配置文件。宿主程序把扁平的键值对交给
//! [`Settings::from_map`]，无效值记录警告后回退到默认值，
//! 配置问题永远不会让翻译流程中断。

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

/// 默认后端顺序
pub const DEFAULT_BACKEND_ORDER: &str = "libretranslate,google_web,mymemory";

/// 本地自托管实例的默认地址
pub const DEFAULT_SELFHOST_URL: &str = "http://localhost:5000/translate";

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct Settings {
    /// 后端尝试顺序（逗号分隔的后端名，已拆分）
    pub backend_order: Vec<String>,
    /// 每次后端调用前的固定间隔
    pub request_delay: Duration,
    /// 单个后端的最大尝试次数
    pub max_retries: u32,
    /// 指数退避的基础等待时间
    pub retry_base_delay: Duration,
    /// 批量翻译的工作线程数
    pub worker_count: usize,
    /// 低于该数量的批次走顺序路径
    pub sequential_threshold: usize,
    /// 每翻译多少个片段输出一次进度日志
    pub progress_interval: usize,
    /// 是否探测本地自托管实例
    pub selfhost_enabled: bool,
    /// 本地自托管实例地址
    pub selfhost_url: String,
    /// 探测请求的超时
    pub selfhost_timeout: Duration,
    /// 原始键值对，用于查询各后端的 URL 与 API key
    raw: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            backend_order: DEFAULT_BACKEND_ORDER
                .split(',')
                .map(str::to_string)
                .collect(),
            request_delay: Duration::from_millis(5),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(20),
            worker_count: 6,
            sequential_threshold: 2,
            progress_interval: 10,
            selfhost_enabled: true,
            selfhost_url: DEFAULT_SELFHOST_URL.to_string(),
            selfhost_timeout: Duration::from_millis(2000),
            raw: HashMap::new(),
        }
    }
}

impl Settings {
    /// 从扁平键值对构建配置
    ///
    /// 识别的键：`backend_order`、`request_delay_ms`、`max_retries`、
    /// `retry_base_delay_ms`、`worker_count`、`sequential_threshold`、
    /// `progress_interval`、`selfhost_enabled`、`selfhost_url`、
    /// `selfhost_timeout_ms`，以及每个后端的 `<name>_url` 与
    /// `<name>_api_key`。无法解析的值记录警告并使用默认值。
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut settings = Settings::default();

        if let Some(order) = map.get("backend_order") {
            let names: Vec<String> = order
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if names.is_empty() {
                warn!("backend_order 为空，使用默认顺序 {}", DEFAULT_BACKEND_ORDER);
            } else {
                settings.backend_order = names;
            }
        }

        settings.request_delay =
            Duration::from_millis(parse_or(map, "request_delay_ms", 5));
        settings.max_retries = parse_or(map, "max_retries", 3u64) as u32;
        settings.retry_base_delay =
            Duration::from_millis(parse_or(map, "retry_base_delay_ms", 20));
        settings.worker_count = parse_or(map, "worker_count", 6u64) as usize;
        settings.sequential_threshold =
            parse_or(map, "sequential_threshold", 2u64) as usize;
        settings.progress_interval =
            parse_or(map, "progress_interval", 10u64) as usize;
        settings.selfhost_timeout =
            Duration::from_millis(parse_or(map, "selfhost_timeout_ms", 2000));

        if let Some(value) = map.get("selfhost_enabled") {
            match parse_bool(value) {
                Some(flag) => settings.selfhost_enabled = flag,
                None => warn!(value = %value, "selfhost_enabled 无法解析，保持默认值 true"),
            }
        }
        if let Some(url) = map.get("selfhost_url") {
            if url.trim().is_empty() {
                warn!("selfhost_url 为空，使用默认地址 {}", DEFAULT_SELFHOST_URL);
            } else {
                settings.selfhost_url = url.trim().to_string();
            }
        }

        settings.raw = map.clone();
        settings
    }

    /// 查询某个后端配置的 URL
    pub fn backend_url(&self, name: &str) -> Option<&str> {
        self.raw
            .get(&format!("{}_url", name))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// 查询某个后端配置的 API key
    pub fn backend_api_key(&self, name: &str) -> Option<&str> {
        self.raw
            .get(&format!("{}_api_key", name))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// 解析数值键，失败时记录警告并返回默认值
fn parse_or(map: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    match map.get(key) {
        None => default,
        Some(value) => match value.trim().parse::<u64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(key = key, value = %value, default = default, "配置值无法解析，使用默认值");
                default
            }
        },
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_tuned_values() {
        let settings = Settings::default();
        assert_eq!(settings.request_delay, Duration::from_millis(5));
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.retry_base_delay, Duration::from_millis(20));
        assert_eq!(settings.worker_count, 6);
        assert_eq!(settings.sequential_threshold, 2);
        assert_eq!(settings.progress_interval, 10);
        assert!(settings.selfhost_enabled);
        assert_eq!(settings.selfhost_url, DEFAULT_SELFHOST_URL);
        assert_eq!(settings.selfhost_timeout, Duration::from_millis(2000));
        assert_eq!(
            settings.backend_order,
            vec!["libretranslate", "google_web", "mymemory"]
        );
    }

    #[test]
    fn overrides_are_honored() {
        let settings = Settings::from_map(&map(&[
            ("backend_order", "mymemory, libretranslate"),
            ("request_delay_ms", "0"),
            ("max_retries", "5"),
            ("worker_count", "2"),
            ("selfhost_enabled", "false"),
        ]));
        assert_eq!(settings.backend_order, vec!["mymemory", "libretranslate"]);
        assert_eq!(settings.request_delay, Duration::ZERO);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.worker_count, 2);
        assert!(!settings.selfhost_enabled);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let settings = Settings::from_map(&map(&[
            ("max_retries", "many"),
            ("request_delay_ms", "-3"),
            ("selfhost_enabled", "maybe"),
            ("backend_order", " , "),
        ]));
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.request_delay, Duration::from_millis(5));
        assert!(settings.selfhost_enabled);
        assert_eq!(
            settings.backend_order,
            vec!["libretranslate", "google_web", "mymemory"]
        );
    }

    #[test]
    fn backend_url_and_key_lookup() {
        let settings = Settings::from_map(&map(&[
            ("libretranslate_url", "https://libre.example/translate"),
            ("libretranslate_api_key", "secret"),
            ("mymemory_url", "   "),
        ]));
        assert_eq!(
            settings.backend_url("libretranslate"),
            Some("https://libre.example/translate")
        );
        assert_eq!(settings.backend_api_key("libretranslate"), Some("secret"));
        assert_eq!(settings.backend_url("mymemory"), None);
        assert_eq!(settings.backend_api_key("google_web"), None);
    }
}
