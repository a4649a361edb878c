//! 本地自托管实例探活
//!
//! 启动时对自托管 LibreTranslate 做一次有界探测。端口开着不算活：
//! 响应体必须能证明对面确实是 LibreTranslate，否则任何占用该端口
//! 的服务都会被误判。探测结果是显式值，由调用方传给链的构造，
//! 不存在隐藏的全局状态。

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::config::Settings;

/// 一次探测的结果
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// 本地实例验证通过
    pub reachable: bool,
    /// 被探测的翻译端点
    pub endpoint: String,
    /// 探测细节，仅用于日志
    pub detail: String,
}

impl ProbeOutcome {
    /// 构造一个"未探测/不可用"的结果，用于禁用自托管的配置
    pub fn unavailable(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        ProbeOutcome {
            reachable: false,
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }
}

/// 探测配置的本地实例
///
/// 对翻译端点的根地址发一次 GET，超时取 `selfhost_timeout`
/// （默认 2 秒）。整个进程只需探测一次，结果传给
/// [`crate::backend::BackendChain::from_settings`]。
pub fn probe_local_instance(settings: &Settings) -> ProbeOutcome {
    if !settings.selfhost_enabled {
        debug!("自托管探测已禁用");
        return ProbeOutcome::unavailable(settings.selfhost_url.clone(), "探测已禁用");
    }

    let base = base_url(&settings.selfhost_url);
    let client = match Client::builder().timeout(settings.selfhost_timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "探测客户端创建失败");
            return ProbeOutcome::unavailable(settings.selfhost_url.clone(), e.to_string());
        }
    };

    match client.get(base).send().and_then(|r| r.text()) {
        Ok(body) => {
            if body.to_lowercase().contains("libretranslate") {
                info!(endpoint = %settings.selfhost_url, "本地 LibreTranslate 实例验证通过");
                ProbeOutcome {
                    reachable: true,
                    endpoint: settings.selfhost_url.clone(),
                    detail: "验证通过".to_string(),
                }
            } else {
                warn!(endpoint = %settings.selfhost_url, "端口有响应但不是 LibreTranslate");
                ProbeOutcome::unavailable(
                    settings.selfhost_url.clone(),
                    "响应体未表明是 LibreTranslate",
                )
            }
        }
        Err(e) => {
            debug!(endpoint = %settings.selfhost_url, error = %e, "本地实例不可达");
            ProbeOutcome::unavailable(settings.selfhost_url.clone(), e.to_string())
        }
    }
}

/// 从翻译端点推出根地址：`http://host:port/translate` -> `http://host:port/`
fn base_url(endpoint: &str) -> String {
    endpoint
        .strip_suffix("/translate")
        .map(|s| format!("{}/", s))
        .unwrap_or_else(|| endpoint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_translate_path() {
        assert_eq!(
            base_url("http://localhost:5000/translate"),
            "http://localhost:5000/"
        );
        assert_eq!(base_url("http://localhost:5000/"), "http://localhost:5000/");
    }

    #[test]
    fn disabled_probe_reports_unavailable() {
        let mut settings = Settings::default();
        settings.selfhost_enabled = false;
        let outcome = probe_local_instance(&settings);
        assert!(!outcome.reachable);
        assert_eq!(outcome.endpoint, settings.selfhost_url);
    }
}
