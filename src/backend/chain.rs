//! 后端链
//!
//! 按配置顺序持有一组后端，翻译时逐个经由调度器尝试，第一个
//! 成功即返回。验证通过的本地实例被提升到链首（有效优先级 0），
//! 把公共实例留作回退。全部失败时返回汇总错误，由调用方以原文
//! 回退。

use tracing::{info, warn};

use crate::backend::google_web::{self, GoogleWebBackend};
use crate::backend::libre::{self, LibreBackend};
use crate::backend::mymemory::{self, MyMemoryBackend};
use crate::backend::probe::ProbeOutcome;
use crate::backend::{BackendAdapter, BackendDescriptor, TranslationRequest};
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, EngineResult, ExhaustedError};

/// 链上一次成功翻译的结果
#[derive(Debug, Clone)]
pub struct ChainSuccess {
    pub text: String,
    /// 给出译文的后端名
    pub backend: String,
    /// 该后端上实际发出的调用次数
    pub attempts: u32,
}

struct ChainEntry {
    descriptor: BackendDescriptor,
    adapter: Box<dyn BackendAdapter>,
}

pub struct BackendChain {
    entries: Vec<ChainEntry>,
    local_promoted: bool,
}

impl BackendChain {
    /// 按配置与探测结果构建后端链
    ///
    /// 未知的后端名记录警告后跳过；一个可识别的后端都没有时
    /// 返回错误。本地实例验证通过时取代配置里的 LibreTranslate
    /// 条目并占据链首。
    pub fn from_settings(settings: &Settings, probe: &ProbeOutcome) -> EngineResult<Self> {
        let mut entries = Vec::new();

        if probe.reachable {
            entries.push(ChainEntry {
                descriptor: BackendDescriptor {
                    name: "libretranslate".to_string(),
                    priority_rank: 0,
                    endpoint: probe.endpoint.clone(),
                    api_key: settings.backend_api_key("libretranslate").map(String::from),
                    estimated_throughput: 50.0,
                },
                adapter: Box::new(LibreBackend::new(
                    probe.endpoint.clone(),
                    settings.backend_api_key("libretranslate").map(String::from),
                )),
            });
        }

        for name in &settings.backend_order {
            if probe.reachable && name == "libretranslate" {
                // 本地实例已经占了这个名字的位置
                continue;
            }
            match build_adapter(name, settings) {
                Some((adapter, endpoint, api_key, throughput)) => {
                    entries.push(ChainEntry {
                        descriptor: BackendDescriptor {
                            name: name.clone(),
                            priority_rank: entries.len(),
                            endpoint,
                            api_key,
                            estimated_throughput: throughput,
                        },
                        adapter,
                    });
                }
                None => warn!(backend = %name, "未知的后端名，已跳过"),
            }
        }

        if entries.is_empty() {
            return Err(EngineError::NoBackends(settings.backend_order.join(",")));
        }

        for entry in &entries {
            info!(
                backend = %entry.descriptor.name,
                rank = entry.descriptor.priority_rank,
                endpoint = %entry.descriptor.endpoint,
                throughput = entry.descriptor.estimated_throughput,
                "后端已注册"
            );
        }

        Ok(BackendChain {
            entries,
            local_promoted: probe.reachable,
        })
    }

    /// 直接由适配器列表构建，测试用
    pub fn from_adapters(adapters: Vec<Box<dyn BackendAdapter>>) -> EngineResult<Self> {
        if adapters.is_empty() {
            return Err(EngineError::NoBackends(String::new()));
        }
        let entries = adapters
            .into_iter()
            .enumerate()
            .map(|(rank, adapter)| ChainEntry {
                descriptor: BackendDescriptor {
                    name: adapter.name().to_string(),
                    priority_rank: rank,
                    endpoint: String::new(),
                    api_key: None,
                    estimated_throughput: 0.0,
                },
                adapter,
            })
            .collect();
        Ok(BackendChain {
            entries,
            local_promoted: false,
        })
    }

    /// 本地实例是否被提升到链首
    pub fn local_promoted(&self) -> bool {
        self.local_promoted
    }

    /// 链首后端名
    pub fn primary_backend(&self) -> Option<&str> {
        self.entries.first().map(|e| e.descriptor.name.as_str())
    }

    /// 有效尝试顺序下的后端名
    pub fn effective_order(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.as_str())
            .collect()
    }

    /// 沿链翻译一段文本
    ///
    /// 每个后端交给调度器做节流与重试；成功立即短路返回，
    /// 全部耗尽时汇总每个后端的最后一次错误。
    pub fn translate(
        &self,
        dispatcher: &Dispatcher,
        request: &TranslationRequest,
    ) -> Result<ChainSuccess, ExhaustedError> {
        let mut failures = Vec::new();

        for entry in &self.entries {
            match dispatcher.dispatch(entry.adapter.as_ref(), request) {
                Ok(dispatched) => {
                    return Ok(ChainSuccess {
                        text: dispatched.text,
                        backend: entry.descriptor.name.clone(),
                        attempts: dispatched.attempts,
                    });
                }
                Err(err) => {
                    warn!(backend = %entry.descriptor.name, error = %err, "后端耗尽，切换下一个");
                    failures.push((entry.descriptor.name.clone(), err));
                }
            }
        }

        Err(ExhaustedError { failures })
    }
}

fn build_adapter(
    name: &str,
    settings: &Settings,
) -> Option<(Box<dyn BackendAdapter>, String, Option<String>, f64)> {
    match name {
        "libretranslate" => {
            let endpoint = settings
                .backend_url(name)
                .unwrap_or(libre::DEFAULT_URL)
                .to_string();
            let api_key = settings.backend_api_key(name).map(String::from);
            Some((
                Box::new(LibreBackend::new(endpoint.clone(), api_key.clone())),
                endpoint,
                api_key,
                10.0,
            ))
        }
        "google_web" => {
            let endpoint = settings
                .backend_url(name)
                .unwrap_or(google_web::DEFAULT_URL)
                .to_string();
            Some((
                Box::new(GoogleWebBackend::new(endpoint.clone())),
                endpoint,
                None,
                15.0,
            ))
        }
        "mymemory" => {
            let endpoint = settings
                .backend_url(name)
                .unwrap_or(mymemory::DEFAULT_URL)
                .to_string();
            Some((
                Box::new(MyMemoryBackend::new(endpoint.clone())),
                endpoint,
                None,
                8.0,
            ))
        }
        _ => None,
    }
}
