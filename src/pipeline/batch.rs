//! 并发批量翻译
//!
//! 固定大小的工作线程池，每个线程取一个片段、阻塞式地走完
//! 后端链。批次过小时线程开销不划算，低于阈值直接在调用线程
//! 顺序处理。
//!
//! 两条硬性保证：
//! - 返回映射的键集合与输入片段的坐标集合完全一致；
//! - 单个片段失败只降级该片段（结果为原文），批次总会完成。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::backend::{BackendChain, TranslationRequest};
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, EngineResult, ExhaustedError};
use crate::glossary::Glossary;
use crate::pipeline::fragment::{Coordinate, Fragment, FragmentOutcome};

/// 一个批次的汇总统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    pub total: usize,
    pub translated: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn from_outcomes(outcomes: &HashMap<Coordinate, FragmentOutcome>) -> Self {
        let translated = outcomes.values().filter(|o| o.is_translated()).count();
        BatchStats {
            total: outcomes.len(),
            translated,
            failed: outcomes.len() - translated,
        }
    }
}

/// 批量翻译器
pub struct BatchTranslator {
    pool: rayon::ThreadPool,
    dispatcher: Dispatcher,
    sequential_threshold: usize,
    progress_interval: usize,
}

impl BatchTranslator {
    pub fn from_settings(settings: &Settings) -> EngineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.worker_count.max(1))
            .thread_name(|i| format!("doctran-worker-{}", i))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
        Ok(BatchTranslator {
            pool,
            dispatcher: Dispatcher::from_settings(settings),
            sequential_threshold: settings.sequential_threshold,
            progress_interval: settings.progress_interval.max(1),
        })
    }

    /// 翻译一批片段
    ///
    /// 阻塞到每个片段都有结果才返回。词汇表只作用于成功的译文，
    /// 失败片段保持与输入逐字节相同。
    pub fn translate_batch(
        &self,
        fragments: Vec<Fragment>,
        chain: &BackendChain,
        glossary: &Glossary,
        source_lang: &str,
        target_lang: &str,
    ) -> HashMap<Coordinate, FragmentOutcome> {
        let total = fragments.len();
        if total == 0 {
            return HashMap::new();
        }

        if total < self.sequential_threshold {
            debug!(total, "批次低于并发阈值，走顺序路径");
            return fragments
                .into_iter()
                .map(|f| {
                    let outcome =
                        self.translate_one(&f, chain, glossary, source_lang, target_lang);
                    (f.coordinate, outcome)
                })
                .collect();
        }

        info!(total, workers = self.pool.current_num_threads(), "开始并发批量翻译");
        let results: DashMap<Coordinate, FragmentOutcome> = DashMap::with_capacity(total);
        let done = AtomicUsize::new(0);

        self.pool.install(|| {
            fragments.par_iter().for_each(|fragment| {
                let outcome =
                    self.translate_one(fragment, chain, glossary, source_lang, target_lang);
                results.insert(fragment.coordinate.clone(), outcome);

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % self.progress_interval == 0 || finished == total {
                    info!(finished, total, "批量翻译进度");
                }
            });
        });

        results.into_iter().collect()
    }

    fn translate_one(
        &self,
        fragment: &Fragment,
        chain: &BackendChain,
        glossary: &Glossary,
        source_lang: &str,
        target_lang: &str,
    ) -> FragmentOutcome {
        // 空白片段不该进到这里；防御性地原样返回
        let request = match TranslationRequest::new(
            fragment.text.clone(),
            source_lang,
            target_lang,
        ) {
            Ok(request) => request,
            Err(_) => {
                debug!("空白片段跳过翻译");
                return FragmentOutcome::Failed {
                    original: fragment.text.clone(),
                    error: ExhaustedError { failures: vec![] },
                };
            }
        };

        match chain.translate(&self.dispatcher, &request) {
            Ok(success) => FragmentOutcome::Translated {
                text: glossary.apply(&success.text),
                backend: success.backend,
                attempts: success.attempts,
            },
            Err(err) => {
                warn!(error = %err, "片段翻译失败，保留原文");
                FragmentOutcome::Failed {
                    original: fragment.text.clone(),
                    error: err,
                }
            }
        }
    }
}
