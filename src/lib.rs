//! # doctran
//!
//! 结构保持的文档翻译引擎：把结构化文档里的可译文本批量送往
//! 一组可降级的翻译后端，译文替换回原位置，标记结构逐字节保持。
//!
//! ## 模块组织
//!
//! - `config` - 扁平键值对配置
//! - `error` - 错误分类体系
//! - `backend` - 后端适配器、本地实例探活与回退链
//! - `dispatch` - 节流与指数退避的重试调度器
//! - `glossary` - 术语表与大小写策略
//! - `pipeline` - 片段坐标与并发批量翻译
//! - `document` - 文档树模型、容错解析与树替换引擎
//!
//! ## 使用方式
//!
//! ```no_run
//! use std::collections::HashMap;
//! use doctran::backend::{probe_local_instance, BackendChain};
//! use doctran::config::Settings;
//! use doctran::document::SubstitutionEngine;
//! use doctran::glossary::Glossary;
//! use doctran::pipeline::BatchTranslator;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_map(&HashMap::new());
//! let probe = probe_local_instance(&settings);
//! let chain = BackendChain::from_settings(&settings, &probe)?;
//! let translator = BatchTranslator::from_settings(&settings)?;
//! let glossary = Glossary::parse("KIT;KIT;True\n");
//! let engine = SubstitutionEngine::default();
//! # let tree = doctran::document::DocumentNode::text("hello");
//! let (translated, stats) =
//!     engine.translate_tree(&tree, &translator, &chain, &glossary, "en", "zh");
//! # let _ = (translated, stats);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod glossary;
pub mod pipeline;

pub use backend::{probe_local_instance, BackendAdapter, BackendChain, ProbeOutcome};
pub use config::Settings;
pub use dispatch::Dispatcher;
pub use document::{DocumentNode, SubstitutionEngine, TreeStats};
pub use error::{BackendError, EngineError, ExhaustedError};
pub use glossary::Glossary;
pub use pipeline::{BatchTranslator, Coordinate, Fragment, FragmentOutcome};
