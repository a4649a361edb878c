//! 翻译流水线
//!
//! `fragment` 定义批次的最小单位与坐标寻址；`batch` 负责把一批
//! 片段并发地送过后端链并保证每个片段都有归宿。

pub mod batch;
pub mod fragment;

pub use batch::{BatchStats, BatchTranslator};
pub use fragment::{Coordinate, Fragment, FragmentOutcome, NodePath};
