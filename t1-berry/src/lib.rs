#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从心脏 MRI Look-Locker 序列计算定量 T1 图和细胞外容积 (ECV) 图.
//!
//! 该 crate 只提供 `safe` 接口, 不依赖任何宿主程序的全局状态:
//! 几何信息, 时间标签和数据体都以参数形式显式传入.
//!
//! # 注意
//!
//! 1. 单个体素的拟合失败不是错误. crate 内部以 `Option<f64>` 表示,
//!   仅在写入 [`ScalarMap`] 时转换为哨兵值 [`consts::INVALID`].
//! 2. 只有输入不满足前置条件时才返回 [`MappingError`].
//!   几何不一致等质量问题通过 [`warning::WarningSink`] 通知调用者.
//!
//! # 开发计划
//!
//! ### 多种子 T1 曲线拟合 ✅
//!
//! 模型 `|A - B exp(-t / Ts)| + c`, Levenberg-Marquardt 求解, 按种子表依次回退.
//!
//! 实现位于 `t1-berry/src/fitting`.
//!
//! ### 按切片并行的 T1 mapping ✅
//!
//! 背景抑制, 进度回调与取消. 串行与并行结果逐位一致.
//!
//! 实现位于 `t1-berry/src/fitting/mapper.rs`.
//!
//! ### 空洞填充与误差图 ✅
//!
//! 实现位于 `t1-berry/src/filter`.
//!
//! ### 几何检查, 面内重采样与 ECV ✅
//!
//! 实现位于 `t1-berry/src/align`.
//!
//! ### 时间标签, 触发时间区间检查 ✅
//!
//! 实现位于 `t1-berry/src/timing.rs`.
//!
//! ### 分割统计与血池参考值 ✅
//!
//! 实现位于 `t1-berry/src/stats.rs`.
//!
//! ### nifti 读取 ✅
//!
//! 实现位于 `t1-berry/src/io.rs`.
//!
//! ### 种子回退策略的消融实验 ✅
//!
//! 实现位于 `ablations/fallback`.
//!
//! ### 穿层 (through-plane) 插值 ⌛️
//!
//! 切片数不同时目前只做截断.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 时间序列与标量图基础数据结构.
mod data;

pub use data::{geometry, is_invalid, load_estimate, store_estimate, ScalarMap, TimeSeriesVolume, VoxelGeometry};

pub mod consts;

pub mod config;

mod error;

pub use error::{MappingError, MappingResult};

pub mod warning;

pub mod fitting;

pub mod filter;

pub mod align;

pub mod timing;

pub mod stats;

pub mod phantom;

pub mod pipeline;

pub mod io;

pub mod prelude;
