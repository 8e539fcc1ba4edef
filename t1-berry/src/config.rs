//! 运行配置.
//!
//! 默认值全部来自 [`crate::consts`]. 宿主程序可以按需修改后通过
//! [`MappingConfig::validate`] 检查.

use itertools::{Itertools, MinMaxResult};

use crate::consts::{self, AcquisitionMode};
use crate::{MappingError, MappingResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 触发时间推荐区间. 见 [`crate::consts::trigger`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerWindow {
    /// 第一帧最晚时间 (ms).
    pub first_at_most: f64,

    /// 最后一帧最早时间 (ms).
    pub last_at_least: f64,
}

impl TriggerWindow {
    /// 时间标签 `labels` 是否覆盖了推荐区间. 空标签视为未覆盖.
    pub fn covers(&self, labels: &[f64]) -> bool {
        let (first, last) = min_max(labels);
        !labels.is_empty() && first <= self.first_at_most && last >= self.last_at_least
    }
}

/// 求最小值和最大值. 空切片返回 `(+inf, -inf)`.
pub(crate) fn min_max(values: &[f64]) -> (f64, f64) {
    match values.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => (f64::INFINITY, f64::NEG_INFINITY),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    }
}

/// T1 / ECV mapping 的全部可调参数.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappingConfig {
    /// 可接受的 T1 区间 (闭区间, ms).
    pub t1_range: (f64, f64),

    /// 背景抑制比例.
    pub background_fraction: f64,

    /// 空洞填充邻域边长, 必须为正奇数.
    pub fill_window: usize,

    /// ECV 计算的分母下限.
    pub epsilon: f64,

    /// 几何兼容性判断保留的小数位数.
    pub geometry_decimals: i32,

    /// Levenberg-Marquardt 最大迭代次数.
    pub max_iterations: usize,

    /// 平扫序列的触发时间推荐区间.
    pub native_trigger: TriggerWindow,

    /// 增强序列的触发时间推荐区间.
    pub enhanced_trigger: TriggerWindow,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            t1_range: (consts::T1_MIN_MS, consts::T1_MAX_MS),
            background_fraction: consts::BACKGROUND_FRACTION,
            fill_window: consts::FILL_WINDOW,
            epsilon: consts::ECV_EPSILON,
            geometry_decimals: consts::GEOMETRY_DECIMALS,
            max_iterations: consts::LM_MAX_ITERATIONS,
            native_trigger: TriggerWindow {
                first_at_most: consts::trigger::NATIVE_FIRST_AT_MOST,
                last_at_least: consts::trigger::NATIVE_LAST_AT_LEAST,
            },
            enhanced_trigger: TriggerWindow {
                first_at_most: consts::trigger::ENHANCED_FIRST_AT_MOST,
                last_at_least: consts::trigger::ENHANCED_LAST_AT_LEAST,
            },
        }
    }
}

impl MappingConfig {
    /// 获取 `mode` 对应的触发时间推荐区间.
    #[inline]
    pub fn trigger_window(&self, mode: AcquisitionMode) -> TriggerWindow {
        match mode {
            AcquisitionMode::Native => self.native_trigger,
            AcquisitionMode::Enhanced => self.enhanced_trigger,
        }
    }

    /// 检查配置是否自洽.
    pub fn validate(&self) -> MappingResult<()> {
        let (lo, hi) = self.t1_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(MappingError::InvalidConfig("T1 区间必须有限且下限小于上限"));
        }
        if !(0.0..1.0).contains(&self.background_fraction) {
            return Err(MappingError::InvalidConfig("背景抑制比例必须位于 [0, 1)"));
        }
        if self.fill_window == 0 || self.fill_window % 2 == 0 {
            return Err(MappingError::InvalidWindow(self.fill_window));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(MappingError::InvalidConfig("epsilon 必须为有限非负数"));
        }
        if !(0..=12).contains(&self.geometry_decimals) {
            return Err(MappingError::InvalidConfig("几何小数位数必须位于 [0, 12]"));
        }
        if self.max_iterations == 0 {
            return Err(MappingError::InvalidConfig("最大迭代次数不能为 0"));
        }
        Ok(())
    }
}
