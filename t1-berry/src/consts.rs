//! 通用常量.

/// 无效体素 (拟合失败) 在存储边界上的哨兵值.
///
/// 内部计算一律使用 `Option<f64>`, 仅在写入 [`crate::ScalarMap`] 时转换为该值.
pub const INVALID: f64 = f64::NAN;

/// 可接受的 T1 下限, 以毫秒为单位.
pub const T1_MIN_MS: f64 = 40.0;

/// 可接受的 T1 上限, 以毫秒为单位.
pub const T1_MAX_MS: f64 = 3000.0;

/// 背景抑制比例. 体素最后一帧信号必须严格大于所在切片最大信号乘以该值才会被拟合.
pub const BACKGROUND_FRACTION: f64 = 0.1;

/// 空洞填充的默认邻域边长.
pub const FILL_WINDOW: usize = 3;

/// 误差图中, 拟合失败体素被标记成的高亮值.
pub const ERROR_MAP_VALUE: f64 = 10000.0;

/// ECV 计算时加到两幅 T1 图上的下限, 避免除零.
pub const ECV_EPSILON: f64 = 0.1;

/// ECV 的生理学范围 (百分比). 超出该范围的结果被置为 0.
pub const ECV_RANGE: (f64, f64) = (0.0, 100.0);

/// 几何兼容性判断时, 单位向量与层间距保留的小数位数.
pub const GEOMETRY_DECIMALS: i32 = 3;

/// Levenberg-Marquardt 的最大迭代次数.
pub const LM_MAX_ITERATIONS: usize = 400;

/// 初始 T1 种子表. 按生理学上的期望程度由高到低排列, 单位为毫秒.
pub mod seeds {
    /// 平扫 (native) 序列的种子.
    pub const NATIVE: [f64; 5] = [1000.0, 1500.0, 650.0, 1250.0, 500.0];

    /// 增强 (enhanced) 序列的种子.
    pub const ENHANCED: [f64; 5] = [300.0, 200.0, 250.0, 400.0, 500.0];
}

/// 触发时间 (trigger time) 推荐区间.
///
/// 若时间标签最小值大于 `*_FIRST_AT_MOST`, 或最大值小于 `*_LAST_AT_LEAST`,
/// 则认为采样区间不足以得到可靠的 T1 mapping.
pub mod trigger {
    /// 平扫序列第一帧最晚时间 (ms).
    pub const NATIVE_FIRST_AT_MOST: f64 = 150.0;

    /// 平扫序列最后一帧最早时间 (ms).
    pub const NATIVE_LAST_AT_LEAST: f64 = 2400.0;

    /// 增强序列第一帧最晚时间 (ms).
    pub const ENHANCED_FIRST_AT_MOST: f64 = 115.0;

    /// 增强序列最后一帧最早时间 (ms).
    pub const ENHANCED_LAST_AT_LEAST: f64 = 800.0;
}

/// 采集模式. 决定曲线拟合使用的种子表.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AcquisitionMode {
    /// 注射造影剂之前的平扫序列.
    Native,

    /// 注射造影剂之后的增强序列.
    Enhanced,
}

impl AcquisitionMode {
    /// 该模式对应的种子表.
    #[inline]
    pub const fn seeds(&self) -> &'static [f64] {
        match self {
            Self::Native => &seeds::NATIVE,
            Self::Enhanced => &seeds::ENHANCED,
        }
    }

    /// 是否为平扫序列.
    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    /// 是否为增强序列.
    #[inline]
    pub fn is_enhanced(&self) -> bool {
        !self.is_native()
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("Native"),
            Self::Enhanced => f.write_str("Enhanced"),
        }
    }
}
