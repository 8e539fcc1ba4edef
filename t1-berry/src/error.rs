//! 运行时错误.
//!
//! 只有输入不满足前置条件时才会产生错误. 单个体素的拟合失败、无法填充的空洞、
//! 几何不一致等情况都不是错误, 见 [`crate::warning`].

use thiserror::Error;

/// T1 / ECV mapping 的前置条件错误.
#[derive(Debug, Error)]
pub enum MappingError {
    /// 时间标签数量与帧数不一致.
    #[error("时间标签数量 ({labels}) 与帧数 ({frames}) 不一致")]
    LabelCountMismatch {
        /// 时间标签数量.
        labels: usize,
        /// 帧数.
        frames: usize,
    },

    /// 单个体素的信号长度与时间标签数量不一致.
    #[error("信号长度 ({signal}) 与时间标签数量 ({labels}) 不一致")]
    SignalLengthMismatch {
        /// 信号长度.
        signal: usize,
        /// 时间标签数量.
        labels: usize,
    },

    /// 数据体为空.
    #[error("数据体为空")]
    EmptyVolume,

    /// 邻域窗口不是正奇数.
    #[error("邻域窗口必须为正奇数, 实际为 {0}")]
    InvalidWindow(usize),

    /// 帧标签无法解析为浮点数.
    #[error("无法解析第 {index} 个帧标签 `{raw}`")]
    InvalidFrameLabel {
        /// 标签下标.
        index: usize,
        /// 原始文本.
        raw: String,
    },

    /// 配置项不合法.
    #[error("配置不合法: {0}")]
    InvalidConfig(&'static str),

    /// 任务被调用者取消. 参数为取消时已完成的切片数.
    #[error("映射任务在完成 {0} 个切片后被取消")]
    Cancelled(usize),

    /// 两个体数据的形状不一致.
    #[error("形状不一致: 期望 {expected:?}, 实际为 {actual:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: crate::Idx3d,
        /// 实际形状.
        actual: crate::Idx3d,
    },

    /// 读取 nifti 文件错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// nifti 数据维度不符合预期.
    #[error("期望 {expected} 维数据, 实际为 {actual} 维")]
    UnsupportedDimensionality {
        /// 期望维度.
        expected: usize,
        /// 实际维度.
        actual: usize,
    },
}

/// 映射运行时结果.
pub type MappingResult<T> = Result<T, MappingError>;
