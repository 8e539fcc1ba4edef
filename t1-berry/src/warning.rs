//! 非致命的质量警告.
//!
//! 警告是单向通知, 不会中断计算. 宿主程序通过实现 [`WarningSink`] 接收它们.

use std::fmt;

use crate::consts::AcquisitionMode;
use crate::data::Vec3;

/// 两幅 T1 图的几何对比结果.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeometryReport {
    /// 平扫图的切片法向 (已取整).
    pub native_normal: Vec3,

    /// 增强图的切片法向 (已取整).
    pub enhanced_normal: Vec3,

    /// 平扫图的切片间距 (已取整).
    pub native_step: f64,

    /// 增强图的切片间距 (已取整).
    pub enhanced_step: f64,

    /// 两幅图原点之差在增强图切片法向上的投影 (已取整). 为 0 表示首层共面.
    pub coplanar_offset: f64,
}

impl GeometryReport {
    /// 切片方向一致.
    #[inline]
    pub fn same_orientation(&self) -> bool {
        self.native_normal == self.enhanced_normal
    }

    /// 切片间距一致.
    #[inline]
    pub fn same_step(&self) -> bool {
        self.native_step == self.enhanced_step
    }

    /// 首层切片共面.
    #[inline]
    pub fn coplanar(&self) -> bool {
        self.coplanar_offset == 0.0
    }

    /// 三个条件是否同时满足.
    #[inline]
    pub fn is_compatible(&self) -> bool {
        self.same_orientation() && self.same_step() && self.coplanar()
    }
}

/// 质量警告.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// 平扫与增强图的几何不一致, ECV 图质量可能下降.
    GeometryMismatch(GeometryReport),

    /// 时间标签没有覆盖推荐的触发时间区间.
    TriggerWindow {
        /// 采集模式.
        mode: AcquisitionMode,
        /// 第一帧时间.
        first: f64,
        /// 最后一帧时间.
        last: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::GeometryMismatch(r) => write!(
                f,
                "geometry of native and enhanced volumes does not match \
                 (normals {:?} / {:?}, steps {} / {}, offset {}); the ECV map may deteriorate",
                r.native_normal, r.enhanced_normal, r.native_step, r.enhanced_step, r.coplanar_offset
            ),
            Warning::TriggerWindow { mode, first, last } => write!(
                f,
                "{mode} trigger time interval [{first}, {last}] ms is not the recommended one \
                 for a good T1 mapping"
            ),
        }
    }
}

/// 警告接收端.
pub trait WarningSink {
    /// 接收一条警告. 实现不应阻塞.
    fn warn(&mut self, warning: Warning);
}

/// 收集所有警告, 便于测试和事后检查.
impl WarningSink for Vec<Warning> {
    #[inline]
    fn warn(&mut self, warning: Warning) {
        self.push(warning);
    }
}

/// 将警告转发到 `log::warn!`.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    #[inline]
    fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
    }
}

/// 丢弃所有警告.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl WarningSink for NullSink {
    #[inline]
    fn warn(&mut self, _warning: Warning) {}
}
