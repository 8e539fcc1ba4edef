//! 合成 Look-Locker 时间序列, 用于测试和消融实验.
//!
//! 每个切片中心有一个圆盘状组织区域, 其余为 0 信号背景.

use ndarray::Array4;

use crate::fitting::RecoveryParams;
use crate::{Idx3d, MappingResult, TimeSeriesVolume, VoxelGeometry};

/// 默认帧时间标签 (ms). 覆盖平扫与增强序列的推荐触发时间区间.
pub const DEFAULT_LABELS: [f64; 11] = [
    100.0, 200.0, 400.0, 600.0, 800.0, 1000.0, 1300.0, 1600.0, 2000.0, 2500.0, 3000.0,
];

/// 默认组织参数, 对应 T1 = 500 ms.
pub const DEFAULT_TISSUE: RecoveryParams = RecoveryParams {
    a: 800.0,
    b: 1600.0,
    ts: 500.0,
    c: 0.0,
};

/// 在 `labels` 上采样恢复曲线.
pub fn recovery_curve(params: &RecoveryParams, labels: &[f64]) -> Vec<f64> {
    labels.iter().map(|&t| params.eval(t)).collect()
}

/// 合成时间序列构建器.
#[derive(Clone, Debug)]
pub struct PhantomBuilder {
    shape: Idx3d,
    labels: Vec<f64>,
    tissue: RecoveryParams,
    radius: f64,
    ripple: f64,
    geometry: VoxelGeometry,
}

impl PhantomBuilder {
    /// 空间形状为 `(切片, 行, 列)`. 默认整个切片都是组织.
    pub fn new(shape: Idx3d) -> Self {
        Self {
            shape,
            labels: DEFAULT_LABELS.to_vec(),
            tissue: DEFAULT_TISSUE,
            radius: f64::INFINITY,
            ripple: 0.0,
            geometry: VoxelGeometry::identity(),
        }
    }

    /// 帧时间标签.
    pub fn labels(mut self, labels: Vec<f64>) -> Self {
        self.labels = labels;
        self
    }

    /// 组织区域的模型参数.
    pub fn tissue(mut self, tissue: RecoveryParams) -> Self {
        self.tissue = tissue;
        self
    }

    /// 组织圆盘半径 (体素). 到切片中心距离严格小于该值的体素为组织.
    pub fn disk_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// 在组织信号上叠加幅度为 `amplitude` 的确定性扰动.
    pub fn ripple(mut self, amplitude: f64) -> Self {
        self.ripple = amplitude;
        self
    }

    /// 几何信息.
    pub fn geometry(mut self, geometry: VoxelGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// 位置 `(h, w)` 是否位于组织圆盘内.
    pub fn is_tissue(&self, (h, w): (usize, usize)) -> bool {
        let (_, rows, cols) = self.shape;
        let dy = h as f64 - (rows as f64 - 1.0) / 2.0;
        let dx = w as f64 - (cols as f64 - 1.0) / 2.0;
        dy.hypot(dx) < self.radius
    }

    /// 构建时间序列.
    pub fn build(&self) -> MappingResult<TimeSeriesVolume> {
        let (z, h, w) = self.shape;
        let curve = recovery_curve(&self.tissue, &self.labels);
        let data = Array4::from_shape_fn((z, h, w, self.labels.len()), |(k, i, j, f)| {
            if !self.is_tissue((i, j)) {
                return 0.0;
            }
            let phase = (k * 31 + i * 17 + j * 7 + f * 3) as f64;
            (curve[f] + self.ripple * phase.sin()) as f32
        });
        TimeSeriesVolume::new(data, self.labels.clone(), self.geometry)
    }
}
