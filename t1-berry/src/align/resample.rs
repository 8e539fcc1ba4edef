//! 面内双线性重采样.
//!
//! 两个网格都放在同一个二维物理坐标系中: 第 `n` 个体素中心位于
//! `offset + n * spacing + spacing / 2`. 源网格视野之外的采样点取 0;
//! 视野之内、最外层体素中心之外的采样点取最近边缘值.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::data::is_invalid;

/// 一维规则网格.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct GridAxis {
    /// 网格起点 (第 0 个体素的外边缘).
    pub offset: f64,
    pub spacing: f64,
    pub len: usize,
}

impl GridAxis {
    #[inline]
    pub fn new(offset: f64, spacing: f64, len: usize) -> Self {
        Self {
            offset,
            spacing,
            len,
        }
    }

    /// 第 `n` 个体素中心.
    #[inline]
    pub fn centre(&self, n: usize) -> f64 {
        self.offset + n as f64 * self.spacing + self.spacing / 2.0
    }

    /// 定位物理坐标 `x`, 返回 `(左侧下标, 右侧下标, 插值权重)`. 位于视野之外时返回 `None`.
    pub fn locate(&self, x: f64) -> Option<(usize, usize, f64)> {
        if self.len == 0 || !(self.spacing > 0.0) {
            return None;
        }
        let end = self.offset + self.len as f64 * self.spacing;
        if !(x >= self.offset && x <= end) {
            return None;
        }
        let last = (self.len - 1) as f64;
        let u = ((x - self.offset) / self.spacing - 0.5).clamp(0.0, last);
        let i0 = u.floor() as usize;
        let i1 = (i0 + 1).min(self.len - 1);
        Some((i0, i1, u - i0 as f64))
    }
}

/// 在 `(rows, cols)` 网格上对切片 `src` 做双线性插值. 哨兵值按 0 处理.
pub(crate) fn sample(src: ArrayView2<f64>, rows: &GridAxis, cols: &GridAxis, (y, x): (f64, f64)) -> f64 {
    let (Some((r0, r1, fy)), Some((c0, c1, fx))) = (rows.locate(y), cols.locate(x)) else {
        return 0.0;
    };
    let at = |r: usize, c: usize| {
        let v = src[(r, c)];
        if is_invalid(v) { 0.0 } else { v }
    };
    let top = at(r0, c0) * (1.0 - fx) + at(r0, c1) * fx;
    let bottom = at(r1, c0) * (1.0 - fx) + at(r1, c1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// 将切片 `src` 从源网格重采样到目标网格.
pub(crate) fn resample_slice(
    src: ArrayView2<f64>,
    (src_rows, src_cols): (&GridAxis, &GridAxis),
    (dst_rows, dst_cols): (&GridAxis, &GridAxis),
) -> Array2<f64> {
    Array2::from_shape_fn((dst_rows.len, dst_cols.len), |(r, c)| {
        sample(src, src_rows, src_cols, (dst_rows.centre(r), dst_cols.centre(c)))
    })
}

/// 逐切片重采样, 只保留前 `len_z` 个切片.
pub(crate) fn resample_volume(
    src: ArrayView3<f64>,
    src_grid: (&GridAxis, &GridAxis),
    dst_grid: (&GridAxis, &GridAxis),
    len_z: usize,
) -> Array3<f64> {
    let mut out = Array3::zeros((len_z, dst_grid.0.len, dst_grid.1.len));
    for (s, mut d) in src.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        d.assign(&resample_slice(s, src_grid, dst_grid));
    }
    out
}
