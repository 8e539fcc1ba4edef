//! 体素几何: 从离散索引到物理空间的仿射变换.
//!
//! 索引约定与 nifti / IJK 一致: 仿射矩阵第 0 列对应列方向 (`i`, 数组最后一维),
//! 第 1 列对应行方向 (`j`), 第 2 列对应切片方向 (`k`, 数组第一维).

use nalgebra::Vector3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维物理向量.
pub type Vec3 = [f64; 3];

/// 仿射矩阵中的索引轴.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexAxis {
    /// 列方向 (`i`).
    Col = 0,

    /// 行方向 (`j`).
    Row = 1,

    /// 切片方向 (`k`).
    Slice = 2,
}

/// 体积数据的位置与方向描述.
///
/// 不强制三个基向量正交; 几何一致性由 [`crate::align::check_geometry`] 报告.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelGeometry {
    affine: [[f64; 4]; 4],
}

impl Default for VoxelGeometry {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl VoxelGeometry {
    /// 单位变换: 原点为 0, 各方向间距为 1.
    pub const fn identity() -> Self {
        Self {
            affine: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// 由 4x4 行优先仿射矩阵直接构建.
    #[inline]
    pub const fn from_affine(affine: [[f64; 4]; 4]) -> Self {
        Self { affine }
    }

    /// 构建轴对齐的几何. `spacing` 按 `[列, 行, 切片]` 顺序给出.
    pub fn axis_aligned(origin: Vec3, spacing: [f64; 3]) -> Self {
        let mut affine = Self::identity().affine;
        for axis in 0..3 {
            affine[axis][axis] = spacing[axis];
            affine[axis][3] = origin[axis];
        }
        Self { affine }
    }

    /// 由原点和三个基向量 (按 `[列, 行, 切片]` 顺序, 含间距) 构建.
    pub fn from_basis(origin: Vec3, basis: [Vec3; 3]) -> Self {
        let mut affine = Self::identity().affine;
        for (col, v) in basis.iter().enumerate() {
            for row in 0..3 {
                affine[row][col] = v[row];
            }
        }
        for row in 0..3 {
            affine[row][3] = origin[row];
        }
        Self { affine }
    }

    /// 原始仿射矩阵.
    #[inline]
    pub fn affine(&self) -> &[[f64; 4]; 4] {
        &self.affine
    }

    /// 索引 `(0, 0, 0)` 对应的物理位置.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        [self.affine[0][3], self.affine[1][3], self.affine[2][3]]
    }

    /// 沿 `axis` 前进一个体素对应的物理位移.
    #[inline]
    pub fn basis(&self, axis: IndexAxis) -> Vec3 {
        let c = axis as usize;
        [self.affine[0][c], self.affine[1][c], self.affine[2][c]]
    }

    /// 沿 `axis` 的体素间距.
    #[inline]
    pub fn spacing(&self, axis: IndexAxis) -> f64 {
        Vector3::from(self.basis(axis)).norm()
    }

    /// 沿 `axis` 的单位方向向量. 间距为 0 时返回零向量.
    pub fn unit(&self, axis: IndexAxis) -> Vec3 {
        let v = Vector3::from(self.basis(axis));
        let s = v.norm();
        if s == 0.0 {
            return [0.0; 3];
        }
        (v / s).into()
    }

    /// 切片法向: 两个平面内单位向量的叉积, 保留 `decimals` 位小数.
    pub fn slice_normal(&self, decimals: i32) -> Vec3 {
        let n: Vec3 = self.unit_vector(IndexAxis::Col).cross(&self.unit_vector(IndexAxis::Row)).into();
        n.map(|v| round_to(v, decimals))
    }

    /// 切片间距, 保留 `decimals` 位小数.
    #[inline]
    pub fn slice_step(&self, decimals: i32) -> f64 {
        round_to(self.spacing(IndexAxis::Slice), decimals)
    }

    /// 同 [`VoxelGeometry::unit`], 以 `nalgebra` 向量返回.
    #[inline]
    pub(crate) fn unit_vector(&self, axis: IndexAxis) -> Vector3<f64> {
        Vector3::from(self.unit(axis))
    }

    /// 将 `(列, 行, 切片)` 连续索引映射到物理空间.
    pub fn to_physical(&self, [i, j, k]: [f64; 3]) -> Vec3 {
        let m = &self.affine;
        [0, 1, 2].map(|r| m[r][0] * i + m[r][1] * j + m[r][2] * k + m[r][3])
    }
}

/// 四舍五入到 `decimals` 位小数.
#[inline]
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (v * p).round() / p
}
