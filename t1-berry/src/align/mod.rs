//! 平扫 / 增强 T1 图的几何配准与 ECV 计算.
//!
//! 两幅图的网格可能不同. [`VolumeAligner`] 按以下规则把它们整理到同一网格:
//!
//! 1. 形状完全一致: 直接使用, 参考网格为平扫图.
//! 2. 面内形状一致, 切片数不同: 都截断到较少的切片数, 参考网格为平扫图.
//! 3. 面内形状不同: 若增强图的行数严格大于平扫图, 则把平扫图重采样到增强图网格上
//!    (参考网格为增强图); 否则把增强图重采样到平扫图网格上 (参考网格为平扫图).
//!    两者都截断到共同的切片数.
//!
//! 几何不一致只产生 [`Warning::GeometryMismatch`], 不会中断计算.

use nalgebra::Vector3;
use ndarray::{s, Array3};

use crate::consts;
use crate::data::geometry::round_to;
use crate::data::{IndexAxis, VoxelGeometry};
use crate::warning::{GeometryReport, Warning, WarningSink};
use crate::ScalarMap;

mod ecv;
mod resample;

pub use ecv::{ecv_array, EcvParams};

use resample::{resample_volume, GridAxis};

/// 比较两幅图的切片方向, 切片间距和首层共面性. 所有量都保留 `decimals` 位小数.
pub fn check_geometry(native: &VoxelGeometry, enhanced: &VoxelGeometry, decimals: i32) -> GeometryReport {
    let enhanced_normal = enhanced
        .unit_vector(IndexAxis::Col)
        .cross(&enhanced.unit_vector(IndexAxis::Row));
    let offset = (Vector3::from(native.origin()) - Vector3::from(enhanced.origin())).dot(&enhanced_normal);
    GeometryReport {
        native_normal: native.slice_normal(decimals),
        enhanced_normal: enhanced.slice_normal(decimals),
        native_step: native.slice_step(decimals),
        enhanced_step: enhanced.slice_step(decimals),
        coplanar_offset: round_to(offset, decimals),
    }
}

/// 对齐后作为输出网格的一方.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReferenceGrid {
    /// 平扫图网格.
    Native,

    /// 增强图网格.
    Enhanced,
}

/// 实际采用的对齐方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlignCase {
    /// 形状完全一致.
    Identical,

    /// 截断到共同的切片数.
    Truncated,

    /// 面内重采样.
    Resampled,
}

/// 对齐到同一网格的两幅 T1 图.
#[derive(Clone, Debug)]
pub struct AlignedPair {
    /// 平扫 T1 图.
    pub native: ScalarMap,

    /// 增强 T1 图.
    pub enhanced: ScalarMap,

    /// 参考网格.
    pub reference: ReferenceGrid,

    /// 对齐方式.
    pub case: AlignCase,

    /// 几何对比结果.
    pub geometry: GeometryReport,
}

impl AlignedPair {
    /// 共同的形状.
    #[inline]
    pub fn shape(&self) -> crate::Idx3d {
        self.native.shape()
    }

    /// 参考网格的几何信息.
    #[inline]
    pub fn reference_geometry(&self) -> &VoxelGeometry {
        match self.reference {
            ReferenceGrid::Native => self.native.geometry(),
            ReferenceGrid::Enhanced => self.enhanced.geometry(),
        }
    }

    /// 计算 ECV 图. 输出几何信息复制自参考网格.
    pub fn ecv(&self, params: &EcvParams) -> ScalarMap {
        let data = ecv_array(self.native.data(), self.enhanced.data(), params);
        ScalarMap::new(data, *self.reference_geometry())
    }
}

/// 两幅 T1 图的配准器.
#[derive(Copy, Clone, Debug)]
pub struct VolumeAligner {
    decimals: i32,
}

impl Default for VolumeAligner {
    #[inline]
    fn default() -> Self {
        Self {
            decimals: consts::GEOMETRY_DECIMALS,
        }
    }
}

impl VolumeAligner {
    /// 几何比较保留 `decimals` 位小数.
    #[inline]
    pub fn new(decimals: i32) -> Self {
        Self { decimals }
    }

    /// 对齐两幅 T1 图. 几何不一致时向 `sink` 发送警告.
    pub fn align(&self, native: &ScalarMap, enhanced: &ScalarMap, sink: &mut dyn WarningSink) -> AlignedPair {
        let report = check_geometry(native.geometry(), enhanced.geometry(), self.decimals);
        if !report.is_compatible() {
            sink.warn(Warning::GeometryMismatch(report));
        }

        let (nz, nh, nw) = native.shape();
        let (ez, eh, ew) = enhanced.shape();
        let len_z = nz.min(ez);

        let pair = if (nz, nh, nw) == (ez, eh, ew) {
            AlignedPair {
                native: native.clone(),
                enhanced: enhanced.clone(),
                reference: ReferenceGrid::Native,
                case: AlignCase::Identical,
                geometry: report,
            }
        } else if (nh, nw) == (eh, ew) {
            AlignedPair {
                native: truncate(native, len_z),
                enhanced: truncate(enhanced, len_z),
                reference: ReferenceGrid::Native,
                case: AlignCase::Truncated,
                geometry: report,
            }
        } else {
            let (n_rows, n_cols, e_rows, e_cols) = in_plane_grids(native, enhanced);
            let (n_grid, e_grid) = ((&n_rows, &n_cols), (&e_rows, &e_cols));
            let (native, enhanced, reference) = if eh > nh {
                let geometry = *enhanced.geometry();
                let resampled = resample_volume(native.data(), n_grid, e_grid, len_z);
                (
                    ScalarMap::new(resampled, geometry),
                    truncate(enhanced, len_z),
                    ReferenceGrid::Enhanced,
                )
            } else {
                let geometry = *native.geometry();
                let resampled = resample_volume(enhanced.data(), e_grid, n_grid, len_z);
                (
                    truncate(native, len_z),
                    ScalarMap::new(resampled, geometry),
                    ReferenceGrid::Native,
                )
            };
            AlignedPair {
                native,
                enhanced,
                reference,
                case: AlignCase::Resampled,
                geometry: report,
            }
        };
        log::debug!(
            "aligned T1 maps {:?} / {:?} -> {:?} ({:?}, reference {:?})",
            (nz, nh, nw),
            (ez, eh, ew),
            pair.shape(),
            pair.case,
            pair.reference
        );
        pair
    }
}

/// 对齐并计算 ECV 图.
pub fn compute_ecv(
    native: &ScalarMap,
    enhanced: &ScalarMap,
    params: &EcvParams,
    sink: &mut dyn WarningSink,
) -> (ScalarMap, AlignedPair) {
    let pair = VolumeAligner::default().align(native, enhanced, sink);
    (pair.ecv(params), pair)
}

/// 保留前 `len_z` 个切片, 几何信息不变.
fn truncate(map: &ScalarMap, len_z: usize) -> ScalarMap {
    let data: Array3<f64> = map.data().slice(s![..len_z, .., ..]).to_owned();
    ScalarMap::new(data, *map.geometry())
}

/// 两幅图在同一面内坐标系中的网格, 依次为平扫行, 平扫列, 增强行, 增强列.
///
/// 坐标以增强图原点为零点, 平扫图网格按原点之差在其面内单位向量上的投影平移.
/// 行方向对应仿射矩阵第 1 列, 列方向对应第 0 列.
fn in_plane_grids(native: &ScalarMap, enhanced: &ScalarMap) -> (GridAxis, GridAxis, GridAxis, GridAxis) {
    let (_, nh, nw) = native.shape();
    let (_, eh, ew) = enhanced.shape();
    let (ng, eg) = (native.geometry(), enhanced.geometry());
    let shift = Vector3::from(ng.origin()) - Vector3::from(eg.origin());
    (
        GridAxis::new(shift.dot(&ng.unit_vector(IndexAxis::Row)), ng.spacing(IndexAxis::Row), nh),
        GridAxis::new(shift.dot(&ng.unit_vector(IndexAxis::Col)), ng.spacing(IndexAxis::Col), nw),
        GridAxis::new(0.0, eg.spacing(IndexAxis::Row), eh),
        GridAxis::new(0.0, eg.spacing(IndexAxis::Col), ew),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::INVALID;
    use ndarray::{array, Array3};

    fn map(shape: crate::Idx3d, value: f64, geometry: VoxelGeometry) -> ScalarMap {
        ScalarMap::filled(shape, value, geometry)
    }

    fn grid(spacing: [f64; 3]) -> VoxelGeometry {
        VoxelGeometry::axis_aligned([0.0; 3], spacing)
    }

    #[test]
    fn test_identical_shapes() {
        let n = map((2, 4, 4), 1000.0, grid([1.0; 3]));
        let e = map((2, 4, 4), 400.0, grid([1.0; 3]));
        let mut warnings = Vec::new();
        let pair = VolumeAligner::default().align(&n, &e, &mut warnings);
        assert_eq!(pair.case, AlignCase::Identical);
        assert_eq!(pair.reference, ReferenceGrid::Native);
        assert_eq!(pair.native, n);
        assert_eq!(pair.enhanced, e);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_truncate_slices() {
        for (nz, ez) in [(5, 7), (7, 5)] {
            let n = map((nz, 3, 3), 1000.0, grid([1.0; 3]));
            let e = map((ez, 3, 3), 400.0, grid([1.0; 3]));
            let pair = VolumeAligner::default().align(&n, &e, &mut Vec::new());
            assert_eq!(pair.case, AlignCase::Truncated);
            assert_eq!(pair.native.shape(), (5, 3, 3));
            assert_eq!(pair.enhanced.shape(), (5, 3, 3));
        }
    }

    #[test]
    fn test_constant_survives_resampling() {
        let n = map((3, 4, 4), 1000.0, grid([2.0, 2.0, 1.0]));
        let e = map((2, 8, 8), 400.0, grid([1.0, 1.0, 1.0]));
        let pair = VolumeAligner::default().align(&n, &e, &mut Vec::new());
        assert_eq!(pair.case, AlignCase::Resampled);
        assert_eq!(pair.reference, ReferenceGrid::Enhanced);
        assert_eq!(pair.shape(), (2, 8, 8));
        assert!(pair.native.data().iter().all(|v| (*v - 1000.0).abs() < 1e-9));
        assert_eq!(pair.reference_geometry(), e.geometry());
    }

    #[test]
    fn test_equal_rows_keep_native_grid() {
        // 行数相同而列数不同时, 增强图被重采样到平扫图网格上.
        let n = map((1, 6, 4), 1000.0, grid([2.0, 1.0, 1.0]));
        let e = map((1, 6, 8), 400.0, grid([1.0, 1.0, 1.0]));
        let pair = VolumeAligner::default().align(&n, &e, &mut Vec::new());
        assert_eq!(pair.reference, ReferenceGrid::Native);
        assert_eq!(pair.shape(), (1, 6, 4));
        assert!(pair.enhanced.data().iter().all(|v| (*v - 400.0).abs() < 1e-9));
        assert_eq!(pair.native, n);
    }

    #[test]
    fn test_in_plane_offset() {
        let n = ScalarMap::new(
            array![[[100.0, 200.0], [300.0, 400.0]]],
            VoxelGeometry::axis_aligned([2.0, 0.0, 0.0], [2.0, 2.0, 1.0]),
        );
        let e = map((1, 4, 4), 400.0, grid([1.0; 3]));
        let mut warnings = Vec::new();
        let pair = VolumeAligner::default().align(&n, &e, &mut warnings);
        assert!(warnings.is_empty());
        let r = pair.native;
        // 平扫图视野为 x ∈ [2, 6].
        assert_eq!(r[(0, 0, 0)], 0.0);
        assert_eq!(r[(0, 0, 1)], 0.0);
        assert_eq!(r[(0, 0, 2)], 100.0);
        assert!((r[(0, 0, 3)] - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_resampled_as_zero() {
        let mut data = Array3::from_elem((1, 2, 2), INVALID);
        data[(0, 0, 0)] = 100.0;
        let n = ScalarMap::new(data, grid([2.0, 2.0, 1.0]));
        let e = map((1, 4, 4), 400.0, grid([1.0; 3]));
        let pair = VolumeAligner::default().align(&n, &e, &mut Vec::new());
        assert_eq!(pair.native.count_invalid(), 0);
        assert_eq!(pair.native[(0, 0, 0)], 100.0);
        assert_eq!(pair.native[(0, 3, 3)], 0.0);
    }

    #[test]
    fn test_geometry_warning() {
        let n = map((2, 3, 3), 1000.0, VoxelGeometry::axis_aligned([0.0, 0.0, 3.0], [1.0; 3]));
        let e = map((2, 3, 3), 400.0, grid([1.0; 3]));
        let mut warnings = Vec::new();
        let pair = VolumeAligner::default().align(&n, &e, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::GeometryMismatch(r) if !r.coplanar() && r.same_step()));
        assert_eq!(pair.case, AlignCase::Identical);

        let report = check_geometry(&grid([1.0, 1.0, 8.0]), &grid([1.0, 1.0, 6.0]), 3);
        assert!(!report.same_step());
        assert!(report.same_orientation());
    }

    #[test]
    fn test_oblique_coplanar_offset() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let basis = [[s, s, 0.0], [-s, s, 0.0], [0.0, 0.0, 5.0]];
        let e = VoxelGeometry::from_basis([0.0; 3], basis);

        // 面内平移不影响共面性.
        let report = check_geometry(&VoxelGeometry::from_basis([3.0, -1.0, 0.0], basis), &e, 3);
        assert_eq!(report.coplanar_offset, 0.0);
        assert_eq!(report.native_normal, [0.0, 0.0, 1.0]);
        assert!(report.same_orientation());

        let report = check_geometry(&VoxelGeometry::from_basis([3.0, -1.0, 2.0], basis), &e, 3);
        assert_eq!(report.coplanar_offset, 2.0);
        assert!(!report.coplanar());
    }

    #[test]
    fn test_ecv_geometry_follows_reference() {
        let n = map((1, 4, 4), 1000.0, grid([2.0, 2.0, 1.0]));
        let e = map((1, 8, 8), 400.0, grid([1.0, 1.0, 1.0]));
        let (ecv, pair) = compute_ecv(&n, &e, &EcvParams::new(1000.0, 400.0, 45.0), &mut Vec::new());
        assert_eq!(pair.reference, ReferenceGrid::Enhanced);
        assert_eq!(ecv.shape(), (1, 8, 8));
        assert_eq!(ecv.geometry(), e.geometry());
        assert!(ecv.data().iter().all(|v| (*v - 54.98).abs() < 0.01));
    }
}
