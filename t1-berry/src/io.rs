//! nifti 文件读取.
//!
//! nifti 数据以 `[i, j, k, t]` (列, 行, 切片, 帧) 排列, 读取后转换为 crate 内部的
//! `(切片, 行, 列, 帧)` 排列.

use std::path::Path;

use ndarray::{Ix3, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::timing::parse_frame_labels;
use crate::{MappingError, MappingResult, ScalarMap, TimeSeriesVolume, VoxelGeometry};

/// 由 nifti 头构建几何信息.
///
/// `sform_code > 0` 时直接使用 sform 仿射矩阵; 否则使用 `pixdim` 对角矩阵,
/// 原点取 `qoffset_*` (忽略四元数旋转).
pub fn geometry_from_header(header: &NiftiHeader) -> VoxelGeometry {
    if header.sform_code > 0 {
        let row = |r: [f32; 4]| r.map(f64::from);
        return VoxelGeometry::from_affine([
            row(header.srow_x),
            row(header.srow_y),
            row(header.srow_z),
            [0.0, 0.0, 0.0, 1.0],
        ]);
    }
    let p = header.pixdim;
    let spacing = [p[1], p[2], p[3]].map(|v| if v > 0.0 { f64::from(v) } else { 1.0 });
    VoxelGeometry::axis_aligned(
        [header.quatern_x, header.quatern_y, header.quatern_z].map(f64::from),
        spacing,
    )
}

/// 打开 4D Look-Locker 时间序列.
///
/// `labels` 为以逗号分隔的帧时间标签, 见 [`parse_frame_labels`].
pub fn open_series<P: AsRef<Path>>(path: P, labels: Option<&str>) -> MappingResult<TimeSeriesVolume> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let geometry = geometry_from_header(obj.header());
    let data = obj.into_volume().into_ndarray::<f32>()?;
    if data.ndim() != 4 {
        return Err(MappingError::UnsupportedDimensionality {
            expected: 4,
            actual: data.ndim(),
        });
    }

    // [i, j, k, t] -> [k, j, i, t].
    let data = data
        .permuted_axes([2, 1, 0, 3].as_slice())
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix4>()
        .map_err(|_| MappingError::UnsupportedDimensionality { expected: 4, actual: 0 })?;
    let labels = parse_frame_labels(labels, data.len_of(ndarray::Axis(3)))?;
    log::debug!("opened series {} with shape {:?}", path.as_ref().display(), data.dim());
    TimeSeriesVolume::new(data, labels, geometry)
}

/// 打开 3D 标量图 (例如已保存的 T1 图).
pub fn open_map<P: AsRef<Path>>(path: P) -> MappingResult<ScalarMap> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let geometry = geometry_from_header(obj.header());
    let data = obj.into_volume().into_ndarray::<f64>()?;
    if data.ndim() != 3 {
        return Err(MappingError::UnsupportedDimensionality {
            expected: 3,
            actual: data.ndim(),
        });
    }

    // [i, j, k] -> [k, j, i].
    let data = data
        .permuted_axes([2, 1, 0].as_slice())
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix3>()
        .map_err(|_| MappingError::UnsupportedDimensionality { expected: 3, actual: 0 })?;
    Ok(ScalarMap::new(data, geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IndexAxis;

    #[test]
    fn test_sform_geometry() {
        let mut h = NiftiHeader::default();
        h.sform_code = 1;
        h.srow_x = [0.0, -1.5, 0.0, 10.0];
        h.srow_y = [1.5, 0.0, 0.0, -20.0];
        h.srow_z = [0.0, 0.0, 8.0, 5.0];
        let g = geometry_from_header(&h);
        assert_eq!(g.origin(), [10.0, -20.0, 5.0]);
        assert_eq!(g.basis(IndexAxis::Col), [0.0, 1.5, 0.0]);
        assert_eq!(g.slice_step(3), 8.0);
        assert_eq!(g.slice_normal(3), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_pixdim_geometry() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.pixdim = [1.0, 1.25, 1.25, 6.0, 0.0, 0.0, 0.0, 0.0];
        h.quatern_x = 3.0;
        let g = geometry_from_header(&h);
        assert_eq!(g.origin(), [3.0, 0.0, 0.0]);
        assert_eq!(g.spacing(IndexAxis::Row), 1.25);
        assert_eq!(g.slice_step(3), 6.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(open_map("/nonexistent/t1.nii"), Err(MappingError::Nifti(_))));
    }
}
