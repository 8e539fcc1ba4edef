use std::ops::{Index, IndexMut};

use ndarray::{
    Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut2, ArrayViewMut3,
    Axis,
};

use crate::consts::INVALID;
use crate::{Idx3d, MappingError, MappingResult};

pub mod geometry;

pub use geometry::{IndexAxis, Vec3, VoxelGeometry};

/// 单个体素的估计值转换为存储值. `None` 对应哨兵值 [`INVALID`].
#[inline]
pub fn store_estimate(v: Option<f64>) -> f64 {
    v.unwrap_or(INVALID)
}

/// 存储值转换为单个体素的估计值. 哨兵值对应 `None`.
#[inline]
pub fn load_estimate(v: f64) -> Option<f64> {
    (!is_invalid(v)).then_some(v)
}

/// 存储值是否为哨兵值.
#[inline]
pub fn is_invalid(v: f64) -> bool {
    v.is_nan()
}

/// Look-Locker 时间序列, 包括 4D 信号强度、每帧时间标签和几何信息.
///
/// 信号以 `(切片, 行, 列, 帧)` 组织, 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct TimeSeriesVolume {
    data: Array4<f32>,
    labels: Vec<f64>,
    geometry: VoxelGeometry,
}

impl TimeSeriesVolume {
    /// 构建时间序列.
    ///
    /// 如果数据为空, 或 `labels` 长度与帧数不一致, 则返回 `Err`.
    pub fn new(data: Array4<f32>, labels: Vec<f64>, geometry: VoxelGeometry) -> MappingResult<Self> {
        if data.is_empty() {
            return Err(MappingError::EmptyVolume);
        }
        let frames = data.len_of(Axis(3));
        if labels.len() != frames {
            return Err(MappingError::LabelCountMismatch {
                labels: labels.len(),
                frames,
            });
        }
        Ok(Self {
            data,
            labels,
            geometry,
        })
    }

    /// 空间形状 `(切片, 行, 列)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let (z, h, w, _) = self.data.dim();
        (z, h, w)
    }

    /// 帧数.
    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// 每帧的采集时间标签.
    #[inline]
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// 几何信息.
    #[inline]
    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 获取体素 `pos` 的信号序列.
    ///
    /// 当 `pos` 越界时 panic.
    #[inline]
    pub fn signal_at(&self, (z, h, w): Idx3d) -> ArrayView1<'_, f32> {
        self.data.slice(ndarray::s![z, h, w, ..])
    }

    /// 获取第 `z_index` 个切片的 `(行, 列, 帧)` 视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代所有切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView3<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }
}

/// 3D 标量图, 例如 T1 图 (ms) 或 ECV 图 (%).
///
/// 拟合失败的体素以哨兵值 [`INVALID`] 保存.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMap {
    data: Array3<f64>,
    geometry: VoxelGeometry,
}

impl Index<Idx3d> for ScalarMap {
    type Output = f64;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for ScalarMap {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl ScalarMap {
    /// 直接由数据和几何信息构建.
    #[inline]
    pub fn new(data: Array3<f64>, geometry: VoxelGeometry) -> Self {
        Self { data, geometry }
    }

    /// 构建一个全部为 `value` 的标量图.
    #[inline]
    pub fn filled(shape: Idx3d, value: f64, geometry: VoxelGeometry) -> Self {
        Self::new(Array3::from_elem(shape, value), geometry)
    }

    /// 形状 `(切片, 行, 列)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 几何信息.
    #[inline]
    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// 替换几何信息.
    #[inline]
    pub fn set_geometry(&mut self, geometry: VoxelGeometry) {
        self.geometry = geometry;
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f64> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, f64> {
        self.data.view_mut()
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array3<f64> {
        self.data
    }

    /// 获取体素 `pos` 的估计值. 哨兵值返回 `None`.
    ///
    /// 当 `pos` 越界时 panic.
    #[inline]
    pub fn estimate_at(&self, pos: Idx3d) -> Option<f64> {
        load_estimate(self.data[pos])
    }

    /// 写入体素 `pos` 的估计值.
    ///
    /// 当 `pos` 越界时 panic.
    #[inline]
    pub fn set_estimate(&mut self, pos: Idx3d, v: Option<f64>) {
        self.data[pos] = store_estimate(v);
    }

    /// 哨兵值体素个数.
    #[inline]
    pub fn count_invalid(&self) -> usize {
        self.data.iter().filter(|v| is_invalid(**v)).count()
    }

    /// 哨兵值体素的位置, 按行优先排列.
    pub fn invalid_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, v)| is_invalid(*v).then_some(pos))
            .collect()
    }

    /// 获取第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取第 `z_index` 层可变切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> ArrayViewMut2<'_, f64> {
        self.data.index_axis_mut(Axis(0), z_index)
    }

    /// 获取能按升序迭代切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, f64>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获取能按升序迭代可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = ArrayViewMut2<'_, f64>> {
        self.data.axis_iter_mut(Axis(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_series_label_mismatch() {
        let data = Array4::<f32>::zeros((1, 2, 2, 4));
        let e = TimeSeriesVolume::new(data, vec![0.0; 3], VoxelGeometry::identity()).unwrap_err();
        assert!(matches!(e, MappingError::LabelCountMismatch { labels: 3, frames: 4 }));
    }

    #[test]
    fn test_series_empty() {
        let data = Array4::<f32>::zeros((0, 2, 2, 4));
        let e = TimeSeriesVolume::new(data, vec![0.0; 4], VoxelGeometry::identity()).unwrap_err();
        assert!(matches!(e, MappingError::EmptyVolume));
    }

    #[test]
    fn test_series_access() {
        let data = Array4::<f32>::from_shape_fn((2, 3, 4, 5), |(z, h, w, f)| {
            (z * 1000 + h * 100 + w * 10 + f) as f32
        });
        let s = TimeSeriesVolume::new(data, vec![1.0; 5], VoxelGeometry::identity()).unwrap();
        assert_eq!(s.shape(), (2, 3, 4));
        assert_eq!(s.frames(), 5);
        assert_eq!(s.signal_at((1, 2, 3)).to_vec(), vec![1230.0, 1231.0, 1232.0, 1233.0, 1234.0]);
        assert_eq!(s.slice_at(1).dim(), (3, 4, 5));
        assert_eq!(s.slice_iter().len(), 2);
    }

    #[test]
    fn test_sentinel_boundary() {
        assert!(load_estimate(store_estimate(None)).is_none());
        assert_eq!(load_estimate(store_estimate(Some(512.0))), Some(512.0));

        let mut m = ScalarMap::filled((1, 2, 2), 0.0, VoxelGeometry::identity());
        m.set_estimate((0, 1, 1), None);
        assert_eq!(m.count_invalid(), 1);
        assert_eq!(m.invalid_pos(), vec![(0, 1, 1)]);
        assert_eq!(m.estimate_at((0, 0, 0)), Some(0.0));
    }
}
