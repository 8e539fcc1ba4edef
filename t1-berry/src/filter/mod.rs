//! 空洞填充: 用邻域统计量修复拟合失败的体素.
//!
//! 每个切片独立处理. 邻域始终读取填充前的快照, 因此同一轮内的填充结果不会相互传播.

use ndarray::{ArrayView2, ArrayViewMut2, ArrayViewMut3, Axis};
use ordered_float::OrderedFloat;

use crate::consts;
use crate::data::is_invalid;
use crate::{MappingError, MappingResult, ScalarMap};

/// 填充值的来源.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FillValue {
    /// 邻域内有效值的中位数.
    Median,

    /// 固定值. 仅当邻域内至少存在一个有效值时才会写入.
    Fixed(f64),
}

/// 一次填充的统计信息.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    /// 被填充的体素数.
    pub filled: usize,

    /// 填充后仍为哨兵值的体素数 (包括边界体素).
    pub residual: usize,
}

impl FillReport {
    #[inline]
    fn merge(self, other: Self) -> Self {
        Self {
            filled: self.filled + other.filled,
            residual: self.residual + other.residual,
        }
    }
}

/// 邻域空洞填充器.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GapFiller {
    dim: usize,
    fill: FillValue,
}

impl Default for GapFiller {
    #[inline]
    fn default() -> Self {
        Self {
            dim: consts::FILL_WINDOW,
            fill: FillValue::Median,
        }
    }
}

impl GapFiller {
    /// 以邻域边长 `dim` 和中位数填充构建. `dim` 必须为正奇数, 否则返回 `Err`.
    pub fn new(dim: usize) -> MappingResult<Self> {
        if dim == 0 || dim % 2 == 0 {
            return Err(MappingError::InvalidWindow(dim));
        }
        Ok(Self {
            dim,
            fill: FillValue::Median,
        })
    }

    /// 生成误差图用的填充器: 可填充的哨兵体素被标记为 [`consts::ERROR_MAP_VALUE`].
    #[inline]
    pub fn error_map(dim: usize) -> MappingResult<Self> {
        Ok(Self::new(dim)?.with_fill(FillValue::Fixed(consts::ERROR_MAP_VALUE)))
    }

    /// 修改填充值来源.
    #[inline]
    pub fn with_fill(mut self, fill: FillValue) -> Self {
        self.fill = fill;
        self
    }

    /// 邻域边长.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// 填充值来源.
    #[inline]
    pub fn fill(&self) -> FillValue {
        self.fill
    }

    /// 原地填充 `map`.
    #[inline]
    pub fn apply(&self, map: &mut ScalarMap) -> FillReport {
        self.apply_array(map.data_mut())
    }

    /// 返回填充后的副本, `map` 保持不变.
    #[inline]
    pub fn applied(&self, map: &ScalarMap) -> (ScalarMap, FillReport) {
        let mut out = map.clone();
        let report = self.apply(&mut out);
        (out, report)
    }

    /// 填充单个切片.
    pub fn fill_slice(&self, mut slice: ArrayViewMut2<f64>) -> FillReport {
        let snapshot = slice.to_owned();
        let (h, w) = snapshot.dim();
        let r = self.dim / 2;
        let mut filled = 0;
        let mut buf = Vec::with_capacity(self.dim * self.dim);

        if h > 2 * r && w > 2 * r {
            for i in r..h - r {
                for j in r..w - r {
                    if !is_invalid(snapshot[(i, j)]) {
                        continue;
                    }
                    if let Some(v) = self.neighbourhood_value(snapshot.view(), (i, j), &mut buf) {
                        slice[(i, j)] = v;
                        filled += 1;
                    }
                }
            }
        }

        let residual = slice.iter().filter(|v| is_invalid(**v)).count();
        FillReport { filled, residual }
    }

    /// 邻域 (含中心) 中有效值的统计量. 没有有效值时返回 `None`.
    fn neighbourhood_value(
        &self,
        src: ArrayView2<f64>,
        (i, j): (usize, usize),
        buf: &mut Vec<f64>,
    ) -> Option<f64> {
        let r = self.dim / 2;
        buf.clear();
        buf.extend(
            src.slice(ndarray::s![i - r..=i + r, j - r..=j + r])
                .iter()
                .copied()
                .filter(|v| !is_invalid(*v)),
        );
        if buf.is_empty() {
            return None;
        }
        match self.fill {
            FillValue::Median => median(buf),
            FillValue::Fixed(v) => Some(v),
        }
    }
}

/// 中位数. 元素个数为偶数时取中间两个值的平均值. 空输入返回 `None`.
///
/// `values` 会被原地排序. 调用者保证其中不含 NaN.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable_by_key(|v| OrderedFloat(*v));
    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        impl GapFiller {
            /// 原地填充 `(切片, 行, 列)` 数组. 借助 `rayon` 按切片并行.
            pub fn apply_array(&self, mut data: ArrayViewMut3<f64>) -> FillReport {
                let report = data
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .map(|s| self.fill_slice(s))
                    .reduce(FillReport::default, FillReport::merge);
                log::debug!("gap filling: {} filled, {} residual", report.filled, report.residual);
                report
            }
        }
    } else {
        impl GapFiller {
            /// 原地填充 `(切片, 行, 列)` 数组.
            pub fn apply_array(&self, mut data: ArrayViewMut3<f64>) -> FillReport {
                let report = data
                    .axis_iter_mut(Axis(0))
                    .map(|s| self.fill_slice(s))
                    .fold(FillReport::default(), FillReport::merge);
                log::debug!("gap filling: {} filled, {} residual", report.filled, report.residual);
                report
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::INVALID;
    use crate::VoxelGeometry;
    use ndarray::{array, Array3};

    fn map_of(slice: ndarray::Array2<f64>) -> ScalarMap {
        let (h, w) = slice.dim();
        let data = slice.into_shape((1, h, w)).unwrap();
        ScalarMap::new(data, VoxelGeometry::identity())
    }

    #[test]
    fn test_window_must_be_odd() {
        assert!(matches!(GapFiller::new(0), Err(MappingError::InvalidWindow(0))));
        assert!(matches!(GapFiller::new(4), Err(MappingError::InvalidWindow(4))));
        assert_eq!(GapFiller::new(5).unwrap().dim(), 5);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [-1.0, 7.0]), Some(3.0));
    }

    #[test]
    fn test_single_hole_median() {
        let mut m = map_of(array![
            [1.0, 2.0, 3.0],
            [4.0, INVALID, 6.0],
            [7.0, 8.0, 9.0],
        ]);
        let report = GapFiller::default().apply(&mut m);
        // 有效邻居 1, 2, 3, 4, 6, 7, 8, 9 的中位数.
        assert_eq!(m[(0, 1, 1)], 5.0);
        assert_eq!(report, FillReport { filled: 1, residual: 0 });
    }

    #[test]
    fn test_edges_untouched() {
        let mut m = map_of(array![
            [INVALID, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, INVALID],
        ]);
        let report = GapFiller::default().apply(&mut m);
        assert!(is_invalid(m[(0, 0, 0)]));
        assert!(is_invalid(m[(0, 2, 2)]));
        assert_eq!(report, FillReport { filled: 0, residual: 2 });
    }

    #[test]
    fn test_all_invalid_neighbourhood_stays_invalid() {
        let mut m = ScalarMap::filled((1, 3, 3), INVALID, VoxelGeometry::identity());
        let report = GapFiller::default().apply(&mut m);
        assert_eq!(m.count_invalid(), 9);
        assert_eq!(report.filled, 0);

        let mut m = ScalarMap::filled((1, 3, 3), INVALID, VoxelGeometry::identity());
        GapFiller::error_map(3).unwrap().apply(&mut m);
        assert_eq!(m.count_invalid(), 9);
    }

    #[test]
    fn test_no_cascade() {
        // 两个相邻空洞, 右侧空洞的邻域只能看到快照中的有效值.
        let mut m = map_of(array![
            [1.0, 1.0, 1.0, 9.0],
            [1.0, INVALID, INVALID, 9.0],
            [1.0, 1.0, 1.0, 9.0],
        ]);
        GapFiller::default().apply(&mut m);
        assert_eq!(m[(0, 1, 1)], 1.0);
        // 邻居 1, 1, 1, 1, 9, 9, 9 (左侧空洞仍视为无效).
        assert_eq!(m[(0, 1, 2)], 1.0);

        let mut m = map_of(array![
            [9.0, 9.0, 1.0, 1.0],
            [9.0, INVALID, INVALID, 1.0],
            [9.0, 9.0, 1.0, 1.0],
        ]);
        GapFiller::default().apply(&mut m);
        // 邻居 9, 9, 1, 9, 9, 9, 1: 中位数 9.
        assert_eq!(m[(0, 1, 1)], 9.0);
        // 邻居 9, 1, 1, 1, 9, 1, 1: 中位数 1.
        assert_eq!(m[(0, 1, 2)], 1.0);
    }

    #[test]
    fn test_valid_voxels_unchanged() {
        let data = Array3::from_shape_fn((2, 5, 5), |(z, h, w)| {
            if (h + w + z) % 4 == 0 { INVALID } else { (z * 100 + h * 10 + w) as f64 }
        });
        let before = ScalarMap::new(data, VoxelGeometry::identity());
        let (after, _) = GapFiller::default().applied(&before);
        for (a, b) in before.data().iter().zip(after.data().iter()) {
            if !is_invalid(*a) {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_error_map() {
        let mut m = map_of(array![
            [1.0, 2.0, 3.0],
            [4.0, INVALID, 6.0],
            [7.0, 8.0, 9.0],
        ]);
        GapFiller::error_map(3).unwrap().apply(&mut m);
        assert_eq!(m[(0, 1, 1)], consts::ERROR_MAP_VALUE);
    }

    #[test]
    fn test_slices_are_independent() {
        let mut data = Array3::from_elem((2, 3, 3), 50.0);
        data[(0, 1, 1)] = INVALID;
        data.index_axis_mut(Axis(0), 1).fill(INVALID);
        let mut m = ScalarMap::new(data, VoxelGeometry::identity());
        let report = GapFiller::default().apply(&mut m);
        assert_eq!(m[(0, 1, 1)], 50.0);
        assert!(is_invalid(m[(1, 1, 1)]));
        assert_eq!(report, FillReport { filled: 1, residual: 9 });
    }
}
