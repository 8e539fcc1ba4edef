//! 分割区域统计, 用于预填血池 T1 参考值.

use std::collections::BTreeMap;

use ndarray::ArrayView3;

use crate::data::IndexAxis;
use crate::filter::median;
use crate::{Idx3d, MappingError, MappingResult, ScalarMap};

/// 分割标签中的背景.
pub const BACKGROUND_LABEL: u8 = 0;

/// 单个分割区域在一幅标量图上的统计量.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentSummary {
    /// 平均值.
    pub mean: f64,

    /// 总体标准差.
    pub std_dev: f64,

    /// 最小值.
    pub min: f64,

    /// 最大值.
    pub max: f64,

    /// 中位数.
    pub median: f64,

    /// 区域内的体素个数 (包括取值非有限的体素).
    pub voxel_count: usize,

    /// 区域表面积, 单位为几何信息中长度单位的平方.
    pub surface_area: f64,
}

/// 分割统计提供者.
pub trait SegmentStatistics {
    /// 计算 `mask` 中每个非背景标签在 `volume` 上的统计量.
    ///
    /// 形状不一致时返回 `Err`. 没有任何有限取值的区域不出现在结果中.
    fn summarize(&self, mask: ArrayView3<u8>, volume: &ScalarMap) -> MappingResult<BTreeMap<u8, SegmentSummary>>;
}

/// 基于 `u8` 标签体的统计实现.
#[derive(Copy, Clone, Debug, Default)]
pub struct MaskStatistics;

impl SegmentStatistics for MaskStatistics {
    fn summarize(&self, mask: ArrayView3<u8>, volume: &ScalarMap) -> MappingResult<BTreeMap<u8, SegmentSummary>> {
        if mask.dim() != volume.shape() {
            return Err(MappingError::ShapeMismatch {
                expected: volume.shape(),
                actual: mask.dim(),
            });
        }
        let g = volume.geometry();
        let (sc, sr, sz) = (
            g.spacing(IndexAxis::Col),
            g.spacing(IndexAxis::Row),
            g.spacing(IndexAxis::Slice),
        );
        // 与切片, 行, 列方向垂直的面的面积.
        let face = [sr * sc, sz * sc, sz * sr];

        let mut values: BTreeMap<u8, (Vec<f64>, usize, f64)> = BTreeMap::new();
        for (pos, &label) in mask.indexed_iter() {
            if label == BACKGROUND_LABEL {
                continue;
            }
            let entry = values.entry(label).or_default();
            entry.1 += 1;
            entry.2 += exposed_faces(mask, pos, label)
                .iter()
                .zip(face)
                .map(|(&n, a)| n as f64 * a)
                .sum::<f64>();
            let v = volume[pos];
            if v.is_finite() {
                entry.0.push(v);
            }
        }

        Ok(values
            .into_iter()
            .filter_map(|(label, (mut v, voxel_count, surface_area))| {
                let n = v.len() as f64;
                let mean = v.iter().sum::<f64>() / n;
                let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                let (min, max) = crate::config::min_max(&v);
                let median = median(&mut v)?;
                Some((
                    label,
                    SegmentSummary {
                        mean,
                        std_dev: var.sqrt(),
                        min,
                        max,
                        median,
                        voxel_count,
                        surface_area,
                    },
                ))
            })
            .collect())
    }
}

/// `pos` 处体素沿切片, 行, 列方向暴露在区域之外的面数.
fn exposed_faces(mask: ArrayView3<u8>, (z, h, w): Idx3d, label: u8) -> [usize; 3] {
    let outside = |p: Idx3d| mask.get(p).map_or(true, |&l| l != label);
    [
        outside((z.wrapping_sub(1), h, w)) as usize + outside((z + 1, h, w)) as usize,
        outside((z, h.wrapping_sub(1), w)) as usize + outside((z, h + 1, w)) as usize,
        outside((z, h, w.wrapping_sub(1))) as usize + outside((z, h, w + 1)) as usize,
    ]
}

/// 由血池平均值得到 `(平扫血池 T1, 增强血池 T1)`.
///
/// 恰好两个平均值时, 较大者为平扫值, 较小者为增强值; 否则返回 `None`.
pub fn blood_references(means: &[f64]) -> Option<(f64, f64)> {
    match *means {
        [a, b] => Some((a.max(b), a.min(b))),
        _ => None,
    }
}

/// 在两幅 T1 图上统计血池区域 `label`, 并按 [`blood_references`] 给出参考值.
pub fn blood_references_from(
    provider: &dyn SegmentStatistics,
    mask: ArrayView3<u8>,
    label: u8,
    maps: &[&ScalarMap],
) -> MappingResult<Option<(f64, f64)>> {
    let mut means = Vec::with_capacity(maps.len());
    for map in maps {
        if let Some(s) = provider.summarize(mask, map)?.get(&label) {
            means.push(s.mean);
        }
    }
    Ok(blood_references(&means))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::INVALID;
    use crate::VoxelGeometry;
    use ndarray::Array3;

    #[test]
    fn test_blood_references() {
        assert_eq!(blood_references(&[350.0, 1600.0]), Some((1600.0, 350.0)));
        assert_eq!(blood_references(&[1600.0, 350.0]), Some((1600.0, 350.0)));
        assert_eq!(blood_references(&[1600.0]), None);
        assert_eq!(blood_references(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_single_voxel_cube() {
        let mut mask = Array3::<u8>::zeros((3, 3, 3));
        mask[(1, 1, 1)] = 2;
        let map = ScalarMap::filled(
            (3, 3, 3),
            7.0,
            VoxelGeometry::axis_aligned([0.0; 3], [1.0, 2.0, 3.0]),
        );
        let s = MaskStatistics.summarize(mask.view(), &map).unwrap();
        let s = s[&2];
        assert_eq!(s.voxel_count, 1);
        assert_eq!(s.mean, 7.0);
        assert_eq!(s.std_dev, 0.0);
        // 2 * (1*2) + 2 * (3*1) + 2 * (3*2).
        assert!((s.surface_area - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_values_and_invalid() {
        let mut mask = Array3::<u8>::zeros((1, 2, 3));
        mask.fill(1);
        let mut data = Array3::from_shape_vec((1, 2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        data[(0, 1, 2)] = INVALID;
        let map = ScalarMap::new(data, VoxelGeometry::identity());
        let s = MaskStatistics.summarize(mask.view(), &map).unwrap()[&1];
        assert_eq!(s.voxel_count, 6);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 3.0);
        assert_eq!((s.min, s.max), (1.0, 5.0));
        assert!((s.std_dev - 2f64.sqrt()).abs() < 1e-12);
        // 2x3x1 的长方体: 2 * (6 + 3 + 2).
        assert!((s.surface_area - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let mask = Array3::<u8>::zeros((1, 2, 2));
        let map = ScalarMap::filled((1, 2, 3), 0.0, VoxelGeometry::identity());
        assert!(matches!(
            MaskStatistics.summarize(mask.view(), &map),
            Err(MappingError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_blood_from_two_maps() {
        let mut mask = Array3::<u8>::zeros((1, 3, 3));
        mask[(0, 1, 1)] = 3;
        let native = ScalarMap::filled((1, 3, 3), 1650.0, VoxelGeometry::identity());
        let enhanced = ScalarMap::filled((1, 3, 3), 320.0, VoxelGeometry::identity());
        let r = blood_references_from(&MaskStatistics, mask.view(), 3, &[&enhanced, &native]).unwrap();
        assert_eq!(r, Some((1650.0, 320.0)));
        let r = blood_references_from(&MaskStatistics, mask.view(), 4, &[&enhanced, &native]).unwrap();
        assert_eq!(r, None);
    }
}
