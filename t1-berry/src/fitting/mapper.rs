//! 逐体素 T1 mapping.

use ndarray::{Array3, ArrayView3, ArrayViewMut2, Axis};

use super::CurveFitter;
use crate::config::MappingConfig;
use crate::consts::{self, AcquisitionMode};
use crate::data::store_estimate;
use crate::{MappingError, MappingResult, ScalarMap, TimeSeriesVolume};

/// 进度回调. 每完成一个切片调用一次.
pub trait Progress: Sync {
    /// `done` 为已完成切片数, `total` 为切片总数. 返回 `false` 表示请求取消.
    fn slice_done(&self, done: usize, total: usize) -> bool;
}

/// 不报告进度, 也从不取消.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    #[inline]
    fn slice_done(&self, _done: usize, _total: usize) -> bool {
        true
    }
}

/// 一次 mapping 的统计信息.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapReport {
    /// 拟合成功的体素数.
    pub fitted: usize,

    /// 所有种子都失败的体素数.
    pub failed: usize,

    /// 被背景抑制跳过的体素数.
    pub skipped: usize,

    /// 每个种子被采纳的次数.
    pub seed_hits: Vec<usize>,
}

impl MapReport {
    fn with_seeds(n: usize) -> Self {
        Self {
            seed_hits: vec![0; n],
            ..Self::default()
        }
    }

    /// 合并两份统计.
    pub fn merge(mut self, other: Self) -> Self {
        self.fitted += other.fitted;
        self.failed += other.failed;
        self.skipped += other.skipped;
        if self.seed_hits.len() < other.seed_hits.len() {
            self.seed_hits.resize(other.seed_hits.len(), 0);
        }
        for (a, b) in self.seed_hits.iter_mut().zip(other.seed_hits) {
            *a += b;
        }
        self
    }

    /// 被送入拟合的体素数.
    #[inline]
    pub fn attempted(&self) -> usize {
        self.fitted + self.failed
    }
}

/// 将整个时间序列逐体素拟合为 T1 图.
///
/// 背景体素 (最后一帧信号不超过所在切片最大信号的 `background_fraction` 倍)
/// 不做拟合, 以 0 保存; 拟合失败的体素以哨兵值保存.
#[derive(Clone, Debug)]
pub struct T1Mapper {
    fitter: CurveFitter,
    background_fraction: f64,
}

impl T1Mapper {
    /// 以默认配置构建.
    #[inline]
    pub fn new(mode: AcquisitionMode) -> Self {
        Self {
            fitter: CurveFitter::new(mode),
            background_fraction: consts::BACKGROUND_FRACTION,
        }
    }

    /// 以 `config` 构建.
    #[inline]
    pub fn with_config(mode: AcquisitionMode, config: &MappingConfig) -> Self {
        Self {
            fitter: CurveFitter::with_config(mode, config),
            background_fraction: config.background_fraction,
        }
    }

    /// 底层拟合器.
    #[inline]
    pub fn fitter(&self) -> &CurveFitter {
        &self.fitter
    }

    /// 运行 mapping. 开启 `rayon` feature 时按切片并行, 结果与串行版本逐位一致.
    #[inline]
    pub fn run(&self, series: &TimeSeriesVolume, delta_t: f64) -> MappingResult<(ScalarMap, MapReport)> {
        self.run_with_progress(series, delta_t, &NoProgress)
    }

    /// 串行运行 mapping.
    pub fn run_serial(
        &self,
        series: &TimeSeriesVolume,
        delta_t: f64,
        progress: &dyn Progress,
    ) -> MappingResult<(ScalarMap, MapReport)> {
        let mut out = Array3::<f64>::zeros(series.shape());
        let total = out.len_of(Axis(0));
        let mut report = MapReport::with_seeds(self.fitter.seeds().len());
        for (done, (src, dst)) in series.slice_iter().zip(out.axis_iter_mut(Axis(0))).enumerate() {
            report = report.merge(self.map_slice(series.labels(), src, dst, delta_t));
            if !progress.slice_done(done + 1, total) {
                return Err(MappingError::Cancelled(done + 1));
            }
        }
        Ok(self.finish(series, out, report))
    }

    fn finish(&self, series: &TimeSeriesVolume, out: Array3<f64>, report: MapReport) -> (ScalarMap, MapReport) {
        log::info!(
            "{} T1 mapping: {} fitted, {} failed, {} background voxels",
            self.fitter.mode(),
            report.fitted,
            report.failed,
            report.skipped
        );
        log::debug!("seed acceptance histogram: {:?}", report.seed_hits);
        (ScalarMap::new(out, *series.geometry()), report)
    }

    /// 拟合单个切片. `src` 为 `(行, 列, 帧)`, `dst` 为 `(行, 列)`.
    fn map_slice(
        &self,
        labels: &[f64],
        src: ArrayView3<f32>,
        mut dst: ArrayViewMut2<f64>,
        delta_t: f64,
    ) -> MapReport {
        let mut report = MapReport::with_seeds(self.fitter.seeds().len());
        let frames = src.len_of(Axis(2));
        let slice_max = src.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let threshold = slice_max as f64 * self.background_fraction;
        let mut buf = Vec::with_capacity(frames);

        for (signal, out) in src.lanes(Axis(2)).into_iter().zip(dst.iter_mut()) {
            let last = signal[frames - 1] as f64;
            if !(last > threshold) {
                report.skipped += 1;
                continue;
            }
            buf.clear();
            buf.extend(signal.iter().map(|&v| v as f64));

            let outcome = self.fitter.fit_unchecked(labels, &buf, delta_t, 0);
            match outcome {
                Some(o) => {
                    report.fitted += 1;
                    report.seed_hits[o.seed] += 1;
                }
                None => report.failed += 1,
            }
            *out = store_estimate(outcome.map(|o| o.t1));
        }
        report
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        impl T1Mapper {
            /// 借助 `rayon`, 按切片并行运行 mapping. 每个任务只写入自己的切片.
            pub fn run_with_progress(
                &self,
                series: &TimeSeriesVolume,
                delta_t: f64,
                progress: &dyn Progress,
            ) -> MappingResult<(ScalarMap, MapReport)> {
                let mut out = Array3::<f64>::zeros(series.shape());
                let total = out.len_of(Axis(0));
                let done = AtomicUsize::new(0);
                let cancelled = AtomicBool::new(false);
                let labels = series.labels();

                let report = out
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .zip(series.data().axis_iter(Axis(0)).into_par_iter())
                    .map(|(dst, src)| {
                        if cancelled.load(Ordering::Acquire) {
                            return MapReport::with_seeds(self.fitter.seeds().len());
                        }
                        let r = self.map_slice(labels, src, dst, delta_t);
                        let d = done.fetch_add(1, Ordering::AcqRel) + 1;
                        if !progress.slice_done(d, total) {
                            cancelled.store(true, Ordering::Release);
                        }
                        r
                    })
                    .reduce(|| MapReport::with_seeds(self.fitter.seeds().len()), MapReport::merge);

                if cancelled.load(Ordering::Acquire) {
                    return Err(MappingError::Cancelled(done.load(Ordering::Acquire)));
                }
                Ok(self.finish(series, out, report))
            }
        }
    } else {
        impl T1Mapper {
            /// 运行 mapping 并报告进度.
            #[inline]
            pub fn run_with_progress(
                &self,
                series: &TimeSeriesVolume,
                delta_t: f64,
                progress: &dyn Progress,
            ) -> MappingResult<(ScalarMap, MapReport)> {
                self.run_serial(series, delta_t, progress)
            }
        }
    }
}
