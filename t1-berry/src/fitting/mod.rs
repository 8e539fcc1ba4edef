//! 单体素 T1 曲线拟合.
//!
//! 给定一个体素的信号序列 `S` 和每帧时间标签 `T`, 拟合
//! `|A - B exp(-t / Ts)| + c`, 再由触发时间偏移 `ΔT` 校正得到 T1.
//! 拟合按种子表依次尝试, 最多尝试 `seeds.len()` 次.

use nalgebra::Vector4;

use crate::config::MappingConfig;
use crate::consts::{self, AcquisitionMode};
use crate::{MappingError, MappingResult};

mod lm;
mod mapper;
mod model;

pub use mapper::{MapReport, NoProgress, Progress, T1Mapper};
pub use model::{seed_ts, sigma_t1, ts_to_t1, RecoveryParams};

/// 一次成功的拟合.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FitOutcome {
    /// 校正后的 T1 (ms).
    pub t1: f64,

    /// 产生该结果的种子在种子表中的下标.
    pub seed: usize,

    /// 拟合得到的模型参数.
    pub params: RecoveryParams,

    /// T1 的标准差估计. 协方差不可用时为 `None`.
    pub sigma: Option<f64>,

    /// 被采纳的那次拟合所用的迭代次数.
    pub iterations: usize,
}

/// 单体素曲线拟合器. 种子表在构建时由采集模式确定.
#[derive(Clone, Debug)]
pub struct CurveFitter {
    mode: AcquisitionMode,
    seeds: &'static [f64],
    t1_range: (f64, f64),
    max_iterations: usize,
}

impl CurveFitter {
    /// 以默认配置构建.
    #[inline]
    pub fn new(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            seeds: mode.seeds(),
            t1_range: (consts::T1_MIN_MS, consts::T1_MAX_MS),
            max_iterations: consts::LM_MAX_ITERATIONS,
        }
    }

    /// 以 `config` 中的 T1 区间和迭代上限构建.
    #[inline]
    pub fn with_config(mode: AcquisitionMode, config: &MappingConfig) -> Self {
        Self {
            t1_range: config.t1_range,
            max_iterations: config.max_iterations,
            ..Self::new(mode)
        }
    }

    /// 采集模式.
    #[inline]
    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    /// 种子表.
    #[inline]
    pub fn seeds(&self) -> &'static [f64] {
        self.seeds
    }

    /// 可接受的 T1 区间.
    #[inline]
    pub fn t1_range(&self) -> (f64, f64) {
        self.t1_range
    }

    /// 从第一个种子开始拟合. 见 [`CurveFitter::fit_from`].
    #[inline]
    pub fn fit(&self, t: &[f64], s: &[f64], delta_t: f64) -> MappingResult<Option<FitOutcome>> {
        self.fit_from(t, s, delta_t, 0)
    }

    /// 从第 `k` 个种子开始依次拟合, 返回第一个落在可接受区间内的结果.
    ///
    /// 所有种子都失败时返回 `Ok(None)`, 这是背景或病态体素的正常结果.
    /// 仅当 `t` 与 `s` 长度不一致时返回 `Err`.
    pub fn fit_from(
        &self,
        t: &[f64],
        s: &[f64],
        delta_t: f64,
        k: usize,
    ) -> MappingResult<Option<FitOutcome>> {
        if t.len() != s.len() {
            return Err(MappingError::SignalLengthMismatch {
                signal: s.len(),
                labels: t.len(),
            });
        }
        Ok(self.fit_unchecked(t, s, delta_t, k))
    }

    /// 调用者保证 `t.len() == s.len()`.
    pub(crate) fn fit_unchecked(&self, t: &[f64], s: &[f64], delta_t: f64, k: usize) -> Option<FitOutcome> {
        if s.is_empty() {
            return None;
        }
        let a0 = s.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let b0 = 2.0 * a0;
        (k..self.seeds.len()).find_map(|seed| self.try_seed(t, s, delta_t, seed, a0, b0))
    }

    fn try_seed(
        &self,
        t: &[f64],
        s: &[f64],
        delta_t: f64,
        seed: usize,
        a0: f64,
        b0: f64,
    ) -> Option<FitOutcome> {
        let ts0 = seed_ts(self.seeds[seed], a0, b0)?;
        let fit = lm::fit(t, s, Vector4::new(a0, b0, ts0, 0.0), self.max_iterations)?;
        let params = RecoveryParams::from_vector(&fit.params);
        let t1 = params.t1(delta_t);

        let (lo, hi) = self.t1_range;
        if !(lo..=hi).contains(&t1) {
            return None;
        }
        let sigma = fit
            .covariance
            .as_ref()
            .map(|cov| sigma_t1(&params, delta_t, cov))
            .filter(|v| v.is_finite());
        Some(FitOutcome {
            t1,
            seed,
            params,
            sigma,
            iterations: fit.iterations,
        })
    }
}
