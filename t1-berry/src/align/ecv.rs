//! 细胞外容积 (ECV) 计算.

use ndarray::{Array3, ArrayView3, Zip};

use crate::consts;

/// ECV 公式中的四个标量.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EcvParams {
    /// 平扫血池 T1 (ms).
    pub native_blood_t1: f64,

    /// 增强血池 T1 (ms).
    pub enhanced_blood_t1: f64,

    /// 红细胞压积 (百分比).
    pub hematocrit: f64,

    /// 加到两幅 T1 图上的下限.
    pub epsilon: f64,
}

impl EcvParams {
    /// 以默认 `epsilon` 构建.
    #[inline]
    pub fn new(native_blood_t1: f64, enhanced_blood_t1: f64, hematocrit: f64) -> Self {
        Self {
            native_blood_t1,
            enhanced_blood_t1,
            hematocrit,
            epsilon: consts::ECV_EPSILON,
        }
    }

    /// 修改 `epsilon`.
    #[inline]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// `(100 - hct) * nB * eB / (nB - eB)`. 两个血池值相等时为非有限值.
    #[inline]
    pub fn factor(&self) -> f64 {
        let (nb, eb) = (self.native_blood_t1, self.enhanced_blood_t1);
        (100.0 - self.hematocrit) * (nb * eb) / (nb - eb)
    }

    /// 单个体素的 ECV (%). 非有限值或超出 `[0, 100]` 的结果为 0.
    #[inline]
    pub fn eval(&self, native_t1: f64, enhanced_t1: f64) -> f64 {
        self.eval_with_factor(native_t1, enhanced_t1, self.factor())
    }

    #[inline]
    fn eval_with_factor(&self, native_t1: f64, enhanced_t1: f64, factor: f64) -> f64 {
        let ecv = (1.0 / (enhanced_t1 + self.epsilon) - 1.0 / (native_t1 + self.epsilon)) * factor;
        let (lo, hi) = consts::ECV_RANGE;
        if ecv.is_finite() && (lo..=hi).contains(&ecv) {
            ecv
        } else {
            0.0
        }
    }
}

/// 逐体素计算 ECV 图.
///
/// 当 `native` 与 `enhanced` 形状不一致时 panic.
pub fn ecv_array(native: ArrayView3<f64>, enhanced: ArrayView3<f64>, params: &EcvParams) -> Array3<f64> {
    let factor = params.factor();
    let mut out = Array3::zeros(native.dim());
    Zip::from(&mut out)
        .and(&native)
        .and(&enhanced)
        .for_each(|o, &n, &e| *o = params.eval_with_factor(n, e, factor));
    out
}
