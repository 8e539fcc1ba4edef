//! 信号恢复模型 `S(t) = |A - B exp(-t / Ts)| + c` 及 T1 校正.

use nalgebra::{Matrix4, Vector4};

/// 恢复模型的四个自由参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RecoveryParams {
    /// 稳态信号幅度.
    pub a: f64,

    /// 反转幅度.
    pub b: f64,

    /// 表观恢复时间常数 (ms).
    pub ts: f64,

    /// 加性偏移.
    pub c: f64,
}

impl RecoveryParams {
    #[inline]
    pub(crate) fn from_vector(v: &Vector4<f64>) -> Self {
        Self {
            a: v[0],
            b: v[1],
            ts: v[2],
            c: v[3],
        }
    }

    #[inline]
    pub(crate) fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.a, self.b, self.ts, self.c)
    }

    /// 模型在时间 `t` 处的信号值.
    #[inline]
    pub fn eval(&self, t: f64) -> f64 {
        signal(t, &self.to_vector())
    }

    /// 由表观时间常数校正得到的真实 T1. `delta_t` 为反转时间与触发时间之差.
    #[inline]
    pub fn t1(&self, delta_t: f64) -> f64 {
        ts_to_t1(self.a, self.b, self.ts, delta_t)
    }
}

/// `|A - B exp(-t / Ts)| + c`.
#[inline]
pub(crate) fn signal(t: f64, p: &Vector4<f64>) -> f64 {
    (p[0] - p[1] * (-t / p[2]).exp()).abs() + p[3]
}

/// 模型对 `(A, B, Ts, c)` 的偏导数.
#[inline]
pub(crate) fn gradient(t: f64, p: &Vector4<f64>) -> Vector4<f64> {
    let e = (-t / p[2]).exp();
    let u = p[0] - p[1] * e;
    let sgn = if u >= 0.0 { 1.0 } else { -1.0 };
    Vector4::new(
        sgn,
        -sgn * e,
        -sgn * p[1] * e * t / (p[2] * p[2]),
        1.0,
    )
}

/// `T1 = Ts * (B exp(ΔT / Ts) / A - 1)`.
#[inline]
pub fn ts_to_t1(a: f64, b: f64, ts: f64, delta_t: f64) -> f64 {
    ts * (b * (delta_t / ts).exp() / a - 1.0)
}

/// 由种子 T1 反推初始 `Ts`: `Ts = T1 / (B0 / A0 - 1)`.
///
/// 除数为 0 或非有限值时返回 `None`, 调用者应改用下一个种子.
#[inline]
pub fn seed_ts(t1_seed: f64, a0: f64, b0: f64) -> Option<f64> {
    let ratio = b0 / a0 - 1.0;
    if !ratio.is_finite() || ratio == 0.0 {
        return None;
    }
    let ts = t1_seed / ratio;
    ts.is_finite().then_some(ts)
}

/// T1 的一阶误差传递. `cov` 为 `(A, B, Ts, c)` 的协方差矩阵, 偏移 `c` 不参与校正.
pub fn sigma_t1(p: &RecoveryParams, delta_t: f64, cov: &Matrix4<f64>) -> f64 {
    let e = (delta_t / p.ts).exp();
    let d_a = -p.ts * e * p.b / (p.a * p.a);
    let d_b = p.ts * e / p.a;
    let d_ts = p.b * e / p.a * (1.0 - delta_t / p.ts) - 1.0;
    let g = Vector4::new(d_a, d_b, d_ts, 0.0);
    (g.transpose() * cov * g)[(0, 0)].abs().sqrt()
}
