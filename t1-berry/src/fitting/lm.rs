//! 四参数非线性最小二乘 (Levenberg-Marquardt).
//!
//! 法方程只有 4x4, 直接用 `nalgebra` 的定长矩阵求解.

use nalgebra::{Matrix4, Vector4};

use super::model::{gradient, signal};

/// 相对代价下降阈值, 与 MINPACK 默认值一致.
const FTOL: f64 = 1.49012e-8;

/// 相对步长阈值, 与 MINPACK 默认值一致.
const XTOL: f64 = 1.49012e-8;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// 拟合收敛后的结果.
#[derive(Clone, Debug)]
pub(crate) struct LmFit {
    pub params: Vector4<f64>,

    /// `s^2 (J^T J)^-1`. 样本数不多于参数数或矩阵奇异时为 `None`.
    pub covariance: Option<Matrix4<f64>>,

    pub iterations: usize,
}

#[inline]
fn cost(t: &[f64], s: &[f64], p: &Vector4<f64>) -> f64 {
    t.iter()
        .zip(s)
        .map(|(&t, &s)| {
            let r = signal(t, p) - s;
            r * r
        })
        .sum()
}

/// 返回 `(J^T J, J^T r)`.
fn normal_equations(t: &[f64], s: &[f64], p: &Vector4<f64>) -> (Matrix4<f64>, Vector4<f64>) {
    let mut jtj = Matrix4::zeros();
    let mut jtr = Vector4::zeros();
    for (&t, &s) in t.iter().zip(s) {
        let g = gradient(t, p);
        let r = signal(t, p) - s;
        jtj += g * g.transpose();
        jtr += g * r;
    }
    (jtj, jtr)
}

/// 从 `init` 出发拟合 `(t, s)`. 未在 `max_iterations` 次迭代内收敛时返回 `None`.
///
/// 调用者保证 `t.len() == s.len()`.
pub(crate) fn fit(t: &[f64], s: &[f64], init: Vector4<f64>, max_iterations: usize) -> Option<LmFit> {
    debug_assert_eq!(t.len(), s.len());
    let mut p = init;
    let mut c = cost(t, s, &p);
    if !c.is_finite() {
        return None;
    }
    let scale = s.iter().map(|v| v * v).sum::<f64>();
    let mut lambda = LAMBDA_INIT;

    for it in 1..=max_iterations {
        if c <= f64::EPSILON * scale {
            return Some(finish(t, s, p, c, it));
        }
        let (jtj, jtr) = normal_equations(t, s, &p);
        if !jtj.iter().all(|v| v.is_finite()) || !jtr.iter().all(|v| v.is_finite()) {
            return None;
        }

        // 增大阻尼直到代价下降; 阻尼过大说明已位于局部极小值.
        loop {
            let mut damped = jtj;
            for k in 0..4 {
                damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
            }
            let step = damped.lu().solve(&(-jtr));
            let Some(step) = step.filter(|d| d.iter().all(|v| v.is_finite())) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Some(finish(t, s, p, c, it));
                }
                continue;
            };

            let candidate = p + step;
            let c_new = cost(t, s, &candidate);
            if c_new.is_finite() && c_new < c {
                let small_drop = c - c_new <= FTOL * c;
                let small_step = step.norm() <= XTOL * (p.norm() + XTOL);
                p = candidate;
                c = c_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if small_drop || small_step {
                    return Some(finish(t, s, p, c, it));
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Some(finish(t, s, p, c, it));
            }
        }
    }
    None
}

fn finish(t: &[f64], s: &[f64], p: Vector4<f64>, c: f64, iterations: usize) -> LmFit {
    let n = t.len();
    let covariance = if n > 4 {
        let (jtj, _) = normal_equations(t, s, &p);
        jtj.try_inverse()
            .map(|inv| inv * (c / (n - 4) as f64))
            .filter(|m| m.iter().all(|v| v.is_finite()))
    } else {
        None
    };
    LmFit {
        params: p,
        covariance,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<f64> {
        vec![100.0, 200.0, 400.0, 600.0, 800.0, 1000.0, 1300.0, 1600.0, 2000.0, 2500.0, 3000.0]
    }

    #[test]
    fn test_recover_exact_parameters() {
        let truth = Vector4::new(800.0, 1600.0, 500.0, 0.0);
        let t = labels();
        let s: Vec<f64> = t.iter().map(|&t| signal(t, &truth)).collect();

        let fit = fit(&t, &s, Vector4::new(790.0, 1580.0, 600.0, 0.0), 400).unwrap();
        let recovered = fit.params;
        assert!((recovered[2] - 500.0).abs() < 1e-3, "{recovered:?}");
        assert!((recovered[0].abs() - 800.0).abs() < 1e-3);
        assert!(fit.iterations <= 400);
    }

    #[test]
    fn test_non_finite_start() {
        let t = labels();
        let s = vec![1.0; t.len()];
        assert!(fit(&t, &s, Vector4::new(1.0, 2.0, f64::NAN, 0.0), 10).is_none());
    }

    #[test]
    fn test_covariance_needs_dof() {
        let truth = Vector4::new(800.0, 1600.0, 500.0, 0.0);
        let t = vec![100.0, 500.0, 1000.0, 2000.0];
        let s: Vec<f64> = t.iter().map(|&t| signal(t, &truth)).collect();
        let fit = fit(&t, &s, truth, 50).unwrap();
        assert!(fit.covariance.is_none());
    }
}
