//! 程序运行函数.

use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use t1_berry::consts::AcquisitionMode;
use t1_berry::fitting::{ts_to_t1, CurveFitter, RecoveryParams};

use crate::result::{AblationResult, SeedProfile};

/// 单个工作线程: 抽样 `trials` 条曲线并拟合.
fn worker(mode: AcquisitionMode, trials: usize, noise: f64, seed: u64) -> SeedProfile {
    let labels = utils::default_labels();
    let fitter = CurveFitter::new(mode);
    let (lo, hi) = utils::plausible_t1(mode);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut profile = SeedProfile::new(fitter.seeds().len());
    let mut signal = Vec::with_capacity(labels.len());

    for _ in 0..trials {
        let t1: f64 = rng.gen_range(lo..hi);
        let a: f64 = rng.gen_range(400.0..1200.0);
        // B = 2A 时 T1 = Ts.
        let truth = RecoveryParams {
            a,
            b: 2.0 * a,
            ts: t1,
            c: 0.0,
        };
        debug_assert!((ts_to_t1(truth.a, truth.b, truth.ts, 0.0) - t1).abs() < 1e-9);

        signal.clear();
        signal.extend(labels.iter().map(|&t| truth.eval(t) + rng.gen_range(-noise..=noise)));

        let start = Instant::now();
        let outcome = fitter.fit(labels, &signal, 0.0).unwrap_or(None);
        profile.record(outcome.map(|o| (o.seed, (o.t1 - t1).abs())), start.elapsed());
    }
    profile
}

/// 实际运行.
pub fn run(trials: usize, noise: f64) -> AblationResult {
    let workers = utils::cpus().max(1);
    let per_worker = trials.div_ceil(workers);

    println!("Running ablation studies on {workers} threads...");
    thread::scope(|s| {
        let modes = [AcquisitionMode::Native, AcquisitionMode::Enhanced];
        let handles = modes.map(|mode| {
            (0..workers)
                .map(|w| {
                    let n = per_worker.min(trials.saturating_sub(w * per_worker));
                    s.spawn(move || worker(mode, n, noise, w as u64 * 2 + mode.is_enhanced() as u64))
                })
                .collect::<Vec<_>>()
        });

        AblationResult::from_iter(modes.into_iter().zip(handles.into_iter().map(|hs| {
            hs.into_iter()
                .map(|th| th.join().expect("Thread joining error"))
                .fold(SeedProfile::new(0), SeedProfile::merge)
        })))
    })
}
