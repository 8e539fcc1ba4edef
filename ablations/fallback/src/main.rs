//! 种子回退策略的消融实验.
//!
//! 用法: `fallback [TRIALS] [NOISE]`. 对每种采集模式抽样 `TRIALS` 条带噪声的合成恢复曲线,
//! 统计每个种子被采纳的次数, 以及只使用第一个种子时会损失多少体素.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let mut args = std::env::args().skip(1);
    let trials = args.next().and_then(|s| s.parse().ok()).unwrap_or(2000);
    let noise = args.next().and_then(|s| s.parse().ok()).unwrap_or(10.0);
    log::info!("{trials} trials per mode, uniform noise amplitude {noise}");

    runner::run(trials, noise).analyze();
}
