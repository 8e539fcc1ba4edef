//! 消融实验依赖的通用组件.

use t1_berry::consts::AcquisitionMode;

const SEP: &str = "--------------------------------------------------------";

/// 向 `w` 写入一条简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 合成实验的帧时间标签 (ms).
#[inline]
pub fn default_labels() -> &'static [f64] {
    &t1_berry::phantom::DEFAULT_LABELS
}

/// 各采集模式下生理学上常见的 T1 区间 (ms), 用于抽样真值.
#[inline]
pub fn plausible_t1(mode: AcquisitionMode) -> (f64, f64) {
    match mode {
        AcquisitionMode::Native => (800.0, 1600.0),
        AcquisitionMode::Enhanced => (200.0, 600.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sep_to() {
        let mut buf = Vec::new();
        sep_to(&mut buf).unwrap();
        sep_to(&mut buf).unwrap();
        assert_eq!(buf, format!("{SEP}\n{SEP}\n").into_bytes());
    }
}
