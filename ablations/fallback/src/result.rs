//! 实验结果.

use std::io::{self, Write};
use std::time::Duration;

use t1_berry::consts::AcquisitionMode;

/// 一种采集模式下的统计.
#[derive(Debug, Clone, Default)]
pub struct SeedProfile {
    hits: Vec<usize>,
    failed: usize,
    abs_err: f64,
    elapsed: Duration,
}

impl SeedProfile {
    pub fn new(seeds: usize) -> Self {
        Self {
            hits: vec![0; seeds],
            ..Self::default()
        }
    }

    /// 记录一次拟合. `outcome` 为 `(采纳的种子下标, 绝对误差)`.
    pub fn record(&mut self, outcome: Option<(usize, f64)>, elapsed: Duration) {
        self.elapsed += elapsed;
        match outcome {
            Some((seed, err)) => {
                self.hits[seed] += 1;
                self.abs_err += err;
            }
            None => self.failed += 1,
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        if self.hits.len() < other.hits.len() {
            self.hits.resize(other.hits.len(), 0);
        }
        for (a, b) in self.hits.iter_mut().zip(other.hits) {
            *a += b;
        }
        self.failed += other.failed;
        self.abs_err += other.abs_err;
        self.elapsed += other.elapsed;
        self
    }

    #[inline]
    fn fitted(&self) -> usize {
        self.hits.iter().sum()
    }

    #[inline]
    fn total(&self) -> usize {
        self.fitted() + self.failed
    }
}

/// 将 `p` 的结果写进 `w` 中.
fn describe_into<W: Write>(mode: AcquisitionMode, p: &SeedProfile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn ratio(a: usize, b: usize) -> String {
        if b == 0 {
            "/".to_string()
        } else {
            format!("{:.4}%", a as f64 * 100.0 / b as f64)
        }
    }

    let total = p.total();
    let fitted = p.fitted();
    writeln!(w, "Profile `{mode}`:")?;
    writeln!(w, "{S4}Curves: {total}")?;
    writeln!(w, "{S4}Fitted with fallback: {fitted} ({})", ratio(fitted, total))?;
    let first = p.hits.first().copied().unwrap_or(0);
    writeln!(w, "{S4}Fitted by the first seed only: {first} ({})", ratio(first, total))?;
    for (k, (hit, seed)) in p.hits.iter().zip(mode.seeds()).enumerate() {
        writeln!(w, "{S4}Seed #{k} ({seed} ms): {hit} ({})", ratio(*hit, total))?;
    }
    if fitted > 0 {
        writeln!(w, "{S4}Mean absolute T1 error: {:.4} ms", p.abs_err / fitted as f64)?;
    }
    write!(w, "{S4}Total fitting time: {} us", p.elapsed.as_micros())?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(AcquisitionMode, SeedProfile)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (AcquisitionMode, SeedProfile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        let mut buf = Vec::<u8>::with_capacity(512);
        utils::sep_to(&mut buf).unwrap();

        for (mode, profile) in self.data.iter() {
            describe_into(*mode, profile, &mut buf).unwrap();
            utils::sep_to(&mut buf).unwrap();
        }
        print!("{}", String::from_utf8_lossy(&buf));
    }
}
