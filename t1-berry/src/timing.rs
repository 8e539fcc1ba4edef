//! 采集时间信息: 帧标签解析, 触发时间偏移和推荐区间检查.

use crate::config::{min_max, MappingConfig};
use crate::consts::AcquisitionMode;
use crate::warning::{Warning, WarningSink};
use crate::{MappingError, MappingResult};

/// 解析以逗号分隔的帧时间标签.
///
/// `raw` 为 `None` 时返回 `0, 1, ..., frames - 1`. 标签个数与 `frames`
/// 不一致或某个标签无法解析时返回 `Err`.
pub fn parse_frame_labels(raw: Option<&str>, frames: usize) -> MappingResult<Vec<f64>> {
    let Some(raw) = raw else {
        return Ok((0..frames).map(|i| i as f64).collect());
    };
    let labels = raw
        .split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, s)| {
            s.parse::<f64>().map_err(|_| MappingError::InvalidFrameLabel {
                index,
                raw: s.to_string(),
            })
        })
        .collect::<MappingResult<Vec<_>>>()?;
    if labels.len() != frames {
        return Err(MappingError::LabelCountMismatch {
            labels: labels.len(),
            frames,
        });
    }
    Ok(labels)
}

/// 由体数据标识查询反转时间与触发时间 (ms).
pub trait TimingLookup {
    /// 返回 `(inversion_time, trigger_time)`. 信息缺失时返回 `None`.
    fn timing(&self, volume_id: &str) -> Option<(f64, f64)>;

    /// `ΔT = inversion_time - trigger_time`. 信息缺失时为 0.
    fn delta_t(&self, volume_id: &str) -> f64 {
        match self.timing(volume_id) {
            Some((inversion, trigger)) => inversion - trigger,
            None => {
                log::debug!("no timing metadata for `{volume_id}`, using ΔT = 0");
                0.0
            }
        }
    }
}

/// 没有任何时间信息, `ΔT` 总为 0.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTiming;

impl TimingLookup for NoTiming {
    #[inline]
    fn timing(&self, _volume_id: &str) -> Option<(f64, f64)> {
        None
    }
}

impl TimingLookup for std::collections::HashMap<String, (f64, f64)> {
    #[inline]
    fn timing(&self, volume_id: &str) -> Option<(f64, f64)> {
        self.get(volume_id).copied()
    }
}

/// 检查时间标签是否覆盖了 `mode` 的推荐触发时间区间. 未覆盖时向 `sink` 发送警告并返回 `false`.
pub fn check_trigger_window(
    mode: AcquisitionMode,
    labels: &[f64],
    config: &MappingConfig,
    sink: &mut dyn WarningSink,
) -> bool {
    if config.trigger_window(mode).covers(labels) {
        return true;
    }
    let (first, last) = min_max(labels);
    sink.warn(Warning::TriggerWindow { mode, first, last });
    false
}
