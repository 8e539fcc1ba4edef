//! 完整流程: 两次 T1 mapping, 空洞填充, 配准与 ECV 计算.

use crate::align::{AlignCase, EcvParams, ReferenceGrid, VolumeAligner};
use crate::config::MappingConfig;
use crate::consts::AcquisitionMode;
use crate::filter::{FillReport, GapFiller};
use crate::fitting::{MapReport, NoProgress, Progress, T1Mapper};
use crate::timing::{check_trigger_window, TimingLookup};
use crate::warning::{GeometryReport, WarningSink};
use crate::{MappingResult, ScalarMap, TimeSeriesVolume};

/// 一次采集: 时间序列和触发时间偏移.
#[derive(Clone, Debug)]
pub struct Acquisition {
    /// 时间序列.
    pub series: TimeSeriesVolume,

    /// 反转时间与触发时间之差 (ms).
    pub delta_t: f64,
}

impl Acquisition {
    /// 直接指定 `ΔT`.
    #[inline]
    pub fn new(series: TimeSeriesVolume, delta_t: f64) -> Self {
        Self { series, delta_t }
    }

    /// 由 `lookup` 查询 `volume_id` 的 `ΔT`. 查询不到时为 0.
    #[inline]
    pub fn with_timing(series: TimeSeriesVolume, volume_id: &str, lookup: &dyn TimingLookup) -> Self {
        Self::new(series, lookup.delta_t(volume_id))
    }
}

/// 单次采集的 T1 mapping 结果.
#[derive(Clone, Debug)]
pub struct T1Output {
    /// 填充后的 T1 图.
    pub map: ScalarMap,

    /// 误差图: 填充前的 T1 图中可填充的失败体素被标记为高亮值.
    pub error_map: ScalarMap,

    /// 拟合统计.
    pub mapping: MapReport,

    /// 填充统计.
    pub filling: FillReport,
}

/// 完整流程的输出.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// 平扫 T1 结果.
    pub native: T1Output,

    /// 增强 T1 结果.
    pub enhanced: T1Output,

    /// ECV 图 (%).
    pub ecv: ScalarMap,

    /// 对齐方式.
    pub case: AlignCase,

    /// 参考网格.
    pub reference: ReferenceGrid,

    /// 几何对比结果.
    pub geometry: GeometryReport,
}

/// T1 / ECV 流程.
#[derive(Clone, Debug, Default)]
pub struct EcvPipeline {
    config: MappingConfig,
}

impl EcvPipeline {
    /// 以 `config` 构建. 配置不合法时返回 `Err`.
    pub fn new(config: MappingConfig) -> MappingResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// 以配置中的 `epsilon` 构建 ECV 参数.
    #[inline]
    pub fn ecv_params(&self, native_blood_t1: f64, enhanced_blood_t1: f64, hematocrit: f64) -> EcvParams {
        EcvParams::new(native_blood_t1, enhanced_blood_t1, hematocrit).with_epsilon(self.config.epsilon)
    }

    /// 单次采集的 T1 mapping 与空洞填充.
    #[inline]
    pub fn t1_map(
        &self,
        mode: AcquisitionMode,
        acquisition: &Acquisition,
        sink: &mut dyn WarningSink,
    ) -> MappingResult<T1Output> {
        self.t1_map_with_progress(mode, acquisition, sink, &NoProgress)
    }

    /// 同 [`EcvPipeline::t1_map`], 并向 `progress` 报告进度.
    pub fn t1_map_with_progress(
        &self,
        mode: AcquisitionMode,
        acquisition: &Acquisition,
        sink: &mut dyn WarningSink,
        progress: &dyn Progress,
    ) -> MappingResult<T1Output> {
        let series = &acquisition.series;
        check_trigger_window(mode, series.labels(), &self.config, sink);

        let mapper = T1Mapper::with_config(mode, &self.config);
        let (mut map, mapping) = mapper.run_with_progress(series, acquisition.delta_t, progress)?;

        let (error_map, _) = GapFiller::error_map(self.config.fill_window)?.applied(&map);
        let filling = GapFiller::new(self.config.fill_window)?.apply(&mut map);
        log::info!(
            "{mode} T1 map: {} voxels filled, {} left invalid",
            filling.filled,
            filling.residual
        );
        Ok(T1Output {
            map,
            error_map,
            mapping,
            filling,
        })
    }

    /// 运行完整流程.
    pub fn run(
        &self,
        native: &Acquisition,
        enhanced: &Acquisition,
        params: &EcvParams,
        sink: &mut dyn WarningSink,
    ) -> MappingResult<PipelineOutput> {
        let native = self.t1_map(AcquisitionMode::Native, native, sink)?;
        let enhanced = self.t1_map(AcquisitionMode::Enhanced, enhanced, sink)?;

        let pair = VolumeAligner::new(self.config.geometry_decimals).align(&native.map, &enhanced.map, sink);
        let ecv = pair.ecv(params);
        Ok(PipelineOutput {
            native,
            enhanced,
            ecv,
            case: pair.case,
            reference: pair.reference,
            geometry: pair.geometry,
        })
    }
}
