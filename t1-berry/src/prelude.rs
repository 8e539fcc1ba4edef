//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{MappingError, MappingResult, ScalarMap, TimeSeriesVolume, VoxelGeometry};

pub use crate::config::{MappingConfig, TriggerWindow};
pub use crate::consts::{AcquisitionMode, INVALID};

pub use crate::align::{compute_ecv, AlignedPair, EcvParams, VolumeAligner};
pub use crate::filter::{FillValue, GapFiller};
pub use crate::fitting::{CurveFitter, FitOutcome, T1Mapper};
pub use crate::pipeline::{Acquisition, EcvPipeline};
pub use crate::stats::{blood_references, MaskStatistics, SegmentStatistics};
pub use crate::timing::{parse_frame_labels, TimingLookup};
pub use crate::warning::{LogSink, Warning, WarningSink};
