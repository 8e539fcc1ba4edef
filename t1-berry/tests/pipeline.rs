use ndarray::Array3;
use t1_berry::align::{AlignCase, ReferenceGrid};
use t1_berry::fitting::RecoveryParams;
use t1_berry::phantom::{PhantomBuilder, DEFAULT_TISSUE};
use t1_berry::prelude::*;
use t1_berry::stats::blood_references_from;

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

fn enhanced_tissue() -> RecoveryParams {
    RecoveryParams {
        ts: 250.0,
        ..DEFAULT_TISSUE
    }
}

#[test]
fn test_ecv_from_resampled_maps() {
    init_logger();
    let pipeline = EcvPipeline::default();
    let mut sink = Vec::new();

    let native = PhantomBuilder::new((2, 8, 8))
        .geometry(VoxelGeometry::axis_aligned([0.0; 3], [2.0, 2.0, 6.0]))
        .build()
        .unwrap();
    let enhanced = PhantomBuilder::new((3, 16, 16))
        .tissue(enhanced_tissue())
        .geometry(VoxelGeometry::axis_aligned([0.0; 3], [1.0, 1.0, 6.0]))
        .build()
        .unwrap();

    let native = pipeline
        .t1_map(AcquisitionMode::Native, &Acquisition::new(native, 0.0), &mut sink)
        .unwrap();
    let enhanced = pipeline
        .t1_map(AcquisitionMode::Enhanced, &Acquisition::new(enhanced, 0.0), &mut sink)
        .unwrap();
    assert_eq!(native.map.count_invalid(), 0);
    assert_eq!(enhanced.map.count_invalid(), 0);

    let pair = VolumeAligner::default().align(&native.map, &enhanced.map, &mut sink);
    assert!(sink.is_empty(), "{sink:?}");
    assert_eq!(pair.case, AlignCase::Resampled);
    assert_eq!(pair.reference, ReferenceGrid::Enhanced);
    assert_eq!(pair.shape(), (2, 16, 16));

    // 以中心 4x4 区域作为血池.
    let mut mask = Array3::<u8>::zeros(pair.shape());
    mask.slice_mut(ndarray::s![.., 6..10, 6..10]).fill(1);
    let (nb, eb) = blood_references_from(&MaskStatistics, mask.view(), 1, &[&pair.enhanced, &pair.native])
        .unwrap()
        .unwrap();
    assert!((nb - 500.0).abs() < 0.5, "{nb}");
    assert!((eb - 250.0).abs() < 0.5, "{eb}");

    let ecv = pair.ecv(&pipeline.ecv_params(nb, eb, 45.0));
    assert_eq!(ecv.geometry(), enhanced.map.geometry());
    // 组织 T1 等于血池 T1 时 ECV 接近 100 - hct.
    assert!(ecv.data().iter().all(|v| (v - 55.0).abs() < 0.1));
}

#[test]
fn test_full_run_with_background() {
    init_logger();
    let native = PhantomBuilder::new((2, 9, 9)).disk_radius(3.0).build().unwrap();
    let enhanced = PhantomBuilder::new((2, 9, 9))
        .disk_radius(3.0)
        .tissue(enhanced_tissue())
        .build()
        .unwrap();

    let pipeline = EcvPipeline::new(MappingConfig::default()).unwrap();
    let params = pipeline.ecv_params(1600.0, 350.0, 45.0);
    let mut sink = Vec::new();
    let out = pipeline
        .run(&Acquisition::new(native, 0.0), &Acquisition::new(enhanced, 0.0), &params, &mut sink)
        .unwrap();

    assert!(sink.is_empty());
    assert_eq!(out.case, AlignCase::Identical);
    assert_eq!(out.native.mapping.failed, 0);
    assert_eq!(out.native.mapping.skipped, out.enhanced.mapping.skipped);
    assert!(out.native.mapping.skipped > 0);

    let expected = params.eval(500.0, 250.0);
    assert!((out.ecv[(0, 4, 4)] - expected).abs() < 0.1);
    assert_eq!(out.ecv[(1, 0, 0)], 0.0);
    assert_eq!(out.native.map[(1, 0, 0)], 0.0);
    assert_eq!(out.native.error_map, out.native.map);
}
