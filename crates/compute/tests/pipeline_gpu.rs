use std::path::Path;

use compute::gpu::{minimum_capacity, PassRecorder};
use compute::{
    builtin_noise, load_input, run_job, ErrorClass, Extent, GpuContext, GpuPowerPreference,
    GrainJob, GrainResources, KernelVariant, PassStage, PipelineError, DEFAULT_NOISE_SEED,
};
use grainparams::GrainParams;
use image::{ImageBuffer, Luma, Rgba};
use tempfile::TempDir;

fn gpu_available() -> bool {
    match GpuContext::new(GpuPowerPreference::High) {
        Ok(_) => true,
        Err(err) if err.class() == ErrorClass::Device => {
            eprintln!("skipping GPU test: {err}");
            false
        }
        Err(err) => panic!("unexpected device error: {err}"),
    }
}

fn write_gradient(path: &Path) {
    ImageBuffer::from_fn(64, 64, |x, y| Luma([((x * 64 + y) * 16) as u16]))
        .save(path)
        .unwrap();
}

fn job(dir: &TempDir, params: Option<GrainParams>) -> GrainJob {
    let input = dir.path().join("in.png");
    write_gradient(&input);
    GrainJob {
        input,
        output: dir.path().join("out.tga"),
        noise: None,
        noise_seed: DEFAULT_NOISE_SEED,
        params,
        power: GpuPowerPreference::High,
    }
}

/// Largest per-channel change the kernel can make, in 8-bit steps, plus one
/// step of rounding slack.
fn grain_bound(params: &GrainParams) -> i32 {
    (params.weight_magnitude() * 0.5 * 0.25 * 255.0).ceil() as i32 + 1
}

fn assert_grain_within_bound(job: &GrainJob, params: &GrainParams) {
    let original = load_input(&job.input).unwrap().to_rgba8();
    let output = image::open(&job.output).unwrap();
    assert_eq!((output.width(), output.height()), (64, 64));
    assert_eq!(output.color().channel_count(), 4);

    let output = output.into_rgba8();
    assert_eq!(output.get_pixel(0, 0)[3], 255);

    let bound = grain_bound(params);
    let mut changed = 0;
    for (texel, before) in output.pixels().zip(original.pixels.chunks_exact(4)) {
        assert_eq!(texel[3], 255);
        for channel in 0..3 {
            let delta = (i32::from(texel[channel]) - i32::from(before[channel])).abs();
            assert!(delta <= bound, "delta {delta} exceeds {bound}");
            if delta > 0 {
                changed += 1;
            }
        }
    }
    assert!(changed > 0, "no grain was applied");
}

#[test]
fn parameterized_run_produces_bounded_grain() {
    if !gpu_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let params = GrainParams::default();
    let job = job(&dir, Some(params.clone()));

    let report = run_job(&job).unwrap();
    assert_eq!(report.extent, Extent::new(64, 64));
    assert_eq!(report.source_channels, 1);
    assert_eq!(report.variant, KernelVariant::Parameterized);
    assert_grain_within_bound(&job, &params);
}

#[test]
fn baked_run_matches_default_parameters() {
    if !gpu_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let baked = job(&dir, None);
    run_job(&baked).unwrap();
    assert_grain_within_bound(&baked, &GrainParams::default());

    let parameterized = GrainJob {
        output: dir.path().join("param.tga"),
        params: Some(GrainParams::default()),
        ..baked.clone()
    };
    run_job(&parameterized).unwrap();

    let a = image::open(&baked.output).unwrap().into_rgba8().into_raw();
    let b = image::open(&parameterized.output).unwrap().into_rgba8().into_raw();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert!(x.abs_diff(*y) <= 1, "baked {x} vs parameterized {y}");
    }
}

#[test]
fn zero_weights_leave_the_image_unchanged() {
    if !gpu_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let params = GrainParams {
        layer_weights: [0.0; 4],
        ..GrainParams::default()
    };
    let job = job(&dir, Some(params));
    run_job(&job).unwrap();

    let original = load_input(&job.input).unwrap().to_rgba8();
    let output = image::open(&job.output).unwrap().into_rgba8();
    for (texel, before) in output.pixels().zip(original.pixels.chunks_exact(4)) {
        for channel in 0..3 {
            assert!((i32::from(texel[channel]) - i32::from(before[channel])).abs() <= 1);
        }
    }
}

#[test]
fn external_noise_texture_of_another_size() {
    if !gpu_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let noise_path = dir.path().join("noise.png");
    ImageBuffer::from_fn(37, 19, |x, y| Rgba([(x * 7) as u8, (y * 13) as u8, 128u8, 200u8]))
        .save(&noise_path)
        .unwrap();

    let params = GrainParams::default();
    let job = GrainJob {
        noise: Some(noise_path),
        ..job(&dir, Some(params.clone()))
    };
    let report = run_job(&job).unwrap();
    assert_eq!(report.noise_extent, Extent::new(37, 19));
    assert_grain_within_bound(&job, &params);
}

#[test]
fn recorder_enforces_pass_order() {
    if !gpu_available() {
        return;
    }
    let context = GpuContext::new(GpuPowerPreference::High).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("in.png");
    write_gradient(&path);
    let input = load_input(&path).unwrap();
    let noise = builtin_noise(DEFAULT_NOISE_SEED);
    let resources =
        GrainResources::create(context, input.extent, noise.extent, KernelVariant::Baked).unwrap();
    assert_eq!(resources.variant(), KernelVariant::Baked);
    assert_eq!(resources.output_extent(), input.extent);
    let layout = resources.transfer_layout();
    assert!(layout.capacity >= minimum_capacity(input.extent, noise.extent));
    assert!(layout.capacity <= resources.context().limits.max_buffer_size);

    let mut recorder = PassRecorder::new(&resources);
    let err = recorder.dispatch(None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::OutOfOrder {
            attempted: PassStage::Dispatched,
            current: PassStage::Recording,
        }
    ));
    assert!(recorder.upload_noise(&noise).is_err());

    recorder.upload_input(&input).unwrap();
    recorder.upload_noise(&noise).unwrap();
    assert!(recorder.readback().is_err());
    assert_eq!(recorder.stage(), PassStage::NoiseUploaded);

    let err = recorder.submit().err().unwrap();
    assert!(matches!(err, PipelineError::Incomplete(PassStage::NoiseUploaded)));
}

#[test]
fn binding_plan_must_match_the_kernel() {
    if !gpu_available() {
        return;
    }
    let context = GpuContext::new(GpuPowerPreference::High).unwrap();
    let noise = builtin_noise(1);
    let input = compute::PixelImage {
        extent: Extent::new(8, 8),
        depth: compute::BitDepth::Sixteen,
        source_channels: 4,
        pixels: vec![0; 8 * 8 * 8],
    };
    let resources = GrainResources::create(
        context,
        input.extent,
        noise.extent,
        KernelVariant::Parameterized,
    )
    .unwrap();

    let mut recorder = PassRecorder::new(&resources);
    recorder.upload_input(&input).unwrap();
    recorder.upload_noise(&noise).unwrap();
    let err = recorder.dispatch(None).unwrap_err();
    assert!(matches!(err, PipelineError::ContractMismatch(_)));
    assert_eq!(err.class(), ErrorClass::Protocol);
}
