//! Built-in grain texture. Each RGBA channel is one grain layer: white noise
//! box-blurred with a radius equal to the channel index, so later layers carry
//! progressively coarser grain. The texture wraps seamlessly in both axes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::image_io::{BitDepth, PixelImage, CHANNELS};
use crate::types::Extent;

pub const BUILTIN_NOISE_SIZE: u32 = 256;
pub const DEFAULT_NOISE_SEED: u64 = 0x0f11_6a12;

const LAYER_MEAN: f32 = 128.0;
const LAYER_SPREAD: f32 = 48.0;

pub fn builtin_noise(seed: u64) -> PixelImage {
    let size = BUILTIN_NOISE_SIZE as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let layers: Vec<Vec<u8>> = (0..CHANNELS as usize)
        .map(|radius| {
            let white: Vec<f32> = (0..size * size).map(|_| rng.gen::<f32>()).collect();
            normalise(&box_blur_wrapped(&white, size, radius))
        })
        .collect();

    let mut pixels = Vec::with_capacity(size * size * CHANNELS as usize);
    for texel in 0..size * size {
        pixels.extend(layers.iter().map(|layer| layer[texel]));
    }

    tracing::debug!(seed, size = BUILTIN_NOISE_SIZE, "generated built-in noise texture");
    PixelImage {
        extent: Extent::new(BUILTIN_NOISE_SIZE, BUILTIN_NOISE_SIZE),
        depth: BitDepth::Eight,
        source_channels: CHANNELS as u8,
        pixels,
    }
}

fn box_blur_wrapped(values: &[f32], size: usize, radius: usize) -> Vec<f32> {
    if radius == 0 {
        return values.to_vec();
    }
    let horizontal = blur_pass(values, size, radius, |x, y| y * size + x);
    blur_pass(&horizontal, size, radius, |x, y| x * size + y)
}

/// One separable pass; `index(along, across)` picks the axis.
fn blur_pass(
    values: &[f32],
    size: usize,
    radius: usize,
    index: impl Fn(usize, usize) -> usize,
) -> Vec<f32> {
    let taps = (2 * radius + 1) as f32;
    let mut out = vec![0.0; values.len()];
    for across in 0..size {
        for along in 0..size {
            let sum: f32 = (0..=2 * radius)
                .map(|tap| {
                    let source = (along + size + tap - radius) % size;
                    values[index(source, across)]
                })
                .sum();
            out[index(along, across)] = sum / taps;
        }
    }
    out
}

fn normalise(values: &[f32]) -> Vec<u8> {
    let count = values.len() as f32;
    let mean = values.iter().sum::<f32>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / count;
    let deviation = variance.sqrt();
    values
        .iter()
        .map(|value| {
            let z = if deviation > f32::EPSILON {
                (value - mean) / deviation
            } else {
                0.0
            };
            (LAYER_MEAN + z * LAYER_SPREAD).round().clamp(0.0, 255.0) as u8
        })
        .collect()
}
