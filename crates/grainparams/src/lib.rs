//! The flat parameter record handed to the grain kernel, plus the two ways it
//! gets populated: single-dash command-line flags (`flags`) and TOML presets
//! (`preset`).
//!
//! Types:
//!
//! - `GrainParams` holds every numeric knob the kernel reads.
//! - `ParamsError` reports out-of-range values and preset failures.
//!
//! Functions:
//!
//! - `GrainParams::validate` rejects records the kernel cannot sample with.
//! - `flags::parse_flags` and `flags::describe_flags` drive the flag table.
//! - `preset::load_preset` reads a record from disk.

mod flags;
mod preset;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use flags::{describe_flags, parse_flags, FlagError, FlagSpec, FlagValue, ValueKind, FLAGS};
pub use preset::load_preset;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("{field} is {value}, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("failed to read preset {path}: {source}")]
    PresetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse preset {path}: {source}")]
    PresetParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Grain controls, in the units the kernel consumes them.
///
/// Offsets are in noise-texture cells and shift where each colour channel
/// samples the noise, which decorrelates the channels. Layer weights scale
/// the four noise layers (one per noise texture channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GrainParams {
    pub noise_tile_size: i32,
    pub noise_offsets_r: [i32; 2],
    pub noise_offsets_g: [i32; 2],
    pub noise_offsets_b: [i32; 2],
    pub layer_weights: [f32; 4],
    pub grayscale: bool,
    pub base_color: [f32; 3],
    pub use_base_color: f32,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            noise_tile_size: 4,
            noise_offsets_r: [0, 0],
            noise_offsets_g: [6, 3],
            noise_offsets_b: [1, 7],
            layer_weights: [1.0, 0.9, 0.75, 0.5],
            grayscale: false,
            base_color: [0.005, 0.009, 0.014],
            use_base_color: 0.0,
        }
    }
}

impl GrainParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.noise_tile_size < 1 {
            return Err(ParamsError::OutOfRange {
                field: "noise_tile_size",
                value: self.noise_tile_size.to_string(),
                expected: "an integer >= 1",
            });
        }

        let floats = self
            .layer_weights
            .iter()
            .map(|value| ("layer_weights", *value))
            .chain(self.base_color.iter().map(|value| ("base_color", *value)))
            .chain(std::iter::once(("use_base_color", self.use_base_color)));
        for (field, value) in floats {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite { field });
            }
        }

        if !(0.0..=1.0).contains(&self.use_base_color) {
            return Err(ParamsError::OutOfRange {
                field: "use_base_color",
                value: self.use_base_color.to_string(),
                expected: "a blend factor between 0.0 and 1.0",
            });
        }

        Ok(())
    }

    /// Combined magnitude of the layer weights; grain never moves a channel
    /// further than a fraction of this.
    pub fn weight_magnitude(&self) -> f32 {
        self.layer_weights.iter().map(|weight| weight.abs()).sum()
    }
}
