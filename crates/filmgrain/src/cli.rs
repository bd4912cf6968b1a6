use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use compute::{GpuPowerPreference, DEFAULT_NOISE_SEED};
use grainparams::{describe_flags, GrainParams};

#[derive(Parser, Debug)]
#[command(
    name = "filmgrain",
    version,
    about = "Composite film grain onto an image with a GPU compute kernel",
    override_usage = "filmgrain [OPTIONS] <IN> <OUT> [GRAIN_FLAGS]...",
    disable_help_flag = true
)]
pub struct Cli {
    /// Print usage and the grain flag table with current values, then exit.
    #[arg(short = 'h', long = "help")]
    pub help: bool,

    /// Image to read (any format the image codecs understand).
    #[arg(value_name = "IN")]
    pub input: Option<PathBuf>,

    /// Where to write the result; always an uncompressed 32-bit TGA.
    #[arg(value_name = "OUT")]
    pub output: Option<PathBuf>,

    /// Replace the built-in noise texture with an image file.
    #[arg(long, value_name = "PATH")]
    pub noise: Option<PathBuf>,

    /// Seed for the built-in noise texture.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_NOISE_SEED)]
    pub noise_seed: u64,

    /// TOML preset applied before any grain flags.
    #[arg(long, value_name = "FILE")]
    pub preset: Option<PathBuf>,

    /// Use the kernel with default parameters compiled in (no grain flags or presets).
    #[arg(long)]
    pub baked: bool,

    /// GPU adapter power preference: `low` or `high`.
    #[arg(
        long,
        value_name = "low|high",
        value_parser = parse_gpu_power,
        default_value = "high"
    )]
    pub gpu_power: GpuPowerPreference,

    /// Single-dash grain flags, e.g. `-grayscale 1 -layer_weights 1 0.5 0.25 0.1`.
    #[arg(
        value_name = "GRAIN_FLAGS",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..
    )]
    pub grain_flags: Vec<String>,
}

/// Parses the process arguments. Clap failures are printed here, followed by
/// the usage text, and turned into the exit code the caller should return.
pub fn parse() -> Result<Cli, ExitCode> {
    match Cli::try_parse() {
        Ok(cli) => Ok(cli),
        Err(err) => {
            err.print().ok();
            if err.kind() == ErrorKind::DisplayVersion {
                return Err(ExitCode::SUCCESS);
            }
            eprint!("\n{}", usage_text(&GrainParams::default()));
            Err(ExitCode::FAILURE)
        }
    }
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("GPU power preference must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!(
            "unknown GPU power preference '{other}'; expected low or high"
        )),
    }
}

/// Clap help followed by the grain flag table rendered against `params`.
pub fn usage_text(params: &GrainParams) -> String {
    let help = Cli::command().render_help();
    format!(
        "{help}\nGrain flags (single dash, after <OUT>):\n{}",
        describe_flags(params)
    )
}
