use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use compute::{run_job, GrainJob};
use grainparams::{load_preset, parse_flags, FlagError, GrainParams};
use tracing_subscriber::EnvFilter;

use crate::cli::{usage_text, Cli};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Grain parameters after layering defaults, the preset and the flags.
#[derive(Debug)]
enum Resolved {
    Params(GrainParams),
    /// A grain flag asked for help; carries the values seen so far.
    Help(GrainParams),
}

fn resolve_params(preset: Option<&Path>, flags: &[String]) -> Result<Resolved> {
    let mut params = match preset {
        Some(path) => load_preset(path).map_err(|err| anyhow!("load preset: {err}"))?,
        None => GrainParams::default(),
    };
    match parse_flags(&mut params, flags) {
        Ok(()) => {}
        Err(FlagError::HelpRequested) => return Ok(Resolved::Help(params)),
        Err(err) => bail!("parse flags: {err} (see --help)"),
    }
    params
        .validate()
        .map_err(|err| anyhow!("parse flags: {err}"))?;
    Ok(Resolved::Params(params))
}

fn print_usage(params: &GrainParams) -> ExitCode {
    eprint!("{}", usage_text(params));
    ExitCode::FAILURE
}

fn warn_on_extension(output: &Path) {
    let is_tga = output
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tga"));
    if !is_tga {
        tracing::warn!(
            path = %output.display(),
            "output is always written as TGA regardless of its extension"
        );
    }
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    if cli.help {
        return Ok(print_usage(&GrainParams::default()));
    }
    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        return Ok(print_usage(&GrainParams::default()));
    };

    let params = if cli.baked {
        if cli.preset.is_some() || !cli.grain_flags.is_empty() {
            bail!("usage: --baked does not accept grain flags or --preset");
        }
        None
    } else {
        match resolve_params(cli.preset.as_deref(), &cli.grain_flags)? {
            Resolved::Params(params) => Some(params),
            Resolved::Help(current) => return Ok(print_usage(&current)),
        }
    };
    tracing::debug!(?params, baked = cli.baked, "resolved grain parameters");
    warn_on_extension(&output);

    let job = GrainJob {
        input,
        output,
        noise: cli.noise,
        noise_seed: cli.noise_seed,
        params,
        power: cli.gpu_power,
    };
    let report = run_job(&job).map_err(|err| anyhow!("{}: {err}", err.stage()))?;
    tracing::info!(
        adapter = %report.adapter,
        extent = %report.extent,
        noise = %report.noise_extent,
        variant = ?report.variant,
        "film grain applied"
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn flags(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn flags_layer_over_preset() {
        let dir = TempDir::new().unwrap();
        let preset = dir.path().join("soft.toml");
        fs::write(&preset, "noise_tile_size = 2\ngrayscale = true\n").unwrap();

        let Resolved::Params(params) =
            resolve_params(Some(&preset), &flags(&["-grayscale", "0"])).unwrap()
        else {
            panic!("expected parameters");
        };
        assert_eq!(params.noise_tile_size, 2);
        assert!(!params.grayscale);
        assert_eq!(params.layer_weights, GrainParams::default().layer_weights);
    }

    #[test]
    fn help_inside_grain_flags_reports_current_values() {
        let resolved = resolve_params(None, &flags(&["-noise_tile_size", "9", "-h"])).unwrap();
        let Resolved::Help(current) = resolved else {
            panic!("expected help");
        };
        assert_eq!(current.noise_tile_size, 9);
    }

    #[test]
    fn flag_errors_name_the_stage() {
        let err = resolve_params(None, &flags(&["-bogus"])).unwrap_err();
        assert!(err.to_string().starts_with("parse flags: unknown flag '-bogus'"));

        let err = resolve_params(None, &flags(&["-use_base_color", "1.5"])).unwrap_err();
        assert!(err.to_string().starts_with("parse flags:"));

        let dir = TempDir::new().unwrap();
        let err = resolve_params(Some(&dir.path().join("absent.toml")), &[]).unwrap_err();
        assert!(err.to_string().starts_with("load preset:"));
    }
}
