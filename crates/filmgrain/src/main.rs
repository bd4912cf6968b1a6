mod cli;
mod run;

use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match cli::parse() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    run::initialise_tracing();

    match run::run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("filmgrain: {err:#}");
            ExitCode::FAILURE
        }
    }
}
