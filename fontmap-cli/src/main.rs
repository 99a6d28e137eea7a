//! Binary entrypoint for fontmap (made by FontLab https://www.fontlab.com/)

use std::process::ExitCode;

fn main() -> ExitCode {
    match fontmap_cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
