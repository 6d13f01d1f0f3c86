use clap::Parser;
use envboot_cli::{Cli, execute, logging};
use std::process::ExitCode;

/// Config and usage problems; build failures use the build's own code
const SETUP_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match execute(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(SETUP_FAILURE)
        }
    }
}
