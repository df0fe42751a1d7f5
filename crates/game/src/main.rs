mod app;

use std::env;
use std::process::ExitCode;

use tracing::error;

use app::cli::{parse_args, usage_text, CliCommand};

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_args(&args) {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            return ExitCode::from(2);
        }
    };

    app::bootstrap::init_tracing();
    let wiring = match app::bootstrap::build_app(&options) {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    app::loop_runner::run(wiring)
}
