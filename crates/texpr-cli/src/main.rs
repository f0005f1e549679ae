use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{
    eval::{self, EvalArgs},
    verify::{self, VerifyArgs},
};
use texpr_core::OracleError;
use texpr_verify::EXIT_FATAL;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "texpr-oracle",
    about = "Differential verification oracle for exported expression test cases",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify an exported test-case file and write the results report.
    Verify(VerifyArgs),
    /// Evaluate one expression with the reference engine.
    Eval(EvalArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report_fatal(err: &(dyn Error + 'static)) {
    match err.downcast_ref::<OracleError>() {
        Some(oracle) => {
            eprintln!("Error: {}", oracle.message());
            if let Some(hint) = &oracle.info().hint {
                eprintln!("{hint}");
            }
        }
        None => eprintln!("Error: {err}"),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Verify(args) => verify::run(args),
        Command::Eval(args) => eval::run(args),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            report_fatal(err.as_ref());
            ExitCode::from(EXIT_FATAL)
        }
    }
}
