use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use texpr_algebra::ReferenceEngine;
use texpr_verify::{console, load_cases, run_cases, Policy};
use tracing::info;

const RESULTS_FILE: &str = "verification_results.json";

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Exported test-case file.
    #[arg(long)]
    pub input: PathBuf,
    /// Results file; defaults to `verification_results.json` next to the input.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// YAML policy overriding tolerances, symbols and markup rules.
    #[arg(long)]
    pub policy: Option<PathBuf>,
    /// Print only the header and summary.
    #[arg(long)]
    pub quiet: bool,
}

fn default_out(input: &Path) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(RESULTS_FILE))
        .unwrap_or_else(|| PathBuf::from(RESULTS_FILE))
}

pub fn run(args: &VerifyArgs) -> Result<u8, Box<dyn Error>> {
    let policy = match &args.policy {
        Some(path) => Policy::from_yaml_path(path)?,
        None => Policy::default(),
    };
    let set = load_cases(&args.input)?;
    let engine = ReferenceEngine::new(policy.engine_config());
    let report = run_cases(&engine, &policy, &set);

    if args.quiet {
        print!("{}", console::header(&report));
        println!();
        print!("{}", console::summary(&report));
    } else {
        print!("{}", console::render(&report));
    }

    let out = args.out.clone().unwrap_or_else(|| default_out(&args.input));
    report.write(&out)?;
    println!("Results written to: {}", out.display());
    info!(path = %out.display(), exit = report.exit_code(), "report written");
    Ok(report.exit_code())
}
