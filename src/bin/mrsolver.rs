//! MinRank solver CLI
//!
//! Thin shell around the library controller: parse flags, wire the tracing
//! subscriber to stderr (timestamps off, so seeded runs stay reproducible),
//! run, and map every failure to exit code 1 with a `[!]` line.

#![forbid(unsafe_code)]

use anyhow::Context;
use mrsolver::{opt, run_with_output};
use std::io::Write;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn solve(opts: &opt::Options) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let res = run_with_output(opts, &mut out)
        .with_context(|| format!("solving {}", opts.file.display()));
    let _ = out.flush();
    res.map(|_| ())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match opt::parse(&args) {
        Ok(opt::Parsed::Help) => {
            print!("{}", opt::USAGE);
            return ExitCode::SUCCESS;
        }
        Ok(opt::Parsed::Run(o)) => o,
        Err(e) => {
            eprintln!("[!] Failed to parse options: {e}");
            eprint!("{}", opt::USAGE);
            return ExitCode::FAILURE;
        }
    };

    match solve(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[!] {e:#}");
            ExitCode::FAILURE
        }
    }
}
