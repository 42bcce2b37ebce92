//! flatex-diff - latexdiff post-processor

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Run latexdiff over two documents and repair the marked output
#[derive(Parser, Debug)]
#[command(name = "flatex-diff")]
#[command(
    about = "Runs latexdiff over two documents and repairs the marked output: \
             the bibliography is renumbered without gaps where entries were \
             deleted, and spacing at markup boundaries is fixed. The repaired \
             document goes to stdout."
)]
struct Args {
    /// Original document
    old: PathBuf,

    /// Revised document
    new: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> flatex::Result<()> {
    let diff = flatex::run_latexdiff(&args.old, &args.new)?;
    let repaired = flatex::repair(&diff);
    std::io::stdout().write_all(repaired.as_bytes())?;
    Ok(())
}
