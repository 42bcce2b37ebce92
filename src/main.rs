//! flatex - LaTeX project flattener

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use flatex::flatten::bbl;
use flatex::{FlattenOptions, FsTree, flatten, write_output};

#[derive(Parser)]
#[command(name = "flatex")]
#[command(version, about = "Flatten a multi-file LaTeX project into one document", long_about = None)]
#[command(after_help = "EXAMPLES:
    flatex paper/main.tex                  Flatten into ./<project>.tex
    flatex --flatten-bib paper/main.tex    Inline the bibliography as well
    flatex --flatten-bib --fix-ref-numbers paper/main.tex
                                           Renumber references by first citation")]
struct Cli {
    /// Root .tex file of the project
    #[arg(value_name = "ROOT")]
    root: String,

    /// Inline the bibliography as a thebibliography block
    #[arg(long)]
    flatten_bib: bool,

    /// Renumber inlined references by first in-document citation
    #[arg(long, requires = "flatten_bib")]
    fix_ref_numbers: bool,

    /// Suppress warnings and progress messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> flatex::Result<()> {
    // Canonicalize so the project directory name is real even for a bare
    // `main.tex` argument; the output file is named after it.
    let root = std::fs::canonicalize(&cli.root)
        .map_err(|_| flatex::Error::RootNotFound(PathBuf::from(&cli.root)))?;

    let options = FlattenOptions {
        flatten_bib: cli.flatten_bib,
        fix_ref_numbers: cli.fix_ref_numbers,
    };
    let bbl_root = root.clone();
    let output = flatten(&FsTree, &root, &options, move || bbl::acquire(&bbl_root))?;

    if !cli.quiet {
        for warning in &output.warnings {
            eprintln!("warning: {warning}");
        }
    }

    let path = write_output(&output, &env::current_dir()?)?;
    if !cli.quiet {
        println!("Created flattened file: {}", path.display());
    }
    Ok(())
}
