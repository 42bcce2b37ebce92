//! # flatex
//!
//! Tools for preparing LaTeX projects for submission: flatten a multi-file
//! project into a single self-contained document, and repair the output of
//! `latexdiff`.
//!
//! ## Features
//!
//! - Recursive `\input`/`\include` splicing with cycle detection
//! - Figure relocation into a flat `figures/` directory with stable,
//!   collision-free names
//! - Bibliography inlining from the formatted `.bbl`, optionally renumbered
//!   by first in-document citation
//! - `latexdiff` post-processing: gapless bibliography renumbering and
//!   spacing repair at markup boundaries
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use flatex::flatten::bbl;
//! use flatex::{FlattenOptions, FsTree, flatten, write_output};
//!
//! let root = Path::new("paper/main.tex");
//! let options = FlattenOptions {
//!     flatten_bib: true,
//!     fix_ref_numbers: true,
//! };
//! let output = flatten(&FsTree, root, &options, || bbl::acquire(root)).unwrap();
//! let path = write_output(&output, Path::new(".")).unwrap();
//! println!("wrote {}", path.display());
//! ```
//!
//! ## Flattening In Memory
//!
//! The pipeline is pure text transformation over a [`SourceTree`], so it
//! runs against an in-memory project without touching the filesystem:
//!
//! ```
//! use std::path::Path;
//!
//! use flatex::{FlattenOptions, MemoryTree, flatten};
//!
//! let tree = MemoryTree::new()
//!     .with_file("paper/main.tex", "\\documentclass{article}\n\\input{intro}\n")
//!     .with_file("paper/intro.tex", "Hello.");
//! let out = flatten(
//!     &tree,
//!     Path::new("paper/main.tex"),
//!     &FlattenOptions::default(),
//!     || Ok(String::new()),
//! )
//! .unwrap();
//! assert_eq!(out.text, "\\documentclass{article}\nHello.\n");
//! ```
//!
//! ## Repairing a Diff
//!
//! ```
//! let marked = "\\DIFdelend \\DIFaddbegin \\begin{thebibliography}{1}\n\
//!               \\bibitem{a} A. \\DIFaddend\n\\end{thebibliography}\n";
//! let repaired = flatex::repair(marked);
//! assert!(repaired.starts_with("\\begin{thebibliography}"));
//! ```

pub mod diff;
pub mod error;
pub mod flatten;
pub mod source;
pub(crate) mod tex;
pub(crate) mod util;

pub use diff::{repair, run_latexdiff};
pub use error::{Error, Result};
pub use flatten::{FlattenOptions, FlattenOutput, Warning, flatten, write_output};
pub use source::{FsTree, MemoryTree, SourceTree};
