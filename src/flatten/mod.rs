//! Flattening a multi-file LaTeX project into one document.
//!
//! The pipeline is pure until the very end: inclusion resolution, figure
//! path rewriting, and bibliography handling all operate on in-memory text
//! and produce a [`FlattenOutput`] holding the final document plus a copy
//! plan. [`emit::write_output`] is the only stage that writes anything.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::source::{SourceTree, lexical_normalize};
use crate::util::apply_edits;

mod assets;
mod bib;
pub mod bbl;
mod emit;
mod include;

pub use emit::write_output;

/// Flattening behavior toggles, mirroring the CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    /// Replace the bibliography source with an inlined `thebibliography`
    /// block restricted to cited entries.
    pub flatten_bib: bool,
    /// Renumber inlined entries by first in-document citation appearance.
    pub fix_ref_numbers: bool,
}

/// A recoverable per-item condition found while flattening.
///
/// The library accumulates these instead of printing; binaries decide how
/// to report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An `\input`/`\include` target that does not exist.
    MissingInclude { path: PathBuf, from: PathBuf },
    /// A cited key with no formatted bibliography entry.
    MissingBibEntry { key: String },
    /// A `\bibliography{..}` database file that could not be located.
    MissingBibFile { name: String },
    /// An `\includegraphics` argument that resolved to no file.
    UnresolvedAsset { path: String, from: PathBuf },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingInclude { path, from } => write!(
                f,
                "could not find included file {} (from {})",
                path.display(),
                from.display()
            ),
            Warning::MissingBibEntry { key } => {
                write!(f, "no bibliography entry for citation key '{key}'")
            }
            Warning::MissingBibFile { name } => {
                write!(f, "could not find bibliography file '{name}'")
            }
            Warning::UnresolvedAsset { path, from } => write!(
                f,
                "could not resolve figure '{}' (from {})",
                path,
                from.display()
            ),
        }
    }
}

/// A planned copy into the output directory. `target` is relative to the
/// directory the flattened document is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Result of the pure flattening passes.
#[derive(Debug, Clone)]
pub struct FlattenOutput {
    /// Output file stem, derived from the project directory name.
    pub name: String,
    /// The flattened document.
    pub text: String,
    /// Files to place next to the output (figures, bibliography databases).
    pub copies: Vec<CopyJob>,
    pub warnings: Vec<Warning>,
}

impl FlattenOutput {
    /// Output filename (`<project-dir>.tex`).
    pub fn file_name(&self) -> String {
        format!("{}.tex", self.name)
    }
}

/// Flatten the project rooted at `root`.
///
/// `bbl` supplies the formatted bibliography on demand; it is only invoked
/// when the document references an external database via `\bibliography`
/// and bibliography flattening is requested. The CLI wires it to
/// [`bbl::acquire`]; tests hand in a closure returning fixture text.
pub fn flatten<T: SourceTree>(
    tree: &T,
    root: &Path,
    options: &FlattenOptions,
    bbl: impl FnOnce() -> Result<String>,
) -> Result<FlattenOutput> {
    let root = lexical_normalize(root);
    let root_dir = root.parent().unwrap_or(Path::new("")).to_path_buf();

    let mut warnings = Vec::new();
    let doc = include::resolve_includes(tree, &root, &mut warnings)?;

    let (mut edits, mut copies) = assets::plan(tree, &doc, &root_dir, &mut warnings);

    if options.flatten_bib {
        let order = bib::CitationOrder::collect(&doc.text);
        if let Some(edit) =
            bib::plan_inline(&doc.text, &order, options.fix_ref_numbers, bbl, &mut warnings)?
        {
            edits.push(edit);
        }
    } else {
        let (bib_edits, bib_copies) = bib::plan_copies(tree, &doc, &root_dir, &mut warnings);
        edits.extend(bib_edits);
        copies.extend(bib_copies);
    }

    Ok(FlattenOutput {
        name: output_stem(&root),
        text: apply_edits(&doc.text, edits),
        copies,
        warnings,
    })
}

/// Output stem: the project's containing directory name, falling back to
/// the root file's stem when the path carries no directory.
fn output_stem(root: &Path) -> String {
    root.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            root.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "flattened".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTree;

    fn no_bbl() -> Result<String> {
        panic!("bbl should not be requested")
    }

    #[test]
    fn test_output_stem_uses_project_dir() {
        assert_eq!(output_stem(Path::new("papers/thesis/main.tex")), "thesis");
        assert_eq!(output_stem(Path::new("main.tex")), "main");
    }

    #[test]
    fn test_flatten_plain_project() {
        let tree = MemoryTree::new()
            .with_file("proj/main.tex", "\\documentclass{article}\n\\input{body}\n")
            .with_file("proj/body.tex", "Hello.");
        let out = flatten(&tree, Path::new("proj/main.tex"), &FlattenOptions::default(), no_bbl)
            .unwrap();
        assert_eq!(out.name, "proj");
        assert_eq!(out.file_name(), "proj.tex");
        assert_eq!(out.text, "\\documentclass{article}\nHello.\n");
        assert!(out.warnings.is_empty());
        assert!(out.copies.is_empty());
    }

    #[test]
    fn test_flatten_rewrites_figures_and_plans_copies() {
        let tree = MemoryTree::new()
            .with_file(
                "proj/main.tex",
                "\\input{sections/fig}\n\\includegraphics{plots/root.pdf}\n",
            )
            .with_file(
                "proj/sections/fig.tex",
                "\\includegraphics[width=\\linewidth]{local.png}",
            )
            .with_file("proj/sections/local.png", b"PNG".to_vec())
            .with_file("proj/plots/root.pdf", b"PDF".to_vec());
        let out = flatten(&tree, Path::new("proj/main.tex"), &FlattenOptions::default(), no_bbl)
            .unwrap();

        assert!(out.text.contains("\\includegraphics[width=\\linewidth]{figures/local.png}"));
        assert!(out.text.contains("\\includegraphics{figures/root.pdf}"));
        assert_eq!(out.copies.len(), 2);
        assert!(out.copies.iter().any(|c| {
            c.source == Path::new("proj/sections/local.png")
                && c.target == Path::new("figures/local.png")
        }));
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "\\input{a}\n\\includegraphics{f.png}\n")
            .with_file("p/a.tex", "body \\cite{x}")
            .with_file("p/f.png", b"IMG".to_vec());
        let opts = FlattenOptions::default();
        let first = flatten(&tree, Path::new("p/main.tex"), &opts, no_bbl).unwrap();
        let second = flatten(&tree, Path::new("p/main.tex"), &opts, no_bbl).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.copies, second.copies);
    }
}
