//! Figure discovery, collision-free target naming, and path rewriting.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::source::{SourceTree, lexical_normalize};
use crate::tex;
use crate::util::Edit;

use super::include::ResolvedDoc;
use super::{CopyJob, Warning};

/// Directory under the output root receiving relocated figures.
pub const FIGURES_DIR: &str = "figures";

/// Extensions probed, in order, for extensionless `\includegraphics`
/// arguments. Matches pdflatex's own graphics search preference.
const FIGURE_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "eps"];

/// Rewrite every resolvable `\includegraphics` argument to a canonical
/// `figures/..` path and plan the corresponding copies. Unresolvable
/// arguments produce a warning and are left untouched.
pub(crate) fn plan<T: SourceTree>(
    tree: &T,
    doc: &ResolvedDoc,
    root_dir: &Path,
    warnings: &mut Vec<Warning>,
) -> (Vec<Edit>, Vec<CopyJob>) {
    let mut namer = TargetNamer::default();
    let mut planned: HashSet<PathBuf> = HashSet::new();
    let mut edits = Vec::new();
    let mut copies = Vec::new();

    for cmd in tex::find_all(&doc.text, "includegraphics") {
        let arg = cmd.arg.trim();
        if arg.is_empty() {
            continue;
        }

        let Some(source) = locate_figure(tree, arg, doc.source_dir(cmd.start), root_dir) else {
            warnings.push(Warning::UnresolvedAsset {
                path: arg.to_string(),
                from: doc
                    .source_file(cmd.start)
                    .unwrap_or(Path::new(""))
                    .to_path_buf(),
            });
            continue;
        };

        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = namer.assign(&source, &base);

        edits.push(Edit {
            start: cmd.arg_start,
            end: cmd.arg_start + cmd.arg.len(),
            text: format!("{FIGURES_DIR}/{target}"),
        });
        if planned.insert(source.clone()) {
            copies.push(CopyJob {
                source,
                target: Path::new(FIGURES_DIR).join(&target),
            });
        }
    }

    (edits, copies)
}

/// Resolve a figure argument: the including file's directory first, then
/// the project root. Extensionless arguments probe the known formats.
fn locate_figure<T: SourceTree>(
    tree: &T,
    arg: &str,
    source_dir: Option<&Path>,
    root_dir: &Path,
) -> Option<PathBuf> {
    let has_extension = Path::new(arg).extension().is_some();
    for dir in [source_dir, Some(root_dir)].into_iter().flatten() {
        let candidate = lexical_normalize(&dir.join(arg));
        if has_extension {
            if tree.exists(&candidate) {
                return Some(candidate);
            }
        } else {
            for ext in FIGURE_EXTENSIONS {
                let probe = candidate.with_extension(ext);
                if tree.exists(&probe) {
                    return Some(probe);
                }
            }
        }
    }
    None
}

/// Allocates collision-free target filenames for copied files.
///
/// The first source to claim a filename gets it bare. A later distinct
/// source colliding on that name is qualified by prefixing its parent
/// directory names, innermost first, until the result is free; a numeric
/// suffix is the last resort. Purely a function of the call sequence, so
/// identical documents always produce identical names.
#[derive(Debug, Default)]
pub(crate) struct TargetNamer {
    by_source: HashMap<PathBuf, String>,
    taken: HashSet<String>,
}

impl TargetNamer {
    pub(crate) fn assign(&mut self, source: &Path, base: &str) -> String {
        if let Some(name) = self.by_source.get(source) {
            return name.clone();
        }

        let mut name = base.to_string();
        if self.taken.contains(&name) {
            for ancestor in ancestor_names(source) {
                name = format!("{ancestor}_{name}");
                if !self.taken.contains(&name) {
                    break;
                }
            }
        }
        if self.taken.contains(&name) {
            let (stem, ext) = split_name(&name);
            let mut counter = 2;
            name = loop {
                let candidate = match ext {
                    Some(ext) => format!("{stem}-{counter}.{ext}"),
                    None => format!("{stem}-{counter}"),
                };
                if !self.taken.contains(&candidate) {
                    break candidate;
                }
                counter += 1;
            };
        }

        self.taken.insert(name.clone());
        self.by_source.insert(source.to_path_buf(), name.clone());
        name
    }
}

/// Parent directory names of `source`, innermost first.
fn ancestor_names(source: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut dir = source.parent();
    while let Some(d) = dir {
        match d.file_name() {
            Some(name) => out.push(name.to_string_lossy().into_owned()),
            None => break,
        }
        dir = d.parent();
    }
    out
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}
