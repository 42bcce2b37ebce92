//! Citation collection and bibliography inlining.
//!
//! Two jobs, selected by the `--flatten-bib` flag: replace the document's
//! bibliography source with an explicit `thebibliography` block restricted
//! to cited entries, or (when not flattening) plan copies of the referenced
//! `.bib` databases next to the output and rewrite the `\bibliography`
//! argument to the copied names.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use memchr::memmem;

use crate::error::{Error, Result};
use crate::source::{SourceTree, lexical_normalize};
use crate::tex;
use crate::util::Edit;

use super::assets::TargetNamer;
use super::include::ResolvedDoc;
use super::{CopyJob, Warning};

/// Style-compatibility preamble emitted before an inlined bibliography.
///
/// REVTeX-flavored `.bbl` files lean on internal macros that are undefined
/// once the formatted entries are inlined into a plain document. These
/// `\providecommand` fallbacks keep the inlined block compilable without
/// changing rendered output.
const BIB_PREAMBLE: &str = r"\makeatletter
\providecommand \@ifxundefined [1]{%
 \@ifx{#1\undefined}
}%
\providecommand \@ifnum [1]{%
 \ifnum #1\expandafter \@firstoftwo
 \else \expandafter \@secondoftwo
 \fi
}%
\providecommand \@ifx [1]{%
 \ifx #1\expandafter \@firstoftwo
 \else \expandafter \@secondoftwo
 \fi
}%
\providecommand \natexlab [1]{#1}%
\providecommand \enquote  [1]{``#1''}%
\providecommand \bibnamefont  [1]{#1}%
\providecommand \bibfnamefont [1]{#1}%
\providecommand \citenamefont [1]{#1}%
\providecommand \href@noop [0]{\@secondoftwo}%
\providecommand \href [0]{\begingroup \@sanitize@url \@href}%
\providecommand \@href[1]{\@@startlink{#1}\@@href}%
\providecommand \@@href[1]{\endgroup#1\@@endlink}%
\providecommand \@sanitize@url [0]{\catcode `\\12\catcode `\$12\catcode
  `\&12\catcode `\#12\catcode `\^12\catcode `\_12\catcode `\%12\relax}%
\providecommand \@@startlink[1]{}%
\providecommand \@@endlink[0]{}%
\providecommand \url  [0]{\begingroup\@sanitize@url \@url }%
\providecommand \@url [1]{\endgroup\@href {#1}{\urlprefix }}%
\providecommand \urlprefix  [0]{URL }%
\providecommand \Eprint [0]{\href }%
\providecommand \doibase [0]{https://doi.org/}%
\providecommand \selectlanguage [0]{\@gobble}%
\providecommand \bibinfo  [0]{\@secondoftwo}%
\providecommand \bibfield  [0]{\@secondoftwo}%
\providecommand \translation [1]{[#1]}%
\providecommand \BibitemOpen [0]{}%
\providecommand \bibitemStop [0]{}%
\providecommand \bibitemNoStop [0]{.\EOS\space}%
\providecommand \EOS [0]{\spacefactor3000\relax}%
\providecommand \BibitemShut  [1]{\csname bibitem#1\endcsname}%
\let\auto@bib@innerbib\@empty
%</preamble>
";

/// Citation keys in strict first-appearance order.
///
/// Built in one left-to-right pass over the resolved body; the index map
/// and the ordered key list stay consistent by construction.
#[derive(Debug, Clone, Default)]
pub struct CitationOrder {
    keys: Vec<String>,
    index: HashMap<String, usize>,
}

impl CitationOrder {
    /// Collect keys from every recognized citation command in `text`.
    pub fn collect(text: &str) -> Self {
        let mut order = CitationOrder::default();
        for cmd in tex::cite_commands(text) {
            for key in cmd.arg_list() {
                order.insert(key);
            }
        }
        order
    }

    fn insert(&mut self, key: &str) {
        if !self.index.contains_key(key) {
            self.index.insert(key.to_string(), self.keys.len());
            self.keys.push(key.to_string());
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 1-based first-appearance label for `key`.
    pub fn label(&self, key: &str) -> Option<usize> {
        self.index.get(key).map(|i| i + 1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One formatted entry extracted from a `thebibliography` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BblEntry {
    pub key: String,
    /// Interior of the optional `[..]` label, verbatim.
    pub label: Option<String>,
    pub body: String,
}

/// Parse a `thebibliography` environment out of `.bbl`-style text.
///
/// Returns the `\begin{thebibliography}{..}` head verbatim (widest-label
/// argument included) and the entries in source order.
pub(crate) fn parse_bbl(bbl: &str) -> Option<(String, Vec<BblEntry>)> {
    let env = tex::find_environment(bbl, "thebibliography", 0)?;
    let head_end = widest_group_end(bbl, env.inner_start).unwrap_or(env.inner_start);
    let entries = parse_entries(&bbl[..env.inner_end], head_end);
    Some((bbl[env.start..head_end].to_string(), entries))
}

/// End offset of the `{widest}` group following a bibliography `\begin`,
/// if one is present.
fn widest_group_end(text: &str, inner_start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut pos = inner_start;
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'{') {
        tex::match_brace(bytes, pos).map(|close| close + 1)
    } else {
        None
    }
}

fn parse_entries(text: &str, from: usize) -> Vec<BblEntry> {
    let mut items = Vec::new();
    let mut pos = from;
    while let Some(cmd) = tex::find_command(text, "bibitem", pos) {
        pos = cmd.end;
        items.push(cmd);
    }

    let mut out = Vec::with_capacity(items.len());
    for (i, cmd) in items.iter().enumerate() {
        let body_end = items.get(i + 1).map_or(text.len(), |next| next.start);
        out.push(BblEntry {
            key: cmd.arg.trim().to_string(),
            label: cmd.opts.first().map(|s| s.to_string()),
            body: text[cmd.end..body_end].trim().to_string(),
        });
    }
    out
}

/// Plan the single edit that replaces the document's bibliography source
/// with an inlined block. Returns `None` when the document references no
/// bibliography at all.
///
/// Source discovery order: a `thebibliography` environment already present
/// in the body wins; otherwise a `\bibliography{..}` directive triggers the
/// `bbl` provider.
pub(crate) fn plan_inline(
    text: &str,
    order: &CitationOrder,
    fix_numbers: bool,
    bbl: impl FnOnce() -> Result<String>,
    warnings: &mut Vec<Warning>,
) -> Result<Option<Edit>> {
    let (start, end, head, entries) =
        if let Some(env) = tex::find_environment(text, "thebibliography", 0) {
            let (head, entries) = parse_bbl(&text[env.start..env.end]).ok_or_else(|| {
                Error::MissingBibliography("malformed thebibliography environment".into())
            })?;
            (block_start(text, env.start), env.end, head, entries)
        } else if let Some(cmd) = tex::find_command(text, "bibliography", 0) {
            let bbl_text = bbl()?;
            let (head, entries) = parse_bbl(&bbl_text).ok_or_else(|| {
                Error::MissingBibliography(
                    "no thebibliography environment in formatted bibliography".into(),
                )
            })?;
            (cmd.start, cmd.end, head, entries)
        } else {
            return Ok(None);
        };

    if entries.is_empty() {
        return Err(Error::EmptyBibliography);
    }

    let items = select_entries(&entries, order, fix_numbers, warnings);
    if items.is_empty() {
        return Err(Error::EmptyBibliography);
    }

    Ok(Some(Edit {
        start,
        end,
        text: build_block(&head, &items),
    }))
}

/// Format the retained entries.
///
/// With `--fix-ref-numbers` the label is the key's first-appearance index,
/// so gaps appear where a cited key has no entry and later labels still
/// match their in-text position. Without it, entries keep database order
/// and their original labels; uncited entries are dropped unless nothing is
/// cited at all, in which case citedness cannot be established and every
/// entry is kept.
fn select_entries(
    entries: &[BblEntry],
    order: &CitationOrder,
    fix_numbers: bool,
    warnings: &mut Vec<Warning>,
) -> Vec<String> {
    let by_key: HashMap<&str, &BblEntry> =
        entries.iter().map(|e| (e.key.as_str(), e)).collect();

    for key in order.keys() {
        if !by_key.contains_key(key.as_str()) {
            warnings.push(Warning::MissingBibEntry { key: key.clone() });
        }
    }

    if fix_numbers && !order.is_empty() {
        order
            .keys()
            .iter()
            .filter_map(|key| {
                let entry = by_key.get(key.as_str())?;
                let n = order.label(key)?;
                Some(format!("\\bibitem [{{{n}}}] {{{key}}}{}", entry.body))
            })
            .collect()
    } else {
        entries
            .iter()
            .filter(|e| order.is_empty() || order.contains(&e.key))
            .map(|e| match &e.label {
                Some(label) => format!("\\bibitem [{label}] {{{}}}{}", e.key, e.body),
                None => format!("\\bibitem {{{}}}{}", e.key, e.body),
            })
            .collect()
    }
}

/// Extend an environment replacement backward over a compatibility preamble
/// left by an earlier run, so re-flattening swaps the whole block instead of
/// stacking preambles.
fn block_start(text: &str, env_start: usize) -> usize {
    let before = &text[..env_start];
    if let Some(pos) = memmem::rfind(before.as_bytes(), BIB_PREAMBLE.as_bytes()) {
        if before[pos + BIB_PREAMBLE.len()..].trim().is_empty() {
            return pos;
        }
    }
    env_start
}

fn build_block(head: &str, items: &[String]) -> String {
    let mut block = String::with_capacity(BIB_PREAMBLE.len() + head.len() + 64 * items.len());
    block.push_str(BIB_PREAMBLE);
    block.push('\n');
    block.push_str(head);
    for item in items {
        block.push('\n');
        block.push_str(item);
    }
    block.push('\n');
    block.push_str("\\end{thebibliography}");
    block
}

/// Plan `.bib` database copies for the non-flattened path: each referenced
/// database is copied next to the output and the `\bibliography` argument
/// is rewritten to the copied names.
pub(crate) fn plan_copies<T: SourceTree>(
    tree: &T,
    doc: &ResolvedDoc,
    root_dir: &Path,
    warnings: &mut Vec<Warning>,
) -> (Vec<Edit>, Vec<CopyJob>) {
    let mut namer = TargetNamer::default();
    let mut planned: HashSet<PathBuf> = HashSet::new();
    let mut edits = Vec::new();
    let mut copies = Vec::new();

    for cmd in tex::find_all(&doc.text, "bibliography") {
        let source_dir = doc.source_dir(cmd.start).map(Path::to_path_buf);
        let mut rewritten = Vec::new();
        let mut any_found = false;

        for name in cmd.arg_list() {
            match locate_database(tree, name, source_dir.as_deref(), root_dir) {
                Some(path) => {
                    let target = namer.assign(&path, &database_target_name(&path));
                    if planned.insert(path.clone()) {
                        copies.push(CopyJob {
                            source: path,
                            target: PathBuf::from(&target),
                        });
                    }
                    rewritten.push(target.trim_end_matches(".bib").to_string());
                    any_found = true;
                }
                None => {
                    warnings.push(Warning::MissingBibFile {
                        name: name.to_string(),
                    });
                    // Keep the unresolved name so the document still refers
                    // to whatever the author meant.
                    rewritten.push(name.to_string());
                }
            }
        }

        if any_found {
            edits.push(Edit {
                start: cmd.arg_start,
                end: cmd.arg_start + cmd.arg.len(),
                text: rewritten.join(","),
            });
        }
    }

    (edits, copies)
}

/// Locate a database named by a `\bibliography` argument: the including
/// file's directory first, then the project root, probing the bare name
/// before the `.bib`-suffixed one.
fn locate_database<T: SourceTree>(
    tree: &T,
    name: &str,
    source_dir: Option<&Path>,
    root_dir: &Path,
) -> Option<PathBuf> {
    for dir in [source_dir, Some(root_dir)].into_iter().flatten() {
        for candidate in [dir.join(name), dir.join(format!("{name}.bib"))] {
            let candidate = lexical_normalize(&candidate);
            if tree.exists(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn database_target_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.ends_with(".bib") {
        name
    } else {
        format!("{name}.bib")
    }
}
