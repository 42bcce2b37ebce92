//! Depth-first resolution of `\input`/`\include` directives.
//!
//! Produces the document body as one in-memory string, with a span map
//! recording which source file each byte range came from. Later passes use
//! the spans to resolve relative figure and bibliography paths against the
//! directory of the file that actually referenced them — the flattened
//! output lives somewhere else entirely.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::source::{SourceTree, lexical_normalize};
use crate::tex;
use crate::util::{decode_text, escape_accents};

use super::Warning;

/// The fully-inlined document body.
#[derive(Debug, Clone)]
pub struct ResolvedDoc {
    pub text: String,
    /// Non-overlapping, contiguous ranges in `text`, each tagged with the
    /// source file that produced it. Sorted by position.
    pub spans: Vec<SourceSpan>,
}

/// A byte range of resolved text attributed to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub file: PathBuf,
}

impl ResolvedDoc {
    /// Source file owning the text at byte `pos`.
    pub fn source_file(&self, pos: usize) -> Option<&Path> {
        let idx = self.spans.partition_point(|s| s.end <= pos);
        self.spans
            .get(idx)
            .filter(|s| s.start <= pos)
            .map(|s| s.file.as_path())
    }

    /// Directory of the source file owning the text at byte `pos`.
    pub fn source_dir(&self, pos: usize) -> Option<&Path> {
        self.source_file(pos)
            .map(|f| f.parent().unwrap_or(Path::new("")))
    }
}

/// Resolve the inclusion graph rooted at `root` into a single body.
///
/// Directives are spliced in place, depth-first, preserving document order
/// and the including line's indentation. Commented directives stay verbatim.
/// A missing include file is a warning (the directive line is kept); a file
/// that transitively includes itself is fatal.
pub fn resolve_includes<T: SourceTree>(
    tree: &T,
    root: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<ResolvedDoc> {
    let root = lexical_normalize(root);
    if !tree.exists(&root) {
        return Err(Error::RootNotFound(root));
    }

    let mut builder = Builder::default();
    let mut stack = Vec::new();
    resolve_file(tree, &root, "", &mut stack, &mut builder, warnings)?;
    Ok(builder.finish())
}

/// Accumulates resolved text, merging adjacent pushes from the same file
/// into one span.
#[derive(Debug, Default)]
struct Builder {
    text: String,
    spans: Vec<SourceSpan>,
}

impl Builder {
    fn push(&mut self, s: &str, file: &Path) {
        if s.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(s);
        match self.spans.last_mut() {
            Some(last) if last.end == start && last.file == file => {
                last.end = self.text.len();
            }
            _ => self.spans.push(SourceSpan {
                start,
                end: self.text.len(),
                file: file.to_path_buf(),
            }),
        }
    }

    fn finish(self) -> ResolvedDoc {
        ResolvedDoc {
            text: self.text,
            spans: self.spans,
        }
    }
}

fn resolve_file<T: SourceTree>(
    tree: &T,
    path: &Path,
    indent: &str,
    stack: &mut Vec<PathBuf>,
    b: &mut Builder,
    warnings: &mut Vec<Warning>,
) -> Result<()> {
    stack.push(path.to_path_buf());

    let bytes = tree.read(path)?;
    let content = escape_accents(&decode_text(&bytes)).into_owned();
    let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();

    for (i, line) in content.split('\n').enumerate() {
        if i > 0 {
            b.push("\n", path);
        }
        splice_line(tree, line, path, &dir, indent, stack, b, warnings)?;
    }

    stack.pop();
    Ok(())
}

/// Emit one line, splicing the contents of any inclusion directive it
/// carries. Invoked recursively on the remainder when a directive is
/// followed by more text on the same line.
fn splice_line<T: SourceTree>(
    tree: &T,
    line: &str,
    file: &Path,
    dir: &Path,
    indent: &str,
    stack: &mut Vec<PathBuf>,
    b: &mut Builder,
    warnings: &mut Vec<Warning>,
) -> Result<()> {
    let trimmed = line.trim_start();
    let Some(cmd) = first_include_directive(line) else {
        if !trimmed.is_empty() {
            b.push(indent, file);
        }
        b.push(line, file);
        return Ok(());
    };

    let target = resolve_include_path(dir, cmd.arg);
    if stack.contains(&target) {
        return Err(Error::cycle(stack, &target));
    }
    if !tree.exists(&target) {
        warnings.push(Warning::MissingInclude {
            path: target,
            from: file.to_path_buf(),
        });
        b.push(indent, file);
        b.push(line, file);
        return Ok(());
    }

    let prefix = &line[..cmd.start];
    if prefix.trim().is_empty() {
        // Directive alone on the line: included lines inherit its indent.
        let child_indent = format!("{indent}{prefix}");
        resolve_file(tree, &target, &child_indent, stack, b, warnings)?;
    } else {
        b.push(indent, file);
        b.push(prefix, file);
        resolve_file(tree, &target, indent, stack, b, warnings)?;
    }

    let suffix = &line[cmd.end..];
    if !suffix.trim().is_empty() {
        splice_line(tree, suffix, file, dir, "", stack, b, warnings)?;
    }
    Ok(())
}

/// Earliest non-commented `\input`/`\include` directive in a line.
fn first_include_directive(line: &str) -> Option<tex::Command<'_>> {
    let input = tex::find_command(line, "input", 0);
    let include = tex::find_command(line, "include", 0);
    match (input, include) {
        (Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Join a directive argument against the including file's directory,
/// appending `.tex` when the argument has no extension.
fn resolve_include_path(dir: &Path, arg: &str) -> PathBuf {
    let arg = arg.trim();
    let mut path = dir.join(arg);
    if path.extension().is_none() {
        path.set_extension("tex");
    }
    lexical_normalize(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTree;

    fn resolve(tree: &MemoryTree, root: &str) -> (ResolvedDoc, Vec<Warning>) {
        let mut warnings = Vec::new();
        let doc = resolve_includes(tree, Path::new(root), &mut warnings).unwrap();
        (doc, warnings)
    }

    #[test]
    fn test_single_file_passthrough() {
        let tree = MemoryTree::new().with_file("p/main.tex", "line one\nline two\n");
        let (doc, warnings) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "line one\nline two\n");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_include_spliced_in_place() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "before\n\\input{intro}\nafter\n")
            .with_file("p/intro.tex", "INTRO BODY");
        let (doc, _) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "before\nINTRO BODY\nafter\n");
    }

    #[test]
    fn test_nested_include_preserves_order() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "A\n\\input{mid}\nD\n")
            .with_file("p/mid.tex", "B\n\\input{deep}\n")
            .with_file("p/deep.tex", "C");
        let (doc, _) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "A\nB\nC\n\nD\n");
    }

    #[test]
    fn test_indentation_inherited() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "\\begin{x}\n  \\input{inner}\n\\end{x}\n")
            .with_file("p/inner.tex", "one\ntwo");
        let (doc, _) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "\\begin{x}\n  one\n  two\n\\end{x}\n");
    }

    #[test]
    fn test_commented_directive_untouched() {
        let tree = MemoryTree::new().with_file("p/main.tex", "% \\input{gone}\nreal\n");
        let (doc, warnings) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "% \\input{gone}\nreal\n");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_include_warns_and_keeps_line() {
        let tree = MemoryTree::new().with_file("p/main.tex", "\\input{nowhere}\n");
        let (doc, warnings) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "\\input{nowhere}\n");
        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0], Warning::MissingInclude { path, .. }
            if path == &PathBuf::from("p/nowhere.tex")));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let tree = MemoryTree::new()
            .with_file("p/a.tex", "\\input{b}\n")
            .with_file("p/b.tex", "\\input{a}\n");
        let mut warnings = Vec::new();
        let err = resolve_includes(&tree, Path::new("p/a.tex"), &mut warnings).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cyclic inclusion"), "{msg}");
        assert!(msg.contains("a.tex -> p/b.tex -> p/a.tex"), "{msg}");
    }

    #[test]
    fn test_self_include_is_fatal() {
        let tree = MemoryTree::new().with_file("p/a.tex", "\\input{a}\n");
        let mut warnings = Vec::new();
        assert!(resolve_includes(&tree, Path::new("p/a.tex"), &mut warnings).is_err());
    }

    #[test]
    fn test_extension_handling() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "\\input{sub/chapter.tex}\n")
            .with_file("p/sub/chapter.tex", "X");
        let (doc, _) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "X\n");
    }

    #[test]
    fn test_span_attribution() {
        let tree = MemoryTree::new()
            .with_file("p/main.tex", "head\n\\input{sub/part}\ntail\n")
            .with_file("p/sub/part.tex", "BODY");
        let (doc, _) = resolve(&tree, "p/main.tex");

        let body_pos = doc.text.find("BODY").unwrap();
        assert_eq!(doc.source_dir(body_pos), Some(Path::new("p/sub")));
        assert_eq!(doc.source_file(0), Some(Path::new("p/main.tex")));
        let tail_pos = doc.text.find("tail").unwrap();
        assert_eq!(doc.source_dir(tail_pos), Some(Path::new("p")));
    }

    #[test]
    fn test_latin1_and_accents_normalized() {
        // 0xF1 is 'ñ' in Windows-1252.
        let tree = MemoryTree::new().with_file("p/main.tex", b"Espa\xf1a\n".to_vec());
        let (doc, _) = resolve(&tree, "p/main.tex");
        assert_eq!(doc.text, "Espa{\\~n}a\n");
    }
}
