//! Gapless renumbering of a diffed `thebibliography` environment.
//!
//! latexdiff leaves deleted entries in place, so numbering derived from
//! position shows gaps where entries were removed. This pass walks the
//! environment with a marker state machine, comments deleted entries out
//! entirely, and relabels the survivors `[{1}]`, `[{2}]`, .. in order. The
//! widest-label argument is updated to the surviving count.

use crate::tex;
use crate::util::{Edit, apply_edits};

use super::markup::{self, Marker, MarkerKind};

/// Markup state while scanning the environment body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unchanged,
    Inserted,
    Deleted,
}

impl State {
    fn next(self, kind: MarkerKind) -> State {
        match kind {
            MarkerKind::AddBegin => State::Inserted,
            MarkerKind::DelBegin => State::Deleted,
            MarkerKind::AddEnd | MarkerKind::DelEnd => State::Unchanged,
        }
    }
}

/// Renumber the first `thebibliography` environment in `text`. Text without
/// one passes through unchanged.
pub(crate) fn renumber_bibliography(text: &str) -> String {
    let Some(env) = tex::find_environment(text, "thebibliography", 0) else {
        return text.to_string();
    };
    let bytes = text.as_bytes();

    let widest = widest_group(bytes, env.inner_start);
    let scan_from = widest.map_or(env.inner_start, |(_, close)| close + 1);

    let mut items = Vec::new();
    let mut from = scan_from;
    while let Some(cmd) = tex::find_command(text, "bibitem", from) {
        if cmd.start >= env.inner_end {
            break;
        }
        from = cmd.end;
        items.push(cmd);
    }

    // Dangling markers are common here: unwrapping the environment opener
    // leaves a lone \DIFaddend behind. Starting from Unchanged absorbs them.
    let inner_markers: Vec<Marker> = markup::markers(text)
        .into_iter()
        .filter(|m| m.start >= env.inner_start && m.start < env.inner_end)
        .collect();

    let mut edits = Vec::new();
    let mut surviving = 0usize;
    let mut state = State::Unchanged;
    let mut marker_idx = 0;

    for (i, item) in items.iter().enumerate() {
        while marker_idx < inner_markers.len() && inner_markers[marker_idx].start < item.start {
            state = state.next(inner_markers[marker_idx].kind);
            marker_idx += 1;
        }
        let entry_end = items.get(i + 1).map_or(env.inner_end, |next| next.start);

        if state == State::Deleted {
            let mut replacement = comment_out(&text[item.start..entry_end]);
            // Keep whatever follows the entry on its own line, or the
            // comment swallows it.
            if !replacement.ends_with('\n') {
                replacement.push('\n');
            }
            edits.push(Edit {
                start: item.start,
                end: entry_end,
                text: replacement,
            });
        } else {
            surviving += 1;
            edits.push(Edit {
                start: item.start,
                end: item.end,
                text: format!("\\bibitem [{{{surviving}}}] {{{}}}", item.arg.trim()),
            });
        }
    }

    if surviving > 0 {
        if let Some((open, close)) = widest {
            edits.push(Edit {
                start: open + 1,
                end: close,
                text: surviving.to_string(),
            });
        }
    }

    apply_edits(text, edits)
}

/// The `{..}` widest-label group right after `\begin{thebibliography}`,
/// as (open, close) brace offsets.
fn widest_group(bytes: &[u8], inner_start: usize) -> Option<(usize, usize)> {
    let mut i = inner_start;
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }
    if bytes.get(i) == Some(&b'{') {
        return tex::match_brace(bytes, i).map(|close| (i, close));
    }
    None
}

/// Comment a deleted entry out, line by line, in latexdiff's own style.
/// Blank lines and lines already commented pass through.
fn comment_out(span: &str) -> String {
    let mut out = String::with_capacity(span.len() + 64);
    for (i, line) in span.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim().is_empty() || line.trim_start().starts_with('%') {
            out.push_str(line);
        } else {
            out.push_str(markup::DEL_CMD_PREFIX);
            out.push_str(line);
            out.push_str(" %%%");
        }
    }
    out
}
