//! Lexical model of latexdiff markup.
//!
//! latexdiff brackets inserted runs with `\DIFaddbegin .. \DIFaddend` and
//! deleted runs with `\DIFdelbegin .. \DIFdelend`, and comments out deleted
//! command lines behind a `%DIFDELCMD < ` prefix. The repair passes reason
//! about those block markers; this module finds them.

use memchr::memmem;

use crate::tex;

pub(crate) const ADD_BEGIN: &str = r"\DIFaddbegin";
pub(crate) const ADD_END: &str = r"\DIFaddend";
pub(crate) const DEL_BEGIN: &str = r"\DIFdelbegin";
pub(crate) const DEL_END: &str = r"\DIFdelend";

/// Line prefix latexdiff uses for commented-out deleted commands.
pub(crate) const DEL_CMD_PREFIX: &str = "%DIFDELCMD < ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    AddBegin,
    AddEnd,
    DelBegin,
    DelEnd,
}

impl MarkerKind {
    const ALL: [MarkerKind; 4] = [
        MarkerKind::AddBegin,
        MarkerKind::AddEnd,
        MarkerKind::DelBegin,
        MarkerKind::DelEnd,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            MarkerKind::AddBegin => ADD_BEGIN,
            MarkerKind::AddEnd => ADD_END,
            MarkerKind::DelBegin => DEL_BEGIN,
            MarkerKind::DelEnd => DEL_END,
        }
    }

    /// Whether this marker opens a markup block.
    pub(crate) fn is_begin(self) -> bool {
        matches!(self, MarkerKind::AddBegin | MarkerKind::DelBegin)
    }
}

/// A block marker occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Marker {
    pub kind: MarkerKind,
    pub start: usize,
    /// One past the marker text.
    pub end: usize,
}

/// Every genuine block marker in `text`, in document order. Occurrences
/// inside comments and the `..FL` float variants do not count.
pub(crate) fn markers(text: &str) -> Vec<Marker> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    for kind in MarkerKind::ALL {
        let name = kind.as_str();
        for start in memmem::find_iter(bytes, name) {
            if !tex::is_command_start(bytes, start, name.len() - 1) {
                continue;
            }
            if tex::is_commented(text, start) {
                continue;
            }
            out.push(Marker {
                kind,
                start,
                end: start + name.len(),
            });
        }
    }
    out.sort_by_key(|m| m.start);
    out
}

/// The block marker starting exactly at `pos`, if any.
pub(crate) fn marker_at(text: &str, pos: usize) -> Option<Marker> {
    let bytes = text.as_bytes();
    for kind in MarkerKind::ALL {
        let name = kind.as_str();
        if text[pos..].starts_with(name) && tex::is_command_start(bytes, pos, name.len() - 1) {
            return Some(Marker {
                kind,
                start: pos,
                end: pos + name.len(),
            });
        }
    }
    None
}

/// Undo latexdiff's wrapping of the `\begin{thebibliography}` opener.
///
/// When the widest-label argument changes, latexdiff deletes the old opener
/// and inserts the new one, leaving `\DIFdelend \DIFaddbegin` immediately
/// before `\begin{thebibliography}`. That hides the opener inside markup,
/// so the pair is dropped and the opener restored to plain text. Dangling
/// counterpart markers are left behind; the later passes tolerate them.
pub(crate) fn unwrap_bib_begin(text: &str) -> String {
    const BEGIN: &str = "begin{thebibliography}";
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for pos in memmem::find_iter(bytes, BEGIN) {
        let begin_start = if pos > 0 && bytes[pos - 1] == b'\\' {
            pos - 1
        } else {
            pos
        };
        let Some(add_start) = marked_end(text, begin_start, ADD_BEGIN) else {
            continue;
        };
        let Some(del_start) = marked_end(text, add_start, DEL_END) else {
            continue;
        };
        if del_start < cursor {
            continue;
        }
        out.push_str(&text[cursor..del_start]);
        out.push_str("\\begin{thebibliography}");
        cursor = pos + BEGIN.len();
    }
    out.push_str(&text[cursor..]);
    out
}

/// If the text before `end`, ignoring trailing whitespace, ends with
/// `marker`, return the marker's start offset.
fn marked_end(text: &str, end: usize, marker: &str) -> Option<usize> {
    let trimmed = trim_ws_end(text, end);
    text[..trimmed]
        .ends_with(marker)
        .then(|| trimmed - marker.len())
}

fn trim_ws_end(text: &str, mut end: usize) -> usize {
    let bytes = text.as_bytes();
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    end
}
