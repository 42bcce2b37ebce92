//! Whitespace and placement repair around latexdiff markup.
//!
//! latexdiff is careless with spacing at markup boundaries: citation
//! commands end up separated from their argument by a marker, markers get
//! glued to each other, and inserted runs carry stray line breaks. Each
//! pass here fixes one of those, and none of them touches whitespace away
//! from markup. Paragraph breaks (a blank line) always survive, and a
//! newline that terminates a comment line is never collapsed.

use memchr::memmem;

use crate::tex;
use crate::util::{Edit, apply_edits};

use super::markup;

pub(crate) fn fix_spacing(text: &str) -> String {
    let text = fix_split_citations(text);
    let text = normalize_marker_spacing(&text);
    let text = join_inline_groups(&text);
    tighten_env_delimiters(&text)
}

// ============================================================================
// Split citations
// ============================================================================

/// Reunite citation commands with their argument across markup boundaries.
///
/// `\cite \DIFaddbegin {key} \DIFaddend` becomes
/// `\DIFaddbegin \cite{key} \DIFaddend`: begin markers move in front of the
/// command, end markers after it, and the command itself is rebuilt tight.
/// A command already adjacent to its argument is left alone.
fn fix_split_citations(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut edits = Vec::new();
    for name in tex::CITE_COMMANDS {
        let needle = format!("\\{name}");
        for start in memmem::find_iter(bytes, needle.as_bytes()) {
            if !tex::is_command_start(bytes, start, name.len()) {
                continue;
            }
            if tex::is_commented(text, start) {
                continue;
            }
            if let Some(edit) = repair_unit(text, start, name) {
                edits.push(edit);
            }
        }
    }
    apply_edits(text, edits)
}

/// Walk forward from a citation command name, collecting markers and
/// option groups, until its `{keys}` argument. Returns the rebuilt command
/// when something actually separated the parts.
fn repair_unit(text: &str, start: usize, name: &str) -> Option<Edit> {
    let bytes = text.as_bytes();
    let mut cursor = start + 1 + name.len();
    let mut lead: Vec<&'static str> = Vec::new();
    let mut tail: Vec<&'static str> = Vec::new();
    let mut opts: Vec<&str> = Vec::new();
    let mut broken = false;

    loop {
        let mut newlines = 0;
        while let Some(&b) = bytes.get(cursor) {
            if b == b'\n' {
                newlines += 1;
            } else if !b.is_ascii_whitespace() {
                break;
            }
            cursor += 1;
        }
        // A blank line ends the unit; never pull an argument across a
        // paragraph break.
        if newlines >= 2 {
            return None;
        }
        if newlines > 0 {
            broken = true;
        }

        match bytes.get(cursor)? {
            b'\\' => {
                let m = markup::marker_at(text, cursor)?;
                if m.kind.is_begin() {
                    lead.push(m.kind.as_str());
                } else {
                    tail.push(m.kind.as_str());
                }
                broken = true;
                cursor = m.end;
            }
            b'[' => {
                let close = tex::find_bracket_close(bytes, cursor)?;
                opts.push(&text[cursor..close + 1]);
                cursor = close + 1;
            }
            b'{' => {
                let close = tex::match_brace(bytes, cursor)?;
                if !broken {
                    return None;
                }
                let mut fixed = String::new();
                for m in &lead {
                    fixed.push_str(m);
                    fixed.push(' ');
                }
                fixed.push('\\');
                fixed.push_str(name);
                for opt in &opts {
                    fixed.push_str(opt);
                }
                fixed.push_str(&text[cursor..close + 1]);
                for m in &tail {
                    fixed.push(' ');
                    fixed.push_str(m);
                }
                return Some(Edit {
                    start,
                    end: close + 1,
                    text: fixed,
                });
            }
            _ => return None,
        }
    }
}

// ============================================================================
// Marker spacing
// ============================================================================

/// Normalize whitespace at block marker boundaries: every marker gets a
/// single separator after it, end markers also before. TeX eats spaces
/// after a control word, so an inserted separator never changes rendering.
fn normalize_marker_spacing(text: &str) -> String {
    let marks = markup::markers(text);
    if marks.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in &marks {
        emit_gap(&mut out, &text[cursor..m.start], cursor > 0, !m.kind.is_begin());
        out.push_str(m.kind.as_str());
        cursor = m.end;
    }

    let tail = &text[cursor..];
    let rest = tail.trim_start();
    let ws = &tail[..tail.len() - rest.len()];
    if !ws.is_empty() {
        out.push_str(collapse_ws(ws, rest.is_empty(), false));
    } else if !rest.is_empty() {
        out.push(' ');
    }
    out.push_str(rest);
    out
}

/// Emit the text between two markers (or before the first), collapsing the
/// boundary whitespace the adjacent markers are entitled to.
fn emit_gap(out: &mut String, gap: &str, after_marker: bool, before_end: bool) {
    if gap.chars().all(|c| c.is_ascii_whitespace()) {
        if after_marker || before_end {
            out.push_str(collapse_ws(gap, false, tail_line_commented(out)));
        } else {
            out.push_str(gap);
        }
        return;
    }

    let trimmed = gap.trim_start();
    let (lead, rest) = gap.split_at(gap.len() - trimmed.len());
    let core = rest.trim_end();
    let (core, trail) = rest.split_at(core.len());

    if after_marker {
        out.push_str(collapse_ws(lead, false, false));
    } else {
        out.push_str(lead);
    }
    out.push_str(core);
    if before_end {
        out.push_str(collapse_ws(trail, false, tail_line_commented(out)));
    } else {
        out.push_str(trail);
    }
}

/// Collapse a whitespace run to one separator. A paragraph break stays a
/// paragraph break; a line break survives when the line it ends is a
/// comment (or the text ends) since collapsing it would change meaning.
fn collapse_ws(ws: &str, at_eof: bool, keep_line_break: bool) -> &'static str {
    let newlines = ws.bytes().filter(|&b| b == b'\n').count();
    if newlines >= 2 {
        "\n\n"
    } else if newlines == 1 && (keep_line_break || at_eof) {
        "\n"
    } else {
        " "
    }
}

/// Whether the last line currently in `out` carries an unescaped `%`.
fn tail_line_commented(out: &str) -> bool {
    let line = match out.rfind('\n') {
        Some(i) => &out[i + 1..],
        None => out,
    };
    tex::comment_start(line).is_some()
}

// ============================================================================
// Inline groups and environment delimiters
// ============================================================================

/// Replace a lone line break after a `\DIFadd{..}`/`\DIFdel{..}` group with
/// a space, so a run latexdiff split across lines reads as one phrase.
fn join_inline_groups(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut edits = Vec::new();
    for name in ["DIFadd", "DIFdel"] {
        let needle = format!("\\{name}");
        for start in memmem::find_iter(bytes, needle.as_bytes()) {
            if !tex::is_command_start(bytes, start, name.len()) {
                continue;
            }
            let open = start + 1 + name.len();
            if bytes.get(open) != Some(&b'{') {
                continue;
            }
            if tex::is_commented(text, start) {
                continue;
            }
            let Some(close) = tex::match_brace(bytes, open) else {
                continue;
            };

            let mut end = close + 1;
            let mut newlines = 0;
            while let Some(&b) = bytes.get(end) {
                if b == b'\n' {
                    newlines += 1;
                } else if !b.is_ascii_whitespace() {
                    break;
                }
                end += 1;
            }
            if newlines == 1 && end < bytes.len() {
                edits.push(Edit {
                    start: close + 1,
                    end,
                    text: " ".to_string(),
                });
            }
        }
    }
    apply_edits(text, edits)
}

/// Drop stray whitespace between `\begin`/`\end` and their `{..}` argument.
fn tighten_env_delimiters(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut edits = Vec::new();
    for name in ["begin", "end"] {
        let needle = format!("\\{name}");
        for start in memmem::find_iter(bytes, needle.as_bytes()) {
            if !tex::is_command_start(bytes, start, name.len()) {
                continue;
            }
            if tex::is_commented(text, start) {
                continue;
            }
            let ws_start = start + 1 + name.len();
            let mut end = ws_start;
            let mut newlines = 0;
            while let Some(&b) = bytes.get(end) {
                if b == b'\n' {
                    newlines += 1;
                } else if !b.is_ascii_whitespace() {
                    break;
                }
                end += 1;
            }
            if end > ws_start && newlines < 2 && bytes.get(end) == Some(&b'{') {
                edits.push(Edit {
                    start: ws_start,
                    end,
                    text: String::new(),
                });
            }
        }
    }
    apply_edits(text, edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reunites_citation_split_by_insert_marker() {
        let text = "see \\cite \\DIFaddbegin {key} \\DIFaddend rest\n";
        assert_eq!(
            fix_spacing(text),
            "see \\DIFaddbegin \\cite{key} \\DIFaddend rest\n"
        );
    }

    #[test]
    fn test_end_marker_moves_past_argument() {
        let text = "\\DIFaddbegin \\citep \\DIFaddend [p.~3] {k} x\n";
        let out = fix_split_citations(text);
        assert!(out.contains("\\citep[p.~3]{k} \\DIFaddend"));
    }

    #[test]
    fn test_plain_citation_untouched() {
        let text = "\\cite {a} and \\citet[ch.~2]{b}\n";
        assert_eq!(fix_spacing(text), text);
    }

    #[test]
    fn test_never_pulls_argument_across_paragraph() {
        let text = "\\cite \\DIFaddbegin\n\n{key}\n";
        assert_eq!(fix_split_citations(text), text);
    }

    #[test]
    fn test_adjacent_markers_separated() {
        let text = "a \\DIFdelend\\DIFaddbegin b\n";
        assert_eq!(normalize_marker_spacing(text), "a \\DIFdelend \\DIFaddbegin b\n");
    }

    #[test]
    fn test_marker_line_breaks_collapse_to_spaces() {
        let text = "x\n\\DIFaddbegin\nnew \\DIFaddend\ny\n";
        assert_eq!(
            normalize_marker_spacing(text),
            "x\n\\DIFaddbegin new \\DIFaddend y\n"
        );
    }

    #[test]
    fn test_paragraph_break_survives() {
        let text = "a \\DIFaddbegin x \\DIFaddend\n\nNext paragraph.\n";
        assert_eq!(normalize_marker_spacing(text), text);
    }

    #[test]
    fn test_comment_line_never_absorbs_marker() {
        let text = "%DIFDELCMD < \\bibitem{b} %%%\n\\DIFdelend x\n";
        assert_eq!(normalize_marker_spacing(text), text);
    }

    #[test]
    fn test_joins_inline_groups_across_single_break() {
        let text = "\\DIFadd{new}\n\\DIFadd{words}\n";
        assert_eq!(join_inline_groups(text), "\\DIFadd{new} \\DIFadd{words}\n");
    }

    #[test]
    fn test_inline_group_paragraph_kept() {
        let text = "\\DIFadd{end of par}\n\nNext.\n";
        assert_eq!(join_inline_groups(text), text);
    }

    #[test]
    fn test_tightens_environment_delimiters() {
        let text = "\\begin {itemize}\n\\item x\n\\end {itemize}\n";
        assert_eq!(
            tighten_env_delimiters(text),
            "\\begin{itemize}\n\\item x\n\\end{itemize}\n"
        );
    }
}
