//! Minimal LaTeX surface scanner.
//!
//! flatex never parses LaTeX in general. Both pipelines only care about a
//! finite set of command shapes — `\input`, `\include`, `\cite` and friends,
//! `\includegraphics`, `\bibitem`, environment delimiters — plus the comment
//! rule, so this module implements exactly that: byte-level scanning for
//! `\name [opt] {arg}` units with comment awareness. No macro expansion, no
//! grouping model, no math mode.

use memchr::memmem;
use memchr::memrchr;

/// Citation command names recognized by both pipelines.
///
/// Multi-key arguments are comma-separated. Anything outside this set
/// (`\citeauthor`, `\nocite`, custom macros) is deliberately ignored.
pub const CITE_COMMANDS: &[&str] = &["cite", "citep", "citet", "citealt", "citealp"];

/// A scanned command with its bracketed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Command name without the backslash.
    pub name: &'a str,
    /// Byte offset of the backslash.
    pub start: usize,
    /// One past the closing brace of the argument.
    pub end: usize,
    /// Interiors of `[..]` option groups preceding the argument (at most two).
    pub opts: Vec<&'a str>,
    /// Interior of the `{..}` argument group.
    pub arg: &'a str,
    /// Byte offset where the argument interior begins.
    pub arg_start: usize,
}

impl Command<'_> {
    /// Comma-split argument with surrounding whitespace trimmed.
    ///
    /// `\cite{a, b}` yields `["a", "b"]`. Empty fragments are dropped.
    pub fn arg_list(&self) -> Vec<&str> {
        self.arg
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Find the next `\name[..]{..}` command at or after `from`.
///
/// Matches the exact command name (a trailing letter disqualifies, so
/// searching for `cite` never matches `\citep`), skips occurrences inside
/// comments, and tolerates inline whitespace between the name, option
/// groups, and the argument — but not a blank line, which TeX would treat
/// as a paragraph break inside the command.
pub fn find_command<'a>(text: &'a str, name: &str, from: usize) -> Option<Command<'a>> {
    let bytes = text.as_bytes();
    let pattern = format!("\\{name}");
    let finder = memmem::Finder::new(pattern.as_bytes());

    let mut pos = from;
    while pos < bytes.len() {
        let start = pos + finder.find(&bytes[pos..])?;
        pos = start + 1;

        if !is_command_start(bytes, start, name.len()) || is_commented(text, start) {
            continue;
        }

        let name_end = start + 1 + name.len();
        if let Some(cmd) = parse_args(text, start, name_end, name) {
            return Some(cmd);
        }
    }
    None
}

/// All `\name[..]{..}` commands in the text, in document order.
pub fn find_all<'a>(text: &'a str, name: &str) -> Vec<Command<'a>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(cmd) = find_command(text, name, pos) {
        pos = cmd.end;
        out.push(cmd);
    }
    out
}

/// All recognized citation commands in the text, in document order.
pub fn cite_commands(text: &str) -> Vec<Command<'_>> {
    let mut out: Vec<Command<'_>> = Vec::new();
    for name in CITE_COMMANDS {
        out.extend(find_all(text, name));
    }
    out.sort_by_key(|c| c.start);
    out
}

/// Check that the backslash at `start` begins a command named by the
/// following `name_len` letters: not itself escaped, and not a prefix of a
/// longer command name.
pub(crate) fn is_command_start(bytes: &[u8], start: usize, name_len: usize) -> bool {
    // A backslash preceded by an odd run of backslashes is the tail of an
    // escape pair (`\\`), not a command start.
    let mut preceding = 0;
    while preceding < start && bytes[start - 1 - preceding] == b'\\' {
        preceding += 1;
    }
    if preceding % 2 == 1 {
        return false;
    }

    let name_end = start + 1 + name_len;
    !matches!(bytes.get(name_end), Some(b) if b.is_ascii_alphabetic())
}

/// Parse `[opt]` groups and the `{arg}` group following a command name.
fn parse_args<'a>(
    text: &'a str,
    start: usize,
    name_end: usize,
    name: &str,
) -> Option<Command<'a>> {
    let bytes = text.as_bytes();
    let mut opts = Vec::new();
    let mut cursor = name_end;

    loop {
        cursor = skip_inline_ws(bytes, cursor)?;
        match bytes.get(cursor)? {
            b'[' => {
                if opts.len() == 2 {
                    return None;
                }
                let close = find_bracket_close(bytes, cursor)?;
                opts.push(&text[cursor + 1..close]);
                cursor = close + 1;
            }
            b'{' => {
                let close = match_brace(bytes, cursor)?;
                let name_range_start = start + 1;
                return Some(Command {
                    name: &text[name_range_start..name_range_start + name.len()],
                    start,
                    end: close + 1,
                    opts,
                    arg: &text[cursor + 1..close],
                    arg_start: cursor + 1,
                });
            }
            _ => return None,
        }
    }
}

/// Skip spaces, tabs, and at most one newline. Returns `None` when a blank
/// line (two newlines) intervenes or the input ends.
fn skip_inline_ws(bytes: &[u8], mut pos: usize) -> Option<usize> {
    let mut newlines = 0;
    while let Some(&b) = bytes.get(pos) {
        match b {
            b' ' | b'\t' | b'\r' => pos += 1,
            b'\n' => {
                newlines += 1;
                if newlines > 1 {
                    return None;
                }
                pos += 1;
            }
            _ => return Some(pos),
        }
    }
    None
}

/// Offset of the `]` closing the bracket group opened at `open`, skipping
/// over nested `{..}` groups and escaped characters.
pub(crate) fn find_bracket_close(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes[open], b'[');
    let mut depth = 0usize;
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b']' if depth == 0 => return Some(pos),
            b'\n' if matches!(bytes.get(pos + 1), Some(b'\n')) => return None,
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Offset of the `}` matching the brace opened at `open`, handling nesting
/// and escaped braces.
pub fn match_brace(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes[open], b'{');
    let mut depth = 1usize;
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Whether `pos` falls inside a `%` comment on its line.
pub fn is_commented(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    let line_start = memrchr(b'\n', &bytes[..pos]).map_or(0, |i| i + 1);
    let mut i = line_start;
    while i < pos {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return true,
            _ => i += 1,
        }
    }
    false
}

/// Offset of the first unescaped `%` in a single line, if any.
pub fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

// ============================================================================
// Environments
// ============================================================================

/// Byte span of a `\begin{name} .. \end{name}` environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSpan {
    /// Offset of `\begin`'s backslash.
    pub start: usize,
    /// One past `\end{name}`'s closing brace.
    pub end: usize,
    /// First offset after `\begin{name}`.
    pub inner_start: usize,
    /// Offset of `\end`'s backslash.
    pub inner_end: usize,
}

/// Find the next `name` environment at or after `from`.
///
/// Tolerates whitespace between `\begin`/`\end` and their brace group, a
/// shape line-based differs regularly produce. Does not handle nesting of
/// the same environment name, which the recognized environments never do.
pub fn find_environment(text: &str, name: &str, from: usize) -> Option<EnvSpan> {
    let begin = find_env_delimiter(text, "begin", name, from)?;
    let end = find_env_delimiter(text, "end", name, begin.end)?;
    Some(EnvSpan {
        start: begin.start,
        end: end.end,
        inner_start: begin.end,
        inner_end: end.start,
    })
}

fn find_env_delimiter<'a>(
    text: &'a str,
    delim: &str,
    name: &str,
    from: usize,
) -> Option<Command<'a>> {
    let mut pos = from;
    while let Some(cmd) = find_command(text, delim, pos) {
        if cmd.arg.trim() == name {
            return Some(cmd);
        }
        pos = cmd.start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_find_command_basic() {
        let text = r"before \cite{smith2020} after";
        let cmd = find_command(text, "cite", 0).unwrap();
        assert_eq!(cmd.name, "cite");
        assert_eq!(cmd.arg, "smith2020");
        assert_eq!(&text[cmd.start..cmd.end], r"\cite{smith2020}");
    }

    #[test]
    fn test_find_command_with_options() {
        let text = r"\citep[see][p.~4]{jones}";
        let cmd = find_command(text, "citep", 0).unwrap();
        assert_eq!(cmd.opts, vec!["see", "p.~4"]);
        assert_eq!(cmd.arg, "jones");
    }

    #[test]
    fn test_find_command_exact_name() {
        // Searching for \cite must not match \citep.
        let text = r"\citep{a} then \cite{b}";
        let cmd = find_command(text, "cite", 0).unwrap();
        assert_eq!(cmd.arg, "b");
    }

    #[test]
    fn test_find_command_skips_comments() {
        let text = "% \\input{draft}\n\\input{real}";
        let cmd = find_command(text, "input", 0).unwrap();
        assert_eq!(cmd.arg, "real");
    }

    #[test]
    fn test_find_command_escaped_percent_not_comment() {
        let text = r"100\% done \cite{a}";
        let cmd = find_command(text, "cite", 0).unwrap();
        assert_eq!(cmd.arg, "a");
    }

    #[test]
    fn test_find_command_tolerates_inline_whitespace() {
        let text = "\\bibitem [{3}] {key}";
        let cmd = find_command(text, "bibitem", 0).unwrap();
        assert_eq!(cmd.opts, vec!["{3}"]);
        assert_eq!(cmd.arg, "key");
    }

    #[test]
    fn test_find_command_rejects_blank_line_gap() {
        let text = "\\cite\n\n{key}";
        assert!(find_command(text, "cite", 0).is_none());
    }

    #[test]
    fn test_find_command_nested_braces() {
        let text = r"\includegraphics[width=0.5\textwidth]{figs/{a}.png}";
        let cmd = find_command(text, "includegraphics", 0).unwrap();
        assert_eq!(cmd.arg, "figs/{a}.png");
    }

    #[test]
    fn test_escaped_backslash_is_not_command() {
        // `\\cite` is a line break followed by the word "cite".
        let text = r"row \\cite more \cite{x}";
        let cmd = find_command(text, "cite", 0).unwrap();
        assert_eq!(cmd.arg, "x");
    }

    #[test]
    fn test_arg_list_splits_and_trims() {
        let text = r"\cite{a, b ,c}";
        let cmd = find_command(text, "cite", 0).unwrap();
        assert_eq!(cmd.arg_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cite_commands_ordered() {
        let text = r"\citet{b} and \cite{a} and \citep{c}";
        let cmds = cite_commands(text);
        let args: Vec<_> = cmds.iter().map(|c| c.arg).collect();
        assert_eq!(args, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_find_environment() {
        let text = "x \\begin{thebibliography}{9}\n\\bibitem{a} A.\n\\end{thebibliography} y";
        let env = find_environment(text, "thebibliography", 0).unwrap();
        assert!(text[env.start..env.end].starts_with("\\begin{thebibliography}"));
        assert!(text[env.start..env.end].ends_with("\\end{thebibliography}"));
        assert!(text[env.inner_start..env.inner_end].contains("\\bibitem{a}"));
    }

    #[test]
    fn test_find_environment_with_space_before_brace() {
        let text = "\\begin {thebibliography}{9}\\end {thebibliography}";
        let env = find_environment(text, "thebibliography", 0).unwrap();
        assert_eq!(env.start, 0);
        assert_eq!(env.end, text.len());
    }

    #[test]
    fn test_comment_start() {
        assert_eq!(comment_start("text % comment"), Some(5));
        assert_eq!(comment_start(r"100\% text"), None);
        assert_eq!(comment_start("% leading"), Some(0));
    }

    proptest! {
        #[test]
        fn prop_find_command_roundtrips_arg(
            key in "[a-zA-Z][a-zA-Z0-9:_-]{0,16}",
            prefix in "[a-z .,]{0,20}",
        ) {
            let text = format!("{prefix}\\cite{{{key}}}");
            let cmd = find_command(&text, "cite", 0).unwrap();
            prop_assert_eq!(cmd.arg, key.as_str());
            prop_assert_eq!(cmd.end, text.len());
        }

        #[test]
        fn prop_commented_commands_are_skipped(
            key in "[a-zA-Z][a-zA-Z0-9]{0,8}",
        ) {
            let text = format!("%\\cite{{{key}}}\n");
            prop_assert!(find_command(&text, "cite", 0).is_none());
        }

        #[test]
        fn prop_match_brace_balanced(depth in 1usize..6) {
            let mut text = String::new();
            for _ in 0..depth {
                text.push('{');
                text.push('x');
            }
            for _ in 0..depth {
                text.push('}');
            }
            let close = match_brace(text.as_bytes(), 0).unwrap();
            prop_assert_eq!(close, text.len() - 1);
        }
    }
}
