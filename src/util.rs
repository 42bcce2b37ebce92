//! Text decoding, normalization, and rewrite helpers shared by both
//! pipelines.

use std::borrow::Cow;

/// One pending replacement over a text buffer.
///
/// Rewrite passes scan the pristine text and collect edits instead of
/// mutating as they go, so byte offsets (and the span map built during
/// inclusion resolution) stay valid until everything is spliced at once.
#[derive(Debug, Clone)]
pub(crate) struct Edit {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Splice edits into `text` in position order.
///
/// Edits must not overlap; if one does overlap an earlier edit it is
/// dropped rather than corrupting the splice.
pub(crate) fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..edit.start]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Decode bytes to a string, handling legacy encodings.
///
/// Tries UTF-8 first (handles BOM automatically via encoding_rs) and falls
/// back to Windows-1252, which is a superset of the Latin-1 commonly found in
/// older LaTeX sources.
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Accented characters and their LaTeX escape sequences.
///
/// Covers the Western European set that shows up in author names and
/// affiliations. Anything outside the table passes through unchanged.
const ACCENT_MAP: &[(char, &str)] = &[
    ('á', r"{\'a}"),
    ('é', r"{\'e}"),
    ('í', r"{\'i}"),
    ('ó', r"{\'o}"),
    ('ú', r"{\'u}"),
    ('Á', r"{\'A}"),
    ('É', r"{\'E}"),
    ('Í', r"{\'I}"),
    ('Ó', r"{\'O}"),
    ('Ú', r"{\'U}"),
    ('ñ', r"{\~n}"),
    ('Ñ', r"{\~N}"),
    ('ü', r#"{\"u}"#),
    ('Ü', r#"{\"U}"#),
    ('ö', r#"{\"o}"#),
    ('Ö', r#"{\"O}"#),
    ('ä', r#"{\"a}"#),
    ('Ä', r#"{\"A}"#),
];

/// Rewrite accented characters to LaTeX escape sequences.
///
/// Keeps the flattened document pure ASCII in the positions that matter for
/// diffing, so a byte-oriented differ never splits a multi-byte character.
/// Returns a borrowed `Cow` when no accented characters are present.
pub fn escape_accents(text: &str) -> Cow<'_, str> {
    let needs_rewrite = text
        .chars()
        .any(|c| ACCENT_MAP.iter().any(|(from, _)| *from == c));
    if !needs_rewrite {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match ACCENT_MAP.iter().find(|(from, _)| *from == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_borrows() {
        let text = decode_text("caf\u{e9} au lait".as_bytes());
        assert_eq!(text, "café au lait");
        assert!(matches!(text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // 0xE9 is 'é' in Windows-1252 but malformed UTF-8.
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes), "café");
    }

    #[test]
    fn test_escape_accents() {
        assert_eq!(escape_accents("Muñoz"), r"Mu{\~n}oz");
        assert_eq!(escape_accents("Gödel"), r#"G{\"o}del"#);
        assert_eq!(escape_accents(r"Garc\'ia"), r"Garc\'ia");
    }

    #[test]
    fn test_escape_accents_borrows_ascii() {
        let text = escape_accents("plain ascii");
        assert!(matches!(text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_apply_edits_splices_in_order() {
        let text = "aaa bbb ccc";
        let edits = vec![
            Edit { start: 8, end: 11, text: "C".into() },
            Edit { start: 0, end: 3, text: "A".into() },
        ];
        assert_eq!(apply_edits(text, edits), "A bbb C");
    }

    #[test]
    fn test_apply_edits_drops_overlaps() {
        let text = "abcdef";
        let edits = vec![
            Edit { start: 1, end: 4, text: "X".into() },
            Edit { start: 2, end: 5, text: "Y".into() },
        ];
        assert_eq!(apply_edits(text, edits), "aXef");
    }
}
