//! Repairing `latexdiff` output.
//!
//! latexdiff produces a compilable change-marked document, but its handling
//! of bibliographies and citation commands is rough: deleted entries keep
//! their number slot, the `thebibliography` opener gets swallowed by
//! markup, and citation commands are split from their arguments. [`repair`]
//! post-processes the raw diff so the marked document numbers and spaces
//! like the clean one would.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};
use crate::util::decode_text;

mod markup;
mod renumber;
mod spacing;

/// Run `latexdiff OLD NEW` and return its stdout. Unlike the TeX compile
/// used for `.bbl` generation, a nonzero exit here means no usable diff, so
/// it is fatal.
pub fn run_latexdiff(old: &Path, new: &Path) -> Result<String> {
    let output = Command::new("latexdiff")
        .arg(old)
        .arg(new)
        .output()
        .map_err(|e| Error::ExternalTool {
            tool: "latexdiff".to_string(),
            detail: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::ExternalTool {
            tool: "latexdiff".to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        });
    }
    Ok(decode_text(&output.stdout).into_owned())
}

/// Repair raw latexdiff output.
///
/// Three passes, in order: restore a markup-wrapped `thebibliography`
/// opener, renumber the bibliography so deleted entries consume no slot,
/// and fix whitespace at markup boundaries. The result ends with exactly
/// one newline.
pub fn repair(diff_text: &str) -> String {
    let text = markup::unwrap_bib_begin(diff_text);
    let text = renumber::renumber_bibliography(&text);
    let mut text = spacing::fix_spacing(&text);
    text.truncate(text.trim_end().len());
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_normalizes_trailing_newline() {
        assert_eq!(repair("no newline"), "no newline\n");
        assert_eq!(repair("has one\n"), "has one\n");
        assert_eq!(repair("has several\n\n\n"), "has several\n");
    }

    #[test]
    fn test_repair_runs_all_passes() {
        let text = "\\DIFdelend \\DIFaddbegin \\begin{thebibliography}{2}\n\
                    \\bibitem{a} A. \\DIFaddend\n\
                    \\DIFdelbegin\n\
                    \\bibitem{b} B.\n\
                    \\DIFdelend\n\
                    \\end{thebibliography}";
        let out = repair(text);
        assert!(out.starts_with("\\begin{thebibliography}{1}\n"));
        assert!(out.contains("\\bibitem [{1}] {a}"));
        assert!(out.contains("%DIFDELCMD < \\bibitem{b} B. %%%"));
        assert!(out.ends_with("\\end{thebibliography}\n"));
    }
}
