//! Obtaining the formatted bibliography (`.bbl`) for a project.
//!
//! A `.bbl` sitting next to the root file is used as-is. Otherwise the
//! project is copied into a temporary directory and compiled there with
//! `pdflatex` and `bibtex`. The compile is judged solely by whether it
//! leaves a `.bbl` behind; pdflatex exits nonzero on many documents that
//! typeset fine, so exit codes are not trusted.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};
use crate::util::decode_text;

/// Return the formatted bibliography for the project rooted at `root`.
pub fn acquire(root: &Path) -> Result<String> {
    let sibling = root.with_extension("bbl");
    if sibling.is_file() {
        let bytes = fs::read(&sibling)?;
        return Ok(decode_text(&bytes).into_owned());
    }
    generate(root)
}

/// Compile the project in a temporary directory and read the `.bbl` it
/// produces. The project directory itself is never touched.
fn generate(root: &Path) -> Result<String> {
    let file_name = root
        .file_name()
        .ok_or_else(|| Error::RootNotFound(root.to_path_buf()))?;
    let stem = root
        .file_stem()
        .ok_or_else(|| Error::RootNotFound(root.to_path_buf()))?;
    let project_dir = match root.parent() {
        Some(dir) if dir != Path::new("") => dir,
        _ => Path::new("."),
    };

    let temp = tempfile::tempdir()?;
    copy_dir(project_dir, temp.path())?;

    // pdflatex, bibtex, then pdflatex twice to settle references.
    run_tool(temp.path(), "pdflatex", &[OsStr::new("-interaction=nonstopmode"), file_name])?;
    let bibtex = run_tool(temp.path(), "bibtex", &[stem])?;
    run_tool(temp.path(), "pdflatex", &[OsStr::new("-interaction=nonstopmode"), file_name])?;
    run_tool(temp.path(), "pdflatex", &[OsStr::new("-interaction=nonstopmode"), file_name])?;

    let mut bbl_name = stem.to_os_string();
    bbl_name.push(".bbl");
    let bbl_path = temp.path().join(bbl_name);
    if !bbl_path.is_file() {
        return Err(Error::ExternalTool {
            tool: "bibtex".to_string(),
            detail: format!(
                "no .bbl produced\n{}{}",
                String::from_utf8_lossy(&bibtex.stdout),
                String::from_utf8_lossy(&bibtex.stderr)
            ),
        });
    }
    let bytes = fs::read(&bbl_path)?;
    Ok(decode_text(&bytes).into_owned())
}

/// Spawn `tool` with `args` in `dir` and wait for it. A failure to spawn is
/// fatal; a nonzero exit is the caller's problem.
fn run_tool(dir: &Path, tool: &str, args: &[&OsStr]) -> Result<Output> {
    Command::new(tool)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::ExternalTool {
            tool: tool.to_string(),
            detail: e.to_string(),
        })
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
