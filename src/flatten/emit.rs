//! Writing a [`FlattenOutput`] to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::FlattenOutput;
use super::assets::FIGURES_DIR;

/// Write the flattened document and its planned copies under `out_dir`.
///
/// Returns the path of the written `.tex` file. The `figures/` directory is
/// created even when no figure was found, so the output layout is the same
/// for every project.
pub fn write_output(output: &FlattenOutput, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir.join(FIGURES_DIR))?;
    let path = out_dir.join(output.file_name());
    fs::write(&path, &output.text)?;
    for job in &output.copies {
        let target = out_dir.join(&job.target);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&job.source, &target)?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::CopyJob;

    fn output(copies: Vec<CopyJob>) -> FlattenOutput {
        FlattenOutput {
            name: "proj".to_string(),
            text: "\\documentclass{article}\n".to_string(),
            copies,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_writes_document_and_copies() {
        let project = tempfile::tempdir().unwrap();
        fs::write(project.path().join("x.png"), b"IMG").unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        let out = output(vec![CopyJob {
            source: project.path().join("x.png"),
            target: PathBuf::from("figures/x.png"),
        }]);
        let written = write_output(&out, out_dir.path()).unwrap();

        assert_eq!(written, out_dir.path().join("proj.tex"));
        assert_eq!(
            fs::read_to_string(&written).unwrap(),
            "\\documentclass{article}\n"
        );
        assert_eq!(
            fs::read(out_dir.path().join("figures/x.png")).unwrap(),
            b"IMG"
        );
    }

    #[test]
    fn test_creates_figures_dir_without_copies() {
        let out_dir = tempfile::tempdir().unwrap();
        write_output(&output(Vec::new()), out_dir.path()).unwrap();
        assert!(out_dir.path().join(FIGURES_DIR).is_dir());
    }
}
