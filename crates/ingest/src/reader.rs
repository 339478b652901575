use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::IngestError;

pub struct FileReader;

impl FileReader {
    /// PDF files directly inside `dir`, sorted by file name.
    pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(IngestError::DatasetNotFound(dir.to_path_buf()).into());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "pdf") {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_only_top_level_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c.pdf"), b"%PDF").unwrap();

        let files = FileReader::list_pdfs(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileReader::list_pdfs(&dir.path().join("dataset")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::DatasetNotFound(_))
        ));
    }
}
