//! Source documents on disk

use crate::{CoreError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Placeholder shown by the source viewer when a document is missing
pub const FILE_NOT_FOUND: &str = "File not found.";

/// A loaded input document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path the document was read from
    pub path: String,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Base name of the document's path
    pub fn name(&self) -> String {
        file_name(Path::new(&self.path))
    }
}

/// Read a document's text. `.pdf` files go through PDF text extraction,
/// everything else must be UTF-8.
pub fn load_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| CoreError::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let text = if is_pdf(path) {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| CoreError::Load {
            path: path.display().to_string(),
            reason: format!("unreadable PDF ({})", e),
        })?
    } else {
        String::from_utf8(bytes).map_err(|e| CoreError::Load {
            path: path.display().to_string(),
            reason: format!("not valid UTF-8 ({})", e.utf8_error()),
        })?
    };

    Ok(Document::new(path.display().to_string(), text))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Regular files directly inside `folder`, sorted by name
pub fn list_documents(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(CoreError::FolderNotFound(folder.display().to_string()));
    }

    let entries = fs::read_dir(folder).map_err(|e| CoreError::Load {
        path: folder.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    Ok(files)
}

/// Names of the `.txt` articles in `folder`; empty when the folder is missing
pub fn list_article_titles(folder: &Path) -> Vec<String> {
    list_documents(folder)
        .unwrap_or_default()
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .map(|path| file_name(path))
        .collect()
}

/// Text of the document called `name` in `folder`, if it exists.
/// Names that try to leave the folder are treated as missing.
pub fn read_source(folder: &Path, name: &str) -> Option<String> {
    let candidate = Path::new(name);
    if candidate.components().count() != 1 || candidate.file_name().is_none() {
        return None;
    }
    fs::read_to_string(folder.join(candidate)).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
