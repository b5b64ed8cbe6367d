use std::path::{Path, PathBuf};

use anyhow::Context;
use docqa_rag::{RawDocument, SkippedDocument};

/// Expand `paths` into the files to index, in a stable order.
///
/// Directories contribute their regular files, one level deep and sorted by
/// name. Hidden files are ignored. Given files are kept in argument order.
pub fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = Vec::new();
            let dir = std::fs::read_dir(path)
                .with_context(|| format!("failed to read directory '{}'", path.display()))?;
            for entry in dir {
                let entry_path = entry?.path();
                if entry_path.is_file() && !is_hidden(&entry_path) {
                    entries.push(entry_path);
                }
            }
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('.'))
}

/// Read every file, turning unreadable ones into skipped documents.
pub fn read_documents(files: &[PathBuf]) -> (Vec<RawDocument>, Vec<SkippedDocument>) {
    let mut documents = Vec::new();
    let mut unreadable = Vec::new();
    for file in files {
        match RawDocument::from_path(file) {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "cannot read document");
                let name = RawDocument::name_for(file);
                unreadable.push(SkippedDocument { name, reason: e.to_string() });
            }
        }
    }
    (documents, unreadable)
}
