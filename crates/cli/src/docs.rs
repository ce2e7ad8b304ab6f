use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// A documentation file ready to be vectorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the indexed root, `/`-separated.
    pub id: String,
    pub title: String,
    pub text: String,
}

/// Collects every documentation file under `root`, sorted by relative path.
///
/// Hidden directories are skipped; unreadable files are logged and skipped.
pub fn collect(root: &Path) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && is_doc(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        if text.trim().is_empty() {
            log::debug!("Skipping empty document {}", path.display());
            continue;
        }
        let id = relative_id(root, &path);
        let title = title_of(&text).unwrap_or_else(|| file_stem(&path));
        docs.push(Document { id, title, text });
    }
    Ok(docs)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn is_doc(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn relative_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// First Markdown heading, if any.
fn title_of(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collects_docs_with_titles() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("runbooks")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("runbooks/db.md"), "intro\n## Database timeouts\nbody").unwrap();
        fs::write(root.join("notes.txt"), "plain notes").unwrap();
        fs::write(root.join("image.png"), "binary").unwrap();
        fs::write(root.join("empty.md"), "   \n").unwrap();
        fs::write(root.join(".git/HEAD.md"), "# hidden").unwrap();

        let docs = collect(root).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["notes.txt", "runbooks/db.md"]);
        assert_eq!(docs[0].title, "notes");
        assert_eq!(docs[1].title, "Database timeouts");
    }

    #[test]
    fn title_ignores_bare_hashes() {
        assert_eq!(title_of("#\n# Real"), None);
        assert_eq!(title_of("text\n#  Spaced  "), Some("Spaced".to_string()));
    }
}
