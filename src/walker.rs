use std::path::{Path, PathBuf};

use crate::error::Result;

/// A discovered input file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the walked root.
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
}

/// Entity dumps: one entity per line, or a JSON array of entities.
pub const ENTITY_EXTENSIONS: &[&str] = &["jsonl", "json"];

/// Analysed documents, one per file.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["json"];

/// Recursively discover files with one of `extensions` under `root`.
///
/// Hidden files and directories are skipped. A `root` that is itself a file
/// is returned as is, whatever its extension. Results are sorted by
/// relative path.
pub fn discover_files(root: &Path, extensions: &[&str]) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    if canonical_root.is_file() {
        let name = canonical_root
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        return Ok(vec![DiscoveredFile {
            relative_path: name,
            absolute_path: canonical_root,
        }]);
    }

    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, extensions, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    extensions: &[&str],
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(root, &entry.path(), extensions, results)?;
        } else if file_type.is_symlink() {
            let Ok(resolved) = entry.path().canonicalize() else {
                continue;
            };
            // Directory links may loop back into the tree.
            if resolved.is_file() && has_extension(&resolved, extensions) {
                results.push(discovered(root, &entry.path(), resolved));
            }
        } else if file_type.is_file() && has_extension(&entry.path(), extensions) {
            let abs = entry.path().canonicalize()?;
            results.push(discovered(root, &entry.path(), abs));
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn discovered(root: &Path, original: &Path, absolute_path: PathBuf) -> DiscoveredFile {
    DiscoveredFile {
        relative_path: original.strip_prefix(root).unwrap_or(original).to_path_buf(),
        absolute_path,
    }
}
