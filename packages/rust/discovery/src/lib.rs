//! Input discovery for the diagram pipeline.
//!
//! Walks the source root for YAML/JSON documents and, for render-only runs,
//! walks the diagram root for existing `.mmd` artifacts. Both walks are
//! sorted, and both treat an empty result as a configuration error.

use std::path::{Path, PathBuf};

use apidiagram_shared::{DIAGRAM_EXTENSION, DiagramError, Result, SourceDocument};
use tracing::{debug, info, instrument};

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Discover every `.yaml`, `.yml` and `.json` document under `source_root`.
///
/// Fails if the root is missing or holds no matching documents.
#[instrument(skip_all, fields(root = %source_root.display()))]
pub fn discover_documents(source_root: &Path) -> Result<Vec<SourceDocument>> {
    ensure_root(source_root, "source")?;

    let mut files = Vec::new();
    walk(source_root, &mut files)?;

    let mut documents: Vec<SourceDocument> = files
        .into_iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(source_root).ok()?.to_path_buf();
            SourceDocument::new(source_root, relative)
        })
        .collect();

    if documents.is_empty() {
        return Err(DiagramError::config(format!(
            "no YAML/JSON documents found under {}",
            source_root.display()
        )));
    }

    documents.sort_by(|a, b| a.relative.cmp(&b.relative));

    info!(count = documents.len(), "documents discovered");
    Ok(documents)
}

/// Discover every `.mmd` diagram under `diagram_root`, sorted.
#[instrument(skip_all, fields(root = %diagram_root.display()))]
pub fn discover_diagrams(diagram_root: &Path) -> Result<Vec<PathBuf>> {
    ensure_root(diagram_root, "diagram")?;

    let mut files = Vec::new();
    walk(diagram_root, &mut files)?;

    let mut diagrams: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DIAGRAM_EXTENSION))
        })
        .collect();

    if diagrams.is_empty() {
        return Err(DiagramError::config(format!(
            "no .{DIAGRAM_EXTENSION} files found under {}",
            diagram_root.display()
        )));
    }

    diagrams.sort();

    info!(count = diagrams.len(), "diagrams discovered");
    Ok(diagrams)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_root(root: &Path, kind: &str) -> Result<()> {
    if !root.exists() {
        return Err(DiagramError::config(format!(
            "missing {kind} directory: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(DiagramError::config(format!(
            "{kind} path is not a directory: {}",
            root.display()
        )));
    }
    Ok(())
}

/// Collect every file below `dir`.
///
/// Symlinked files are followed; symlinked directories are not descended.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| DiagramError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| DiagramError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| DiagramError::io(&path, e))?;

        if file_type.is_dir() {
            walk(&path, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            out.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-file entry");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apidiagram_shared::DocumentFormat;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "apidiagram-discovery-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "openapi: 3.0.0\n").unwrap();
    }

    #[test]
    fn finds_documents_recursively_and_sorted() {
        let tmp = temp_dir();
        touch(&tmp, "zeta.json");
        touch(&tmp, "a/b.yaml");
        touch(&tmp, "a/deep/er/c.YML");
        touch(&tmp, "a/notes.md");
        touch(&tmp, "README");

        let docs = discover_documents(&tmp).unwrap();
        let rels: Vec<_> = docs.iter().map(|d| d.relative_display()).collect();
        assert_eq!(rels, vec!["a/b.yaml", "a/deep/er/c.YML", "zeta.json"]);

        assert_eq!(docs[0].format, DocumentFormat::Yaml);
        assert_eq!(docs[1].format, DocumentFormat::Yaml);
        assert_eq!(docs[2].format, DocumentFormat::Json);
        assert_eq!(docs[0].path, tmp.join("a/b.yaml"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let tmp = temp_dir();
        let missing = tmp.join("yaml_source");

        let err = discover_documents(&missing).unwrap_err();
        assert!(matches!(err, DiagramError::Config { .. }));
        assert!(err.to_string().contains("missing source directory"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_root_is_a_config_error_naming_the_root() {
        let tmp = temp_dir();
        touch(&tmp, "docs/readme.txt");

        let err = discover_documents(&tmp).unwrap_err();
        assert!(matches!(err, DiagramError::Config { .. }));
        assert!(err.to_string().contains(&tmp.display().to_string()));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_as_root_is_rejected() {
        let tmp = temp_dir();
        touch(&tmp, "api.yaml");

        let err = discover_documents(&tmp.join("api.yaml")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn finds_diagrams_only() {
        let tmp = temp_dir();
        touch(&tmp, "a/b.mmd");
        touch(&tmp, "c.mmd");
        touch(&tmp, "a/b.svg");
        touch(&tmp, "a/extra.mermaid");

        let diagrams = discover_diagrams(&tmp).unwrap();
        assert_eq!(diagrams, vec![tmp.join("a/b.mmd"), tmp.join("c.mmd")]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_diagrams_is_a_config_error() {
        let tmp = temp_dir();
        let err = discover_diagrams(&tmp).unwrap_err();
        assert!(err.to_string().contains("no .mmd files"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
