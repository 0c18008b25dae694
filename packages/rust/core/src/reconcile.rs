//! Artifact reconciliation after a generation step.
//!
//! The external generator chooses its own output file name. Given snapshots
//! of the output directory taken before and after the step, pick the file the
//! step produced:
//!
//! 1. exactly one new diagram-like file → that file;
//! 2. several new files → the newest of them (mtime, then greatest name);
//! 3. no new files, some rewritten (mtime changed) → the newest rewritten one;
//! 4. otherwise → the newest diagram-like file overall.
//!
//! Rules 3 and 4 cover generators that overwrite in place.
//!
//! Snapshots are non-recursive. Subdirectories of an output directory belong
//! to other documents.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use apidiagram_shared::{DiagramError, Result, is_diagram_file};

/// Diagram-like files in one directory, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    entries: BTreeMap<String, SystemTime>,
}

impl DirectorySnapshot {
    /// Record diagram-like files directly inside `dir`. A missing directory
    /// yields an empty snapshot.
    pub fn capture(dir: &Path) -> Result<Self> {
        let read = match std::fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(DiagramError::io(dir, e)),
        };

        let mut entries = BTreeMap::new();
        for entry in read {
            let entry = entry.map_err(|e| DiagramError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() || !is_diagram_file(&path) {
                continue;
            }
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|e| DiagramError::io(&path, e))?;
            entries.insert(entry.file_name().to_string_lossy().into_owned(), modified);
        }

        Ok(Self { entries })
    }

    /// Build a snapshot from `(name, mtime)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, SystemTime)>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn newest<'a>(&'a self, names: impl Iterator<Item = &'a String>) -> Option<&'a String> {
        names
            .filter_map(|name| self.entries.get(name).map(|t| (t, name)))
            .max()
            .map(|(_, name)| name)
    }
}

/// Which rule picked the produced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    OnlyNew,
    NewestNew { candidates: usize },
    NewestModified,
    NewestExisting,
}

/// The file a generation step is taken to have produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    pub file_name: String,
    pub selection: Selection,
}

/// Compare snapshots and identify the produced file, if any.
pub fn identify_produced(before: &DirectorySnapshot, after: &DirectorySnapshot) -> Option<Produced> {
    let new: Vec<&String> = after
        .entries
        .keys()
        .filter(|name| !before.contains(name))
        .collect();

    match new.len() {
        0 => {
            let modified = after
                .entries
                .iter()
                .filter(|(name, mtime)| before.entries.get(*name) != Some(*mtime))
                .map(|(name, _)| name);
            if let Some(name) = after.newest(modified) {
                return Some(Produced {
                    file_name: name.clone(),
                    selection: Selection::NewestModified,
                });
            }
            after.newest(after.entries.keys()).map(|name| Produced {
                file_name: name.clone(),
                selection: Selection::NewestExisting,
            })
        }
        1 => Some(Produced {
            file_name: new[0].clone(),
            selection: Selection::OnlyNew,
        }),
        candidates => after.newest(new.into_iter()).map(|name| Produced {
            file_name: name.clone(),
            selection: Selection::NewestNew { candidates },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn single_new_file_is_chosen() {
        let before = DirectorySnapshot::from_entries([("old.mmd", at(10))]);
        let after = DirectorySnapshot::from_entries([("old.mmd", at(10)), ("diagram.mmd", at(5))]);

        let produced = identify_produced(&before, &after).unwrap();
        assert_eq!(produced.file_name, "diagram.mmd");
        assert_eq!(produced.selection, Selection::OnlyNew);
    }

    #[test]
    fn newest_of_several_new_files_wins() {
        let before = DirectorySnapshot::default();
        let after = DirectorySnapshot::from_entries([
            ("x.mmd", at(100)),
            ("y.mmd", at(200)),
            ("z.mermaid", at(150)),
        ]);

        let produced = identify_produced(&before, &after).unwrap();
        assert_eq!(produced.file_name, "y.mmd");
        assert_eq!(produced.selection, Selection::NewestNew { candidates: 3 });
    }

    #[test]
    fn equal_mtimes_break_ties_by_name() {
        let after = DirectorySnapshot::from_entries([("a.mmd", at(7)), ("b.mmd", at(7))]);
        let produced = identify_produced(&DirectorySnapshot::default(), &after).unwrap();
        assert_eq!(produced.file_name, "b.mmd");
    }

    #[test]
    fn in_place_overwrite_prefers_the_rewritten_file() {
        let before = DirectorySnapshot::from_entries([("api.mmd", at(10)), ("other.mmd", at(20))]);
        let after = DirectorySnapshot::from_entries([("api.mmd", at(30)), ("other.mmd", at(20))]);

        let produced = identify_produced(&before, &after).unwrap();
        assert_eq!(produced.file_name, "api.mmd");
        assert_eq!(produced.selection, Selection::NewestModified);
    }

    #[test]
    fn rewritten_file_wins_over_a_newer_untouched_sibling() {
        // `sibling.mmd` was written by an earlier document in the same directory.
        let before = DirectorySnapshot::from_entries([("api.mmd", at(10)), ("sibling.mmd", at(90))]);
        let after = DirectorySnapshot::from_entries([("api.mmd", at(50)), ("sibling.mmd", at(90))]);

        let produced = identify_produced(&before, &after).unwrap();
        assert_eq!(produced.file_name, "api.mmd");
        assert_eq!(produced.selection, Selection::NewestModified);
    }

    #[test]
    fn unchanged_directory_falls_back_to_newest_existing() {
        let snapshot = DirectorySnapshot::from_entries([("api.mmd", at(10)), ("other.mmd", at(20))]);

        let produced = identify_produced(&snapshot, &snapshot.clone()).unwrap();
        assert_eq!(produced.file_name, "other.mmd");
        assert_eq!(produced.selection, Selection::NewestExisting);
    }

    #[test]
    fn nothing_produced_in_empty_directory() {
        let empty = DirectorySnapshot::default();
        assert!(identify_produced(&empty, &empty).is_none());
    }

    #[test]
    fn capture_ignores_non_diagrams_and_subdirectories() {
        let tmp = std::env::temp_dir().join(format!(
            "apidiagram-reconcile-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(tmp.join("nested")).unwrap();
        std::fs::write(tmp.join("a.mmd"), "graph TD").unwrap();
        std::fs::write(tmp.join("b.mermaid"), "graph TD").unwrap();
        std::fs::write(tmp.join("a.svg"), "<svg/>").unwrap();
        std::fs::write(tmp.join("nested/c.mmd"), "graph TD").unwrap();

        let snapshot = DirectorySnapshot::capture(&tmp).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a.mmd"));
        assert!(snapshot.contains("b.mermaid"));
        assert!(!snapshot.contains("c.mmd"));

        assert!(DirectorySnapshot::capture(&tmp.join("missing")).unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
