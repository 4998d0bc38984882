use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::history::{Version, VersionHistory, VersionSource};
use crate::{EditorError, ImageRef};

use super::store::{MemoryProjectStore, ProjectStore};

/// A saved snapshot, independent of any live undo history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub image: ImageRef,
    pub timestamp: i64,
    pub name: String,
}

/// Newest-first gallery of saved projects, persisted whole on every mutation.
pub struct ProjectLibrary {
    projects: Vec<Project>,
    store: Box<dyn ProjectStore>,
}

impl ProjectLibrary {
    /// Reads the stored collection once. Unreadable data yields an empty library.
    pub fn open(store: impl ProjectStore + 'static) -> Self {
        let projects = match load_projects(&store) {
            Ok(projects) => projects,
            Err(err) => {
                tracing::warn!(error = %err, "discarding stored projects");
                Vec::new()
            }
        };
        tracing::debug!(count = projects.len(), "project library opened");
        Self {
            projects,
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryProjectStore::new())
    }

    pub fn projects(&self) -> &[Project] {
        self.projects.as_slice()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    /// Resolves a 1-based gallery position or a project id.
    pub fn find(&self, selector: &str) -> Option<&Project> {
        let selector = selector.trim();
        if let Ok(position) = selector.parse::<usize>() {
            if position >= 1 {
                if let Some(project) = self.projects.get(position - 1) {
                    return Some(project);
                }
            }
        }
        self.get(selector)
    }

    pub fn save(&mut self, image: ImageRef) -> Project {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            image,
            timestamp: now.timestamp_millis(),
            name: format!("Thumbnail {}", now.format("%Y-%m-%d %H:%M:%S")),
        };
        self.projects.insert(0, project.clone());
        self.persist();
        project
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|project| project.id != id);
        let removed = self.projects.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// A brand-new history holding only the project's snapshot.
    pub fn load(&self, project: &Project) -> VersionHistory {
        VersionHistory::seeded(Version::new(
            project.image.clone(),
            VersionSource::Project {
                project_id: project.id.clone(),
            },
            project.timestamp.unsigned_abs(),
        ))
    }

    fn persist(&self) {
        let value = match serde_json::to_value(&self.projects) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "serializing projects failed");
                return;
            }
        };
        if let Err(err) = self.store.write_raw(&value) {
            tracing::warn!(error = %format!("{err:#}"), "persisting projects failed");
        }
    }
}

fn load_projects(store: &dyn ProjectStore) -> Result<Vec<Project>, EditorError> {
    let raw = store
        .read_raw()
        .map_err(|err| EditorError::StorageCorrupt(format!("{err:#}")))?;
    match raw {
        None => Ok(Vec::new()),
        Some(value) => parse_projects(value),
    }
}

pub fn parse_projects(value: Value) -> Result<Vec<Project>, EditorError> {
    serde_json::from_value(value).map_err(|err| EditorError::StorageCorrupt(err.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_projects, ProjectLibrary};
    use crate::projects::{FileProjectStore, MemoryProjectStore, PROJECTS_STORAGE_KEY};
    use crate::{EditorError, ImageRef};

    fn image(label: &str) -> ImageRef {
        ImageRef::from_bytes("image/png", label.as_bytes())
    }

    #[test]
    fn save_then_delete_round_trips_to_empty() {
        let store = MemoryProjectStore::new();
        let mut library = ProjectLibrary::open(store.clone());
        assert!(library.is_empty());

        let project = library.save(image("A"));
        assert_eq!(library.len(), 1);
        assert!(project.name.starts_with("Thumbnail "));
        assert_eq!(store.snapshot().map(|value| value.as_array().map(Vec::len)), Some(Some(1)));

        assert!(library.delete(&project.id));
        assert!(library.is_empty());
        assert_eq!(store.snapshot(), Some(json!([])));
        assert!(!library.delete(&project.id));
    }

    #[test]
    fn save_prepends_without_deduplicating() {
        let mut library = ProjectLibrary::in_memory();
        let first = library.save(image("A"));
        let second = library.save(image("A"));
        assert_eq!(library.len(), 2);
        assert_eq!(library.projects()[0].id, second.id);
        assert_eq!(library.projects()[1].id, first.id);
        assert_eq!(library.find("2").map(|p| p.id.clone()), Some(first.id.clone()));
        assert_eq!(library.find(&first.id).map(|p| p.id.clone()), Some(first.id));
        assert!(library.find("3").is_none());
    }

    #[test]
    fn corrupt_value_opens_as_empty_library() {
        let store = MemoryProjectStore::with_value(json!({"not": "a list"}));
        let library = ProjectLibrary::open(store);
        assert!(library.is_empty());
    }

    #[test]
    fn corrupt_file_opens_as_empty_library() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("projects.json");
        std::fs::write(&path, "\u{0}garbage")?;
        let mut library = ProjectLibrary::open(FileProjectStore::new(&path));
        assert!(library.is_empty());

        library.save(image("fresh"));
        let reopened = ProjectLibrary::open(FileProjectStore::new(&path));
        assert_eq!(reopened.len(), 1);
        Ok(())
    }

    #[test]
    fn projects_survive_reopen() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("projects.json");
        let saved = ProjectLibrary::open(FileProjectStore::new(&path)).save(image("keep"));

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert!(raw[PROJECTS_STORAGE_KEY].is_array());

        let reopened = ProjectLibrary::open(FileProjectStore::new(&path));
        assert_eq!(reopened.get(&saved.id), Some(&saved));
        Ok(())
    }

    #[test]
    fn load_reseeds_single_entry_history() {
        let mut library = ProjectLibrary::in_memory();
        let project = library.save(image("snap"));
        let history = library.load(&project);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current().map(|v| v.image.clone()), Some(project.image));
    }

    #[test]
    fn parse_projects_flags_storage_corruption() {
        let err = parse_projects(json!("nope")).err();
        assert!(matches!(err, Some(EditorError::StorageCorrupt(_))));
    }

    #[test]
    fn record_with_bad_image_opens_as_empty_library() {
        let store = MemoryProjectStore::with_value(json!([
            {
                "id": "p",
                "image": "not-a-data-url",
                "timestamp": 1,
                "name": "Thumbnail 2024-01-01 00:00:00"
            }
        ]));
        let library = ProjectLibrary::open(store);
        assert!(library.is_empty());
        assert!(library.get("p").is_none());
    }
}
