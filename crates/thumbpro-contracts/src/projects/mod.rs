mod library;
mod store;

pub use library::{parse_projects, Project, ProjectLibrary};
pub use store::{
    BackgroundProjectStore, FileProjectStore, MemoryProjectStore, ProjectStore,
    PROJECTS_STORAGE_KEY,
};
