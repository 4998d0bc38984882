mod timeline;
mod version;

pub use timeline::{HistoryOp, VersionHistory};
pub use version::{Version, VersionSource};
