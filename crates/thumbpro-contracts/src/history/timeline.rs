use crate::ImageRef;

use super::Version;

/// A single mutation of the version list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOp {
    Append(Version),
    Replace(Version),
    Undo,
    Redo,
    JumpTo(usize),
}

/// Linear undo history with a cursor at the displayed version.
///
/// - `cursor` is `None` only while `versions` is empty.
/// - appending after an undo drops everything past the cursor for good.
/// - replacing overwrites the slot under the cursor without adding an undo step.
///
/// Out-of-range navigation is a no-op rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionHistory {
    versions: Vec<Version>,
    cursor: Option<usize>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(version: Version) -> Self {
        Self {
            versions: vec![version],
            cursor: Some(0),
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn versions(&self) -> &[Version] {
        self.versions.as_slice()
    }

    pub fn current(&self) -> Option<&Version> {
        self.cursor.and_then(|index| self.versions.get(index))
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(index) if index > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(index) if index + 1 < self.versions.len())
    }

    /// Last slot holding `image`, if any.
    pub fn position_of(&self, image: &ImageRef) -> Option<usize> {
        self.versions
            .iter()
            .rposition(|version| &version.image == image)
    }

    pub fn status_label(&self) -> String {
        let shown = self.cursor.map(|index| index + 1).unwrap_or(0);
        format!("{shown} / {}", self.versions.len())
    }

    pub fn append(&mut self, version: Version) -> bool {
        self.apply(HistoryOp::Append(version))
    }

    pub fn replace(&mut self, version: Version) -> bool {
        self.apply(HistoryOp::Replace(version))
    }

    pub fn undo(&mut self) -> bool {
        self.apply(HistoryOp::Undo)
    }

    pub fn redo(&mut self) -> bool {
        self.apply(HistoryOp::Redo)
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        self.apply(HistoryOp::JumpTo(index))
    }

    /// Applies `op` and reports whether anything changed.
    pub fn apply(&mut self, op: HistoryOp) -> bool {
        let changed = match op {
            HistoryOp::Append(version) => {
                let keep = self.cursor.map(|index| index + 1).unwrap_or(0);
                self.versions.truncate(keep);
                self.versions.push(version);
                self.cursor = Some(self.versions.len() - 1);
                true
            }
            HistoryOp::Replace(version) => match self.cursor {
                None => return self.apply(HistoryOp::Append(version)),
                Some(index) => {
                    self.versions[index] = version;
                    true
                }
            },
            HistoryOp::Undo => match self.cursor {
                Some(index) if index > 0 => {
                    self.cursor = Some(index - 1);
                    true
                }
                _ => false,
            },
            HistoryOp::Redo => match self.cursor {
                Some(index) if index + 1 < self.versions.len() => {
                    self.cursor = Some(index + 1);
                    true
                }
                _ => false,
            },
            HistoryOp::JumpTo(index) => {
                if index >= self.versions.len() || self.cursor == Some(index) {
                    false
                } else {
                    self.cursor = Some(index);
                    true
                }
            }
        };
        debug_assert!(self.cursor_in_bounds(), "cursor escaped version bounds");
        changed
    }

    fn cursor_in_bounds(&self) -> bool {
        match self.cursor {
            None => self.versions.is_empty(),
            Some(index) => index < self.versions.len(),
        }
    }
}
