//! Structured description of a conflicting merge.

use serde::{Deserialize, Serialize};

/// A single conflict region within a file's working-tree content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictHunk {
    /// Line of the `<<<<<<<` marker (1-indexed).
    pub start_line: usize,
    /// Line of the closing `>>>>>>>` marker (1-indexed, inclusive).
    pub end_line: usize,
}

/// One conflicting path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Marker blocks found in the file; empty for binary or
    /// delete/modify conflicts where git writes no markers.
    pub hunks: Vec<ConflictHunk>,
}

impl ConflictEntry {
    pub fn new(path: impl Into<String>, hunks: Vec<ConflictHunk>) -> Self {
        Self {
            path: path.into(),
            hunks,
        }
    }
}

/// Every conflicting path surfaced by one merge attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictReport {
    pub entries: Vec<ConflictEntry>,
}

impl ConflictReport {
    /// Build a report; entries are sorted by path so reports compare equal
    /// regardless of index iteration order.
    pub fn new(mut entries: Vec<ConflictEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// Total number of marker blocks across all paths.
    pub fn hunk_count(&self) -> usize {
        self.entries.iter().map(|e| e.hunks.len()).sum()
    }
}

impl std::fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<&str> = self.paths().collect();
        write!(f, "{} conflicting path(s): {}", paths.len(), paths.join(", "))
    }
}
