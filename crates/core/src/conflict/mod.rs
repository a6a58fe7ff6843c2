//! Conflict reporting for merge attempts.
//!
//! The conflict subsystem is responsible for:
//! 1. **Reporting** -- describing which paths a merge left conflicted.
//! 2. **Scanning** -- locating `<<<<<<<` / `>>>>>>>` blocks in file content,
//!    both to build hunk ranges and to decide whether a paused merge has
//!    really been resolved.

pub mod markers;
pub mod report;

pub use markers::{contains_conflict_markers, scan_conflict_markers};
pub use report::{ConflictEntry, ConflictHunk, ConflictReport};
