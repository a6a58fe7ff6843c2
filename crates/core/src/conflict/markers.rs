//! Conflict marker scanning.
//!
//! Git writes `<<<<<<<`, optional `|||||||`, `=======` and `>>>>>>>` lines
//! (each exactly seven characters, followed by end of line or a space) into
//! conflicted files. A block only counts when all three mandatory markers
//! appear in order, so ordinary text such as a Markdown `=======` underline
//! is not mistaken for a conflict.

use tracing::debug;

use super::report::ConflictHunk;

const OURS: &str = "<<<<<<<";
const SEPARATOR: &str = "=======";
const THEIRS: &str = ">>>>>>>";

fn is_marker(line: &str, marker: &str) -> bool {
    match line.strip_prefix(marker) {
        Some(rest) => rest.is_empty() || rest.starts_with(' ') || rest == "\r",
        None => false,
    }
}

/// Return every complete marker block in `content`, in file order.
pub fn scan_conflict_markers(content: &str) -> Vec<ConflictHunk> {
    let mut hunks = Vec::new();
    let mut open: Option<usize> = None;
    let mut separated = false;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if is_marker(line, OURS) {
            // A nested or unterminated block restarts the scan here.
            open = Some(line_no);
            separated = false;
        } else if open.is_some() && is_marker(line, SEPARATOR) {
            separated = true;
        } else if is_marker(line, THEIRS) {
            if let (Some(start_line), true) = (open, separated) {
                hunks.push(ConflictHunk {
                    start_line,
                    end_line: line_no,
                });
            }
            open = None;
            separated = false;
        }
    }

    debug!(count = hunks.len(), "scanned conflict markers");
    hunks
}

/// Quick check used before resuming a paused batch.
pub fn contains_conflict_markers(content: &str) -> bool {
    !scan_conflict_markers(content).is_empty()
}
