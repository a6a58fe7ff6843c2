//! Table rendering for batch results and history.

use std::process::ExitCode;

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use multimerge_core::store::HistoryEntry;
use multimerge_core::{BatchResult, BranchMergeResult, MergeStatus, PausedBatch};

use crate::style;

/// Exit code when the batch is paused waiting for manual resolution.
const EXIT_PAUSED: u8 = 2;

pub fn status_cell(status: MergeStatus) -> Cell {
    match status {
        MergeStatus::Succeeded => Cell::new("✓ succeeded").fg(Color::Green),
        MergeStatus::Skipped => Cell::new("= up to date").fg(Color::Cyan),
        MergeStatus::ConflictsDetected => Cell::new("⚠ conflicts").fg(Color::Yellow),
        MergeStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
        MergeStatus::Aborted => Cell::new("— aborted").fg(Color::DarkGrey),
    }
}

/// One-line explanation of a result: commit, conflicting paths, or error.
pub fn detail(result: &BranchMergeResult) -> String {
    if let Some(report) = result.conflict_report() {
        return report.to_string();
    }
    if let Some(error) = result.error_detail() {
        return error.to_string();
    }
    match result.commit() {
        Some(commit) => short(commit).to_string(),
        None => String::new(),
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn results_table(result: &BatchResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Target", "Status", "Detail"]);

    for (idx, r) in result.results().iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(r.target_branch()),
            status_cell(r.status()),
            Cell::new(detail(r)),
        ]);
    }
    table
}

pub fn print_batch(result: &BatchResult) {
    println!();
    println!(
        "{}",
        style::header(&format!("Merge of '{}' ({})", result.source_ref, result.state))
    );
    println!();
    println!("{}", results_table(result));
    println!();

    if let Some(paused) = &result.paused {
        println!(
            "{}",
            style::paused(&format!("Paused on '{}' for manual conflict resolution", paused.branch))
        );
        println!("  1. Resolve the conflicts in the working tree and stage the files");
        println!("  2. Continue with: git-multimerge resume {}", paused.token);
        println!("  or give up with:  git-multimerge abandon {}", paused.token);
    } else if result.cancelled {
        println!("{}", style::warn("Batch was cancelled; remaining branches were not merged"));
    } else if result.batch_status() <= MergeStatus::Skipped {
        println!("{}", style::success("All branches merged"));
    } else {
        println!(
            "{}",
            style::error(&format!("Batch finished with status {}", result.batch_status()))
        );
    }
    println!();
}

pub fn print_paused(paused: &PausedBatch) {
    println!();
    println!(
        "{}",
        style::paused(&format!(
            "Batch {} is paused on '{}'",
            paused.token(),
            paused.branch()
        ))
    );
    println!("  Source    : {}", paused.batch().source_ref);
    let remaining = paused.remaining_targets();
    println!(
        "  Remaining : {}",
        if remaining.is_empty() {
            "none".to_string()
        } else {
            remaining.join(", ")
        }
    );
    println!();
    println!("{}", results_table(paused.result()));
    println!();
}

pub fn history_table(entries: &[HistoryEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Batch", "Source", "Targets", "Status", "Finished"]);

    for entry in entries {
        let result = &entry.result;
        let batch_id = result.batch_id.to_string();
        let status = if result.cancelled {
            Cell::new("— cancelled").fg(Color::DarkGrey)
        } else {
            status_cell(result.batch_status())
        };
        let finished = result
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "—".to_string());

        table.add_row(vec![
            Cell::new(short(&batch_id)),
            Cell::new(&result.source_ref),
            Cell::new(result.results().len()),
            status,
            Cell::new(finished),
        ]);
    }
    table
}

/// Success when every branch merged or was already up to date.
pub fn exit_code(result: &BatchResult) -> ExitCode {
    if result.is_paused() {
        ExitCode::from(EXIT_PAUSED)
    } else if result.batch_status() <= MergeStatus::Skipped && !result.cancelled {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
