//! Event logging and the final summary.

use std::collections::HashMap;
use std::fmt::Write;

use clipdrop_uploader::{UploadEvent, UploadReport};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Logs progress in steps of this many percent per file.
const PROGRESS_STEP: u8 = 10;

/// Drains upload events until the orchestrator is dropped.
pub async fn log_events(mut rx: mpsc::Receiver<UploadEvent>) {
    let mut last_logged: HashMap<String, u8> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::Progress {
                file,
                phase,
                percent,
            } => {
                let last = last_logged.get(&file).copied();
                if should_log(last, percent) {
                    info!(file = %file, phase = ?phase, "{percent}%");
                    last_logged.insert(file, percent);
                }
            }
            UploadEvent::PartRetrying {
                file,
                part_number,
                attempt,
                delay,
                error,
            } => warn!(
                file = %file,
                part = ?part_number,
                attempt,
                retry_in = ?delay,
                "{error}"
            ),
            UploadEvent::PartCompleted { file, part_number } => {
                debug!(file = %file, part = part_number, "part done");
            }
            UploadEvent::Completed { file, object_id } => {
                debug!(file = %file, object_id = %object_id, "done");
            }
            UploadEvent::Failed { file, phase, error } => {
                debug!(file = %file, phase = %phase, "failed: {error}");
            }
        }
    }
}

fn should_log(last: Option<u8>, percent: u8) -> bool {
    match last {
        None => true,
        Some(last) => percent == 100 || percent >= last.saturating_add(PROGRESS_STEP),
    }
}

/// One line per file plus a totals line.
pub fn summary(reports: &[UploadReport]) -> String {
    let width = reports
        .iter()
        .map(|r| r.file_name.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();

    for r in reports {
        if r.success {
            let _ = writeln!(
                out,
                "ok    {:width$}  {}",
                r.file_name,
                r.object_id.as_deref().unwrap_or("-")
            );
        } else {
            let phase = r.failed_phase.map(|p| p.as_str()).unwrap_or("unknown");
            let _ = writeln!(
                out,
                "FAIL  {:width$}  [{phase}] {}",
                r.file_name,
                r.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let ok = reports.iter().filter(|r| r.success).count();
    let _ = write!(out, "{ok}/{} uploaded", reports.len());
    out
}
