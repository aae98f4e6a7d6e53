use skysync_engine::SyncOutcome;
use skysync_store::{DispatchEvent, SyncTask, SyncTaskItem};

/// Render a finished job for the terminal.
pub fn render_outcome(outcome: &SyncOutcome) -> String {
    let mut out = String::new();
    if let Some(message) = &outcome.message {
        out.push_str(&format!("config {}: {}\n", outcome.config_id, message));
        return out;
    }
    let verdict = if outcome.success { "completed" } else { "failed" };
    out.push_str(&format!(
        "config {} {} in {}s (task {})\n",
        outcome.config_id,
        verdict,
        outcome.elapsed_secs,
        outcome.task_id.map_or("-".into(), |id| id.to_string()),
    ));
    let stats = &outcome.stats;
    out.push_str(&format!(
        "  processed {}  transferred {}  skipped {}  deleted {}  folders {}\n",
        stats.files_processed,
        stats.files_transferred,
        stats.files_skipped,
        stats.files_deleted,
        stats.folder_created,
    ));
    for error in &stats.errors {
        out.push_str(&format!("  ! {error}\n"));
    }
    out
}

pub fn render_tasks(tasks: &[SyncTask]) -> String {
    if tasks.is_empty() {
        return "No tasks.\n".to_string();
    }
    let mut out = format!(
        "{:>6}  {:>8}  {:<20}  {:<9}  {:>6}  {}\n",
        "id", "config", "started", "status", "secs", "error"
    );
    for task in tasks {
        out.push_str(&format!(
            "{:>6}  {:>8}  {:<20}  {:<9}  {:>6}  {}\n",
            task.id,
            task.config_id,
            task.start_time.format("%Y-%m-%d %H:%M:%S"),
            task.status.to_string(),
            task.dura_time,
            task.err_msg.as_deref().unwrap_or("-"),
        ));
    }
    out
}

pub fn render_items(items: &[SyncTaskItem]) -> String {
    if items.is_empty() {
        return "No task items.\n".to_string();
    }
    let mut out = format!(
        "{:>6}  {:<6}  {:<9}  {:>12}  {:<28}  {}\n",
        "id", "op", "status", "size", "name", "path"
    );
    for item in items {
        out.push_str(&format!(
            "{:>6}  {:<6}  {:<9}  {:>12}  {:<28}  {}\n",
            item.id,
            item.op.to_string(),
            item.status.to_string(),
            item.file_size,
            item.file_name,
            if item.dst_path.is_empty() { &item.src_path } else { &item.dst_path },
        ));
    }
    out
}

pub fn render_events(events: &[DispatchEvent]) -> String {
    if events.is_empty() {
        return "No dispatch events.\n".to_string();
    }
    let mut out = String::new();
    for event in events {
        let line = match event {
            DispatchEvent::TickCompleted { at, checked, executed, failed, skipped } => format!(
                "{at}  tick: {checked} checked, {executed} executed, {failed} failed, {skipped} skipped"
            ),
            DispatchEvent::ConfigSkipped { at, config_id, reason } => {
                format!("{at}  config {config_id} skipped: {reason}")
            }
            DispatchEvent::ConfigFailed { at, config_id, message } => {
                format!("{at}  config {config_id} failed: {message}")
            }
            DispatchEvent::JobFinished { at, config_id, task_id, success, message } => format!(
                "{at}  config {config_id} job {}: task {}{}",
                if *success { "completed" } else { "failed" },
                task_id.map_or("-".into(), |id| id.to_string()),
                message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default(),
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}
