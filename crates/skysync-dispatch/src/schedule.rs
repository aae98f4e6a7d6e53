use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;

use crate::error::DispatchError;

/// Parse a configuration's cron expression.
///
/// Stored expressions use the classic 5-field form (or 6/7 fields with
/// seconds/years); the cron crate always wants the seconds field, so 5-field
/// expressions get a literal `0` prepended.
pub fn parse_cron(expr: &str) -> Result<Schedule, DispatchError> {
    let trimmed = expr.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| DispatchError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// The most recent firing that is still inside the execution window, i.e. the
/// latest instant `t` with `now - window <= t <= now`. `None` when the last
/// firing is already older than the window.
pub fn due_fire(
    schedule: &Schedule,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<DateTime<Utc>> {
    // `after` is exclusive, so back up one extra second to keep the
    // window-edge firing (lag == window) eligible.
    let from = now - window - Duration::seconds(1);
    schedule.after(&from).take_while(|t| *t <= now).last()
}

pub fn next_fire(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&now).next()
}

/// Dispatch decision for one configuration at one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Run the job for the firing at `prev_fire`.
    Run { prev_fire: DateTime<Utc> },
    Skip { reason: &'static str },
}

/// Decide whether a configuration is due.
///
/// A config runs iff its latest firing falls inside the execution window and
/// `last_sync` predates that firing (a null `last_sync` counts as predating
/// everything). The `last_sync` write-fence at job start keeps a double-fire
/// within one window down to a single task.
pub fn eligibility(
    cron_expr: &str,
    last_sync: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Eligibility, DispatchError> {
    let schedule = parse_cron(cron_expr)?;
    match due_fire(&schedule, now, window) {
        None => Ok(Eligibility::Skip { reason: "outside the execution window" }),
        Some(prev_fire) => match last_sync {
            Some(last) if last >= prev_fire => {
                Ok(Eligibility::Skip { reason: "already ran for this firing" })
            }
            _ => Ok(Eligibility::Run { prev_fire }),
        },
    }
}
