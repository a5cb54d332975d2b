//! JSONL audit trail of dispatched commands.
//!
//! One line per command in `{audit_dir}/YYYY-MM-DD.jsonl`. Best-effort: a
//! write failure is logged at debug level and never reaches the caller.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CommandError;

#[derive(Serialize)]
struct CommandAuditEntry<'a> {
    ts: u64,
    command: &'a str,
    input: &'a Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    duration_ms: u64,
}

/// Append one command execution to today's audit file.
pub fn log_command_call(
    audit_dir: &Path,
    command: &str,
    input: &Value,
    outcome: Result<&str, &CommandError>,
    duration: Duration,
) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let (ok, code, message) = match outcome {
        Ok(msg) => (true, None, msg),
        Err(e) => (false, Some(e.code.as_str()), e.message.as_str()),
    };

    let entry = CommandAuditEntry {
        ts: now,
        command,
        input,
        ok,
        code,
        message,
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
    };

    if let Err(e) = append_line(audit_dir, now, &entry) {
        debug!(error = %e, dir = %audit_dir.display(), "audit write skipped");
    }
}

fn append_line(audit_dir: &Path, now: u64, entry: &CommandAuditEntry<'_>) -> std::io::Result<()> {
    fs::create_dir_all(audit_dir)?;
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_file(audit_dir, now))?;
    writeln!(file, "{json}")
}

fn audit_file(audit_dir: &Path, epoch_secs: u64) -> PathBuf {
    audit_dir.join(format!("{}.jsonl", date_from_epoch(epoch_secs)))
}

/// Format epoch seconds as `YYYY-MM-DD` (UTC).
#[allow(clippy::unreadable_literal, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn date_from_epoch(epoch_secs: u64) -> String {
    // Civil date from day count (Howard Hinnant)
    let days = (epoch_secs / 86400) as i64;
    let z = days + 719468;
    let era = (if z >= 0 { z } else { z - 146096 }) / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = (yoe as i64) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!("{y:04}-{m:02}-{d:02}")
}
