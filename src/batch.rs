//! Multi-item commands with partial success.
//!
//! A shared precondition is checked once. If it fails, nothing is attempted
//! and the whole batch fails with that single error. Otherwise every item runs
//! in isolation and yields exactly one [`BatchItemResult`], in input order.
//! Under [`BatchMode::StopOnError`] the items after the first failure are not
//! attempted and report `skipped`.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{panic_message, CommandError, ErrorCode};

/// Items name themselves in their result row, e.g. `("index", 3)`.
pub trait BatchItem {
    fn identifier(&self) -> (&'static str, Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
    Skipped,
}

/// What a failed item does to the items after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    #[default]
    ContinueOnError,
    StopOnError,
}

impl BatchMode {
    pub fn from_continue_flag(continue_on_error: bool) -> Self {
        if continue_on_error {
            Self::ContinueOnError
        } else {
            Self::StopOnError
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemResult {
    #[serde(flatten)]
    pub identifier: Map<String, Value>,
    pub status: ItemStatus,
    #[serde(flatten)]
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchItemResult {
    fn success(identifier: Map<String, Value>, data: Map<String, Value>) -> Self {
        Self {
            identifier,
            status: ItemStatus::Success,
            data,
            error_code: None,
            message: None,
        }
    }

    fn failure(identifier: Map<String, Value>, error: CommandError) -> Self {
        Self {
            identifier,
            status: ItemStatus::Error,
            data: Map::new(),
            error_code: Some(error.code),
            message: Some(error.message),
        }
    }

    fn skipped(identifier: Map<String, Value>) -> Self {
        Self {
            identifier,
            status: ItemStatus::Skipped,
            data: Map::new(),
            error_code: None,
            message: Some("Not attempted after an earlier failure".to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItemResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Batch operation completed: {} succeeded, {} failed",
            self.succeeded, self.failed
        );
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped));
        }
        summary
    }
}

/// Run `per_item` over `items` against the target produced by `precondition`.
///
/// Item failures, including panics, are captured into that item's row and
/// never stop the remaining items.
pub fn execute_batch<T, I, P, F>(
    precondition: P,
    items: &[I],
    per_item: F,
) -> Result<BatchReport, CommandError>
where
    I: BatchItem,
    P: FnOnce() -> Result<T, CommandError>,
    F: FnMut(&T, &I) -> Result<Map<String, Value>, CommandError>,
{
    execute_batch_with(BatchMode::ContinueOnError, precondition, items, per_item)
}

/// [`execute_batch`] with an explicit [`BatchMode`].
pub fn execute_batch_with<T, I, P, F>(
    mode: BatchMode,
    precondition: P,
    items: &[I],
    mut per_item: F,
) -> Result<BatchReport, CommandError>
where
    I: BatchItem,
    P: FnOnce() -> Result<T, CommandError>,
    F: FnMut(&T, &I) -> Result<Map<String, Value>, CommandError>,
{
    let target = precondition()?;

    let mut results = Vec::with_capacity(items.len());
    let mut stopped = false;
    for item in items {
        let (key, id) = item.identifier();
        let mut identifier = Map::new();
        identifier.insert(key.to_string(), id);

        if stopped {
            results.push(BatchItemResult::skipped(identifier));
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| per_item(&target, item)))
            .unwrap_or_else(|payload| Err(CommandError::internal(panic_message(payload.as_ref()))));

        let row = match outcome {
            Ok(data) => BatchItemResult::success(identifier, data),
            Err(e) => {
                debug!(code = %e.code, message = %e.message, "batch item failed");
                stopped = mode == BatchMode::StopOnError;
                BatchItemResult::failure(identifier, e)
            }
        };
        results.push(row);
    }

    let count = |status: ItemStatus| results.iter().filter(|r| r.status == status).count();
    let succeeded = count(ItemStatus::Success);
    let failed = count(ItemStatus::Error);
    let skipped = count(ItemStatus::Skipped);
    if failed > 0 {
        warn!(succeeded, failed, skipped, "batch finished with item failures");
    }
    Ok(BatchReport {
        results,
        succeeded,
        failed,
        skipped,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;

    struct Param {
        index: usize,
        value: f64,
    }

    impl BatchItem for Param {
        fn identifier(&self) -> (&'static str, Value) {
            ("index", json!(self.index))
        }
    }

    fn set_param(count: &usize, p: &Param) -> Result<Map<String, Value>, CommandError> {
        if p.index >= *count {
            return Err(CommandError::new(
                ErrorCode::InvalidParameterIndex,
                format!("Parameter index {} out of range", p.index),
            ));
        }
        let mut data = Map::new();
        data.insert("new_value".into(), json!(p.value));
        Ok(data)
    }

    #[test]
    fn test_partial_success_keeps_order() {
        let items = vec![
            Param { index: 0, value: 0.25 },
            Param { index: 99, value: 0.5 },
        ];
        let report = execute_batch(|| Ok(8usize), &items, set_param).unwrap();
        let json = serde_json::to_value(&report.results).unwrap();
        assert_eq!(json[0], json!({"index": 0, "status": "success", "new_value": 0.25}));
        assert_eq!(json[1]["index"], 99);
        assert_eq!(json[1]["status"], "error");
        assert_eq!(json[1]["error_code"], "INVALID_PARAMETER_INDEX");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.summary(), "Batch operation completed: 1 succeeded, 1 failed");
    }

    #[test]
    fn test_precondition_failure_runs_nothing() {
        let calls = Cell::new(0);
        let items = vec![Param { index: 0, value: 0.1 }, Param { index: 1, value: 0.2 }];
        let err = execute_batch(
            || -> Result<usize, CommandError> {
                Err(CommandError::new(ErrorCode::DeviceNotSelected, "No device is currently selected"))
            },
            &items,
            |_, _| {
                calls.set(calls.get() + 1);
                Ok(Map::new())
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceNotSelected);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let items: Vec<Param> = Vec::new();
        let report = execute_batch(|| Ok(8usize), &items, set_param).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.summary(), "Batch operation completed: 0 succeeded, 0 failed");
    }

    #[test]
    fn test_panicking_item_becomes_internal_error() {
        let items = vec![
            Param { index: 0, value: 0.1 },
            Param { index: 1, value: 0.2 },
            Param { index: 2, value: 0.3 },
        ];
        let report = execute_batch(
            || Ok(()),
            &items,
            |_, p| {
                if p.index == 1 {
                    panic!("collaborator exploded");
                }
                Ok(Map::new())
            },
        )
        .unwrap();
        let statuses: Vec<ItemStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![ItemStatus::Success, ItemStatus::Error, ItemStatus::Success]);
        assert_eq!(report.results[1].error_code, Some(ErrorCode::InternalError));
        assert_eq!(report.results[1].message.as_deref(), Some("collaborator exploded"));
    }

    #[test]
    fn test_stop_on_error_skips_the_rest() {
        let calls = Cell::new(0);
        let items = vec![
            Param { index: 0, value: 0.1 },
            Param { index: 99, value: 0.2 },
            Param { index: 1, value: 0.3 },
        ];
        let report = execute_batch_with(
            BatchMode::StopOnError,
            || Ok(8usize),
            &items,
            |count, p| {
                calls.set(calls.get() + 1);
                set_param(count, p)
            },
        )
        .unwrap();
        assert_eq!(calls.get(), 2);
        let statuses: Vec<ItemStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![ItemStatus::Success, ItemStatus::Error, ItemStatus::Skipped]);
        assert_eq!((report.succeeded, report.failed, report.skipped), (1, 1, 1));
        assert_eq!(
            report.summary(),
            "Batch operation completed: 1 succeeded, 1 failed, 1 skipped"
        );
        let json = serde_json::to_value(&report.results[2]).unwrap();
        assert_eq!(json["index"], 1);
        assert_eq!(json["status"], "skipped");
        assert!(json.get("error_code").is_none());
    }

    #[test]
    fn test_continue_flag_selects_mode() {
        assert_eq!(BatchMode::from_continue_flag(true), BatchMode::ContinueOnError);
        assert_eq!(BatchMode::from_continue_flag(false), BatchMode::StopOnError);
        assert_eq!(BatchMode::default(), BatchMode::ContinueOnError);
    }

    #[test]
    fn test_each_item_independent_of_neighbours() {
        let items: Vec<Param> = (0..10).map(|i| Param { index: i, value: 0.5 }).collect();
        let report = execute_batch(|| Ok(5usize), &items, set_param).unwrap();
        assert_eq!(report.results.len(), 10);
        for (i, row) in report.results.iter().enumerate() {
            assert_eq!(row.identifier["index"], json!(i));
            assert_eq!(row.is_success(), i < 5);
        }
    }
}
