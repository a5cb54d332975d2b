//! Shared validation helpers for registry command handlers.
//!
//! Centralizes numeric checks so all handlers produce consistent error codes
//! and messages.

use crate::error::{CommandError, ErrorCode};
use crate::registry::params::TrackSpan;

/// Upper bound on the tracks one batch operation may address.
pub const MAX_TRACKS_PER_OPERATION: usize = 1024;

/// Validate that `value` is finite and within [0.0, 1.0].
pub fn validate_normalized(value: f64, name: &str) -> Result<(), CommandError> {
    if !value.is_finite() {
        return Err(CommandError::invalid_range(format!("{name} must be finite")));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(CommandError::invalid_range(format!(
            "{name} ({value}) must be between 0.0 and 1.0"
        )));
    }
    Ok(())
}

/// Validate a remote-control index against the device's control count and
/// return it as a position. Negative indices are out of range too.
pub fn validate_parameter_index(index: i64, count: usize) -> Result<usize, CommandError> {
    position_within(index, count).ok_or_else(|| {
        CommandError::new(
            ErrorCode::InvalidParameterIndex,
            format!("Parameter index {index} is out of range (device has {count} parameters)"),
        )
    })
}

/// Validate a playhead position in beats.
pub fn validate_beats(beats: f64) -> Result<(), CommandError> {
    if !beats.is_finite() || beats < 0.0 {
        return Err(CommandError::invalid_range(format!(
            "beats ({beats}) must be a finite number >= 0"
        )));
    }
    Ok(())
}

/// Validate a remote-control page index against the page count.
pub fn validate_page_index(page: i64, total: usize) -> Result<usize, CommandError> {
    position_within(page, total).ok_or_else(|| {
        CommandError::new(
            ErrorCode::IndexOutOfBounds,
            format!("Page index {page} is out of bounds (device has {total} pages)"),
        )
    })
}

/// Validate a send slot against the track's send count.
pub fn validate_send_index(send: i64, total: usize) -> Result<usize, CommandError> {
    position_within(send, total).ok_or_else(|| {
        CommandError::new(
            ErrorCode::IndexOutOfBounds,
            format!("Send index {send} is out of bounds (track has {total} sends)"),
        )
    })
}

/// Expand a [`TrackSpan`] into the track indices it names, in order.
///
/// Either `track_indices` or both range ends must be given. Individual
/// indices are not checked here; an unknown track fails only its own row.
pub fn validate_track_span(span: &TrackSpan) -> Result<Vec<i64>, CommandError> {
    let indices = match (&span.track_indices, span.start_index, span.end_index) {
        (Some(indices), None, None) => indices.clone(),
        (Some(_), _, _) => {
            return Err(CommandError::invalid_parameter(
                "Give track_indices or start_index/end_index, not both",
            ))
        }
        (None, Some(start), Some(end)) => {
            if start < 0 || end < start {
                return Err(CommandError::invalid_range(format!(
                    "Invalid track range {start}..={end}: need 0 <= start_index <= end_index"
                )));
            }
            let within_limit = usize::try_from(end - start)
                .is_ok_and(|n| n < MAX_TRACKS_PER_OPERATION);
            if !within_limit {
                return Err(CommandError::invalid_range(format!(
                    "Track range {start}..={end} exceeds {MAX_TRACKS_PER_OPERATION} tracks"
                )));
            }
            (start..=end).collect()
        }
        (None, _, _) => {
            return Err(CommandError::new(
                ErrorCode::MissingRequiredParameter,
                "Provide track_indices, or both start_index and end_index",
            ))
        }
    };
    if indices.len() > MAX_TRACKS_PER_OPERATION {
        return Err(CommandError::invalid_range(format!(
            "{} track indices exceed the limit of {MAX_TRACKS_PER_OPERATION}",
            indices.len()
        )));
    }
    Ok(indices)
}

fn position_within(index: i64, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|i| *i < len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_bounds() {
        assert!(validate_normalized(0.0, "value").is_ok());
        assert!(validate_normalized(1.0, "value").is_ok());
        let err = validate_normalized(1.5, "volume").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert!(err.message.starts_with("volume"));
        assert!(validate_normalized(f64::NAN, "value").is_err());
    }

    #[test]
    fn test_parameter_index() {
        assert_eq!(validate_parameter_index(7, 8).unwrap(), 7);
        let err = validate_parameter_index(99, 8).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterIndex);
        let err = validate_parameter_index(-1, 8).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterIndex);
        assert!(err.message.starts_with("Parameter index -1"));
    }

    #[test]
    fn test_beats_and_pages() {
        assert!(validate_beats(0.0).is_ok());
        assert_eq!(validate_beats(-0.5).unwrap_err().code, ErrorCode::InvalidRange);
        assert_eq!(validate_page_index(1, 2).unwrap(), 1);
        assert_eq!(validate_page_index(2, 2).unwrap_err().code, ErrorCode::IndexOutOfBounds);
        assert_eq!(validate_page_index(-1, 2).unwrap_err().code, ErrorCode::IndexOutOfBounds);
    }

    #[test]
    fn test_track_span_forms() {
        let list = TrackSpan {
            track_indices: Some(vec![3, 0]),
            ..TrackSpan::default()
        };
        assert_eq!(validate_track_span(&list).unwrap(), vec![3, 0]);

        let range = TrackSpan {
            start_index: Some(1),
            end_index: Some(3),
            ..TrackSpan::default()
        };
        assert_eq!(validate_track_span(&range).unwrap(), vec![1, 2, 3]);

        let both = TrackSpan {
            track_indices: Some(vec![0]),
            start_index: Some(0),
            end_index: Some(1),
        };
        assert_eq!(validate_track_span(&both).unwrap_err().code, ErrorCode::InvalidParameter);

        let half = TrackSpan {
            start_index: Some(0),
            ..TrackSpan::default()
        };
        assert_eq!(
            validate_track_span(&half).unwrap_err().code,
            ErrorCode::MissingRequiredParameter
        );
    }

    #[test]
    fn test_track_span_bounds() {
        let reversed = TrackSpan {
            start_index: Some(4),
            end_index: Some(1),
            ..TrackSpan::default()
        };
        assert_eq!(validate_track_span(&reversed).unwrap_err().code, ErrorCode::InvalidRange);

        let huge = TrackSpan {
            start_index: Some(0),
            end_index: Some(i64::MAX),
            ..TrackSpan::default()
        };
        assert_eq!(validate_track_span(&huge).unwrap_err().code, ErrorCode::InvalidRange);

        let at_limit = TrackSpan {
            start_index: Some(0),
            end_index: Some(1023),
            ..TrackSpan::default()
        };
        assert_eq!(validate_track_span(&at_limit).unwrap().len(), MAX_TRACKS_PER_OPERATION);
    }

    #[test]
    fn test_send_index() {
        assert_eq!(validate_send_index(0, 1).unwrap(), 0);
        let err = validate_send_index(3, 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::IndexOutOfBounds);
        assert!(err.message.contains("track has 1 sends"));
    }
}
