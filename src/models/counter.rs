use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sequential cursor for one reference path.
///
/// `position` counts reads since the last reset and is never clamped; the
/// line index is `position % line_count`, computed when the line is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialCounter {
    /// The path as written in the `<*path>` reference, after normalization.
    pub path: String,
    pub position: i64,
    pub updated_at: DateTime<Utc>,
}

/// Input for resetting sequential cursors. `None` resets every path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetCountersInput {
    #[serde(default)]
    pub path: Option<String>,
}
