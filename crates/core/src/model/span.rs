use serde::{Deserialize, Serialize};

/// The reduced span record pushed to dashboard clients.
///
/// Optional fields serialize as `null` when the source attribute was absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedSpan {
    pub span_id: String,
    pub trace_id: String,
    pub start_time: u64,
    pub end_time: u64,
    pub package_size: Option<i64>,
    pub status_code: Option<i64>,
    pub end_point: Option<String>,
    pub request_type: String,
}

impl SimplifiedSpan {
    pub fn duration_nanos(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}
