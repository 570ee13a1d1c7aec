use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the controller and its active session, if any
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether a session is currently processing
    pub is_processing: bool,

    /// Identifier of the active session
    pub session_id: Option<String>,

    /// When the active session started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the active session started
    pub duration_secs: f64,

    /// Transcript updates received by the active session
    pub transcript_updates: u64,
}
