use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::record_id::RecordId;

/// One continuous work period. Open while `end_time` is None; terminal once
/// it is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: RecordId,
    pub user_id: String,
    pub date: NaiveDate,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub duration_seconds: i64, // in seconds
    pub total_hours: f64,
    pub description: Option<String>,
}

impl Session {
    pub fn begin(user_id: &str, now: DateTime<Local>) -> Self {
        Self {
            id: RecordId::new_pending(),
            user_id: user_id.to_string(),
            date: now.date_naive(),
            start_time: now,
            end_time: None,
            duration_seconds: 0,
            total_hours: 0.0,
            description: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn elapsed_seconds(&self, now: DateTime<Local>) -> i64 {
        now.signed_duration_since(self.start_time).num_seconds()
    }

    /// Closes the session. Break time is excluded from the hour total; the
    /// duration keeps the full wall-clock span.
    pub fn finish(
        &mut self,
        now: DateTime<Local>,
        break_seconds: i64,
        description: Option<String>,
    ) {
        let elapsed = self.elapsed_seconds(now);
        self.end_time = Some(now);
        self.duration_seconds = elapsed;
        let worked = (elapsed - break_seconds).max(0);
        self.total_hours = (worked as f64 / 3600.0 * 100.0).round() / 100.0;
        self.description = description;
    }
}
