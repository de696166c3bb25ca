use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::record_id::RecordId;

/// A pause within a session. At most one break per session may be open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Break {
    pub id: RecordId,
    pub session_id: RecordId,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub duration_seconds: i64,
}

impl Break {
    pub fn begin(session_id: RecordId, now: DateTime<Local>) -> Self {
        Self {
            id: RecordId::new_pending(),
            session_id,
            start_time: now,
            end_time: None,
            duration_seconds: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn finish(&mut self, now: DateTime<Local>) {
        self.duration_seconds = now.signed_duration_since(self.start_time).num_seconds();
        self.end_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_break_lifecycle() {
        let now = Local::now();
        let mut brk = Break::begin(RecordId::new_pending(), now);
        assert!(brk.is_open());

        brk.finish(now + Duration::minutes(20));
        assert!(!brk.is_open());
        assert_eq!(brk.duration_seconds, 20 * 60);
    }
}
