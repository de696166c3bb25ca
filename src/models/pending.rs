use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::breaks::Break;
use crate::models::record_id::{self, RecordId};
use crate::models::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    BeginSession,
    EndSession,
    BeginBreak,
    EndBreak,
}

/// A mutation the backend has not confirmed yet. Lives in the pending queue
/// until a drain delivers it, or in the dead-letter list once it has burned
/// through its retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub kind: ActionKind,
    /// Which session this mutation belongs to, as the id string it carried
    /// at enqueue time. The drain blocks later actions of a session once an
    /// earlier one fails, so end mutations never outrun their begin.
    pub session_key: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Local>,
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionPayload {
    pub session_id: RecordId,
    pub end_time: DateTime<Local>,
    pub duration_seconds: i64,
    pub total_hours: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndBreakPayload {
    pub break_id: RecordId,
    pub session_id: RecordId,
    pub end_time: DateTime<Local>,
    pub duration_seconds: i64,
}

impl PendingAction {
    fn new(
        id: String,
        kind: ActionKind,
        session_key: String,
        payload: serde_json::Value,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id,
            kind,
            session_key,
            payload,
            enqueued_at: now,
            attempts: 0,
            next_attempt_at: None,
        }
    }

    pub fn begin_session(session: &Session, now: DateTime<Local>) -> Self {
        Self::new(
            session.id.to_string(),
            ActionKind::BeginSession,
            session.id.to_string(),
            serde_json::to_value(session).unwrap_or(serde_json::Value::Null),
            now,
        )
    }

    pub fn end_session(payload: &EndSessionPayload, now: DateTime<Local>) -> Self {
        Self::new(
            record_id::local_token(),
            ActionKind::EndSession,
            payload.session_id.to_string(),
            serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            now,
        )
    }

    pub fn begin_break(brk: &Break, now: DateTime<Local>) -> Self {
        Self::new(
            brk.id.to_string(),
            ActionKind::BeginBreak,
            brk.session_id.to_string(),
            serde_json::to_value(brk).unwrap_or(serde_json::Value::Null),
            now,
        )
    }

    pub fn end_break(payload: &EndBreakPayload, now: DateTime<Local>) -> Self {
        Self::new(
            record_id::local_token(),
            ActionKind::EndBreak,
            payload.session_id.to_string(),
            serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_session_action_mirrors_session_id() {
        let now = Local::now();
        let session = Session::begin("student", now);
        let action = PendingAction::begin_session(&session, now);

        assert_eq!(action.kind, ActionKind::BeginSession);
        assert_eq!(action.id, session.id.to_string());
        assert_eq!(action.session_key, session.id.to_string());
        assert_eq!(action.attempts, 0);
        assert!(action.next_attempt_at.is_none());

        let roundtrip: Session = serde_json::from_value(action.payload).unwrap();
        assert_eq!(roundtrip.id, session.id);
    }

    #[test]
    fn test_end_session_action_gets_synthetic_id() {
        let now = Local::now();
        let session = Session::begin("student", now);
        let payload = EndSessionPayload {
            session_id: session.id.clone(),
            end_time: now,
            duration_seconds: 3600,
            total_hours: 1.0,
            description: None,
        };
        let action = PendingAction::end_session(&payload, now);

        assert_eq!(action.kind, ActionKind::EndSession);
        assert_ne!(action.id, session.id.to_string());
        assert_eq!(action.session_key, session.id.to_string());
    }
}
