pub mod connection;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::models::breaks::Break;
use crate::models::session::Session;

/// What the client needs from the backend: inserts, updates by identifier,
/// filtered selects over the sessions and breaks tables, and a reachability
/// probe. The sync drain and the action handlers only ever talk to this
/// trait, so tests can script failures without a database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<i64>;

    async fn update_session(
        &self,
        id: i64,
        end_time: DateTime<Local>,
        duration_seconds: i64,
        total_hours: f64,
        description: Option<&str>,
    ) -> Result<()>;

    async fn insert_break(&self, session_id: i64, brk: &Break) -> Result<i64>;

    async fn update_break(
        &self,
        id: i64,
        end_time: DateTime<Local>,
        duration_seconds: i64,
    ) -> Result<()>;

    async fn sessions_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Session>>;

    /// Sessions with no end time, oldest first. Feeds Clean Up Stuck Sessions.
    async fn open_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>>;

    async fn breaks_for_session(&self, session_id: i64) -> Result<Vec<Break>>;

    async fn total_hours_for_user(&self, user_id: &str) -> Result<f64>;

    async fn delete_session(&self, id: i64) -> Result<()>;

    async fn delete_breaks_for_session(&self, session_id: i64) -> Result<()>;

    /// True when the backend currently answers. Never errors.
    async fn ping(&self) -> bool;
}
