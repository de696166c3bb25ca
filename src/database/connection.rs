use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool as Pool;
use std::time::Duration;

use crate::database::RemoteStore;
use crate::models::breaks::Break;
use crate::models::record_id::RecordId;
use crate::models::session::Session;

pub struct Database {
    pool: Pool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i64,
    user_id: String,
    session_date: NaiveDate,
    start_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    duration_seconds: i64,
    total_hours: f64,
    description: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: RecordId::Confirmed(row.id),
            user_id: row.user_id,
            date: row.session_date,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_seconds: row.duration_seconds,
            total_hours: row.total_hours,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BreakRow {
    id: i64,
    session_id: i64,
    start_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    duration_seconds: i64,
}

impl From<BreakRow> for Break {
    fn from(row: BreakRow) -> Self {
        Break {
            id: RecordId::Confirmed(row.id),
            session_id: RecordId::Confirmed(row.session_id),
            start_time: row.start_time,
            end_time: row.end_time,
            duration_seconds: row.duration_seconds,
        }
    }
}

impl Database {
    /// Lazy pool: nothing is connected until the first query, so starting
    /// the client while the backend is down is fine. The short acquire
    /// timeout keeps queries from hanging the event loop when it is.
    pub fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                session_date DATE NOT NULL,
                start_time TIMESTAMP WITH TIME ZONE NOT NULL,
                end_time TIMESTAMP WITH TIME ZONE,
                duration_seconds BIGINT NOT NULL DEFAULT 0,
                total_hours DOUBLE PRECISION NOT NULL DEFAULT 0,
                description TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS breaks (
                id BIGSERIAL PRIMARY KEY,
                session_id BIGINT NOT NULL,
                start_time TIMESTAMP WITH TIME ZONE NOT NULL,
                end_time TIMESTAMP WITH TIME ZONE,
                duration_seconds BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Add description column if it doesn't exist (for migration)
        sqlx::query(
            r#"
            ALTER TABLE sessions ADD COLUMN IF NOT EXISTS description TEXT
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for Database {
    async fn insert_session(&self, session: &Session) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO sessions (user_id, session_date, start_time, end_time, duration_seconds, total_hours, description) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&session.user_id)
        .bind(session.date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.duration_seconds)
        .bind(session.total_hours)
        .bind(&session.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.0)
    }

    async fn update_session(
        &self,
        id: i64,
        end_time: DateTime<Local>,
        duration_seconds: i64,
        total_hours: f64,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET end_time = $1, duration_seconds = $2, total_hours = $3, description = $4 WHERE id = $5",
        )
        .bind(end_time)
        .bind(duration_seconds)
        .bind(total_hours)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_break(&self, session_id: i64, brk: &Break) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO breaks (session_id, start_time, end_time, duration_seconds) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(session_id)
        .bind(brk.start_time)
        .bind(brk.end_time)
        .bind(brk.duration_seconds)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.0)
    }

    async fn update_break(
        &self,
        id: i64,
        end_time: DateTime<Local>,
        duration_seconds: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE breaks SET end_time = $1, duration_seconds = $2 WHERE id = $3")
            .bind(end_time)
            .bind(duration_seconds)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sessions_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, session_date, start_time, end_time, duration_seconds, total_hours, description FROM sessions WHERE user_id = $1 ORDER BY start_time DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn open_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, session_date, start_time, end_time, duration_seconds, total_hours, description FROM sessions WHERE user_id = $1 AND end_time IS NULL ORDER BY start_time ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn breaks_for_session(&self, session_id: i64) -> Result<Vec<Break>> {
        let rows = sqlx::query_as::<_, BreakRow>(
            "SELECT id, session_id, start_time, end_time, duration_seconds FROM breaks WHERE session_id = $1 ORDER BY start_time ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Break::from).collect())
    }

    async fn total_hours_for_user(&self, user_id: &str) -> Result<f64> {
        let total: (Option<f64>,) = sqlx::query_as(
            "SELECT SUM(total_hours) FROM sessions WHERE user_id = $1 AND end_time IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.0.unwrap_or(0.0))
    }

    async fn delete_session(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_breaks_for_session(&self, session_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM breaks WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
