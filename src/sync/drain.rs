use anyhow::{anyhow, Result};
use chrono::Local;
use std::collections::HashSet;

use crate::database::RemoteStore;
use crate::models::breaks::Break;
use crate::models::pending::{ActionKind, EndBreakPayload, EndSessionPayload, PendingAction};
use crate::models::record_id::RecordId;
use crate::models::session::Session;
use crate::store::mirror::MirrorStore;
use crate::store::queue::PendingQueue;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dead_lettered: usize,
}

impl DrainReport {
    pub fn summary(&self) -> String {
        format!(
            "Sync: {} delivered, {} failed, {} skipped, {} dead-lettered",
            self.delivered, self.failed, self.skipped, self.dead_lettered
        )
    }
}

/// Replays queued actions in insertion order. A failure blocks the rest of
/// that session's actions for this drain (an end must not land before its
/// begin) but other sessions keep going. Entries inside their backoff window
/// are skipped without counting another failure.
pub async fn drain(
    store: &dyn RemoteStore,
    mirror: &mut MirrorStore,
    queue: &mut PendingQueue,
) -> DrainReport {
    let mut report = DrainReport::default();
    let mut blocked: HashSet<String> = HashSet::new();

    for action in queue.list() {
        if blocked.contains(&action.session_key) {
            report.skipped += 1;
            continue;
        }
        if let Some(at) = action.next_attempt_at {
            if at > Local::now() {
                // still inside the backoff window; later actions of this
                // session must wait for it as well
                blocked.insert(action.session_key.clone());
                report.skipped += 1;
                continue;
            }
        }

        match dispatch(store, mirror, &action).await {
            Ok(()) => {
                queue.remove(&action.id);
                report.delivered += 1;
                log::info!("Replayed {:?} {}", action.kind, action.id);
            }
            Err(e) => {
                log::warn!("Replay of {:?} {} failed: {}", action.kind, action.id, e);
                blocked.insert(action.session_key.clone());
                if queue.record_failure(&action.id, Local::now()) {
                    report.dead_lettered += 1;
                } else {
                    report.failed += 1;
                }
            }
        }
    }

    report
}

async fn dispatch(
    store: &dyn RemoteStore,
    mirror: &mut MirrorStore,
    action: &PendingAction,
) -> Result<()> {
    match action.kind {
        ActionKind::BeginSession => {
            let session: Session = serde_json::from_value(action.payload.clone())?;
            let remote_id = store.insert_session(&session).await?;
            if let RecordId::Pending(local) = &session.id {
                mirror.promote_session(local, remote_id);
            }
            Ok(())
        }
        ActionKind::EndSession => {
            let payload: EndSessionPayload = serde_json::from_value(action.payload.clone())?;
            let id = mirror
                .resolve(&payload.session_id)
                .confirmed()
                .ok_or_else(|| {
                    anyhow!("session {} has no durable id yet", payload.session_id)
                })?;
            store
                .update_session(
                    id,
                    payload.end_time,
                    payload.duration_seconds,
                    payload.total_hours,
                    payload.description.as_deref(),
                )
                .await
        }
        ActionKind::BeginBreak => {
            let brk: Break = serde_json::from_value(action.payload.clone())?;
            let session_id = mirror
                .resolve(&brk.session_id)
                .confirmed()
                .ok_or_else(|| anyhow!("session {} has no durable id yet", brk.session_id))?;
            let remote_id = store.insert_break(session_id, &brk).await?;
            if let RecordId::Pending(local) = &brk.id {
                mirror.promote_break(&brk.session_id, local, remote_id);
            }
            Ok(())
        }
        ActionKind::EndBreak => {
            let payload: EndBreakPayload = serde_json::from_value(action.payload.clone())?;
            let id = mirror
                .resolve(&payload.break_id)
                .confirmed()
                .ok_or_else(|| anyhow!("break {} has no durable id yet", payload.break_id))?;
            store
                .update_break(id, payload.end_time, payload.duration_seconds)
                .await
        }
    }
}
