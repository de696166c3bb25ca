use chrono::{DateTime, Duration, Local};

use crate::database::RemoteStore;
use crate::models::breaks::Break;
use crate::models::pending::{EndBreakPayload, EndSessionPayload, PendingAction};
use crate::models::record_id::RecordId;
use crate::models::session::Session;
use crate::store::mirror::MirrorStore;
use crate::store::queue::PendingQueue;
use crate::sync::drain;

/// Sessions shorter than this cannot be timed out.
pub const MIN_SESSION_SECONDS: i64 = 15 * 60;

/// Remote sessions still open after this long are considered stuck.
const STUCK_AFTER_HOURS: i64 = 24;

/// Execution context for user actions, borrowed from app state.
pub struct ActionContext<'a> {
    pub store: &'a dyn RemoteStore,
    pub mirror: &'a mut MirrorStore,
    pub queue: &'a mut PendingQueue,
    pub user_id: &'a str,
    pub online: bool,
}

/// What a handler tells the app: log lines for the panel, and whether
/// dashboard data should be reloaded.
pub struct ActionOutcome {
    pub messages: Vec<String>,
    pub should_refresh: bool,
}

impl ActionOutcome {
    fn changed(message: String) -> Self {
        Self {
            messages: vec![message],
            should_refresh: true,
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            messages: vec![message],
            should_refresh: false,
        }
    }
}

fn stamp(now: DateTime<Local>, message: impl AsRef<str>) -> String {
    format!("[{}] {}", now.format("%H:%M:%S"), message.as_ref())
}

/// Time In: open a session. The mirror is written first so the dashboard
/// reflects the session immediately; the backend write is best-effort and
/// falls back to the queue.
pub async fn time_in(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    if let Some(session) = ctx.mirror.active_session() {
        return ActionOutcome::rejected(stamp(
            now,
            format!(
                "Already timed in since {}",
                session.start_time.format("%H:%M")
            ),
        ));
    }

    let session = Session::begin(ctx.user_id, now);
    ctx.mirror.save_active_session(&session);

    if ctx.online {
        match ctx.store.insert_session(&session).await {
            Ok(remote_id) => {
                if let RecordId::Pending(local) = &session.id {
                    ctx.mirror.promote_session(local, remote_id);
                }
                return ActionOutcome::changed(stamp(
                    now,
                    format!("Timed in at {}", now.format("%H:%M")),
                ));
            }
            Err(e) => log::warn!("Time in did not reach the backend, queuing: {}", e),
        }
    }

    ctx.queue.enqueue(PendingAction::begin_session(&session, now));
    ActionOutcome::changed(stamp(
        now,
        format!("Timed in at {} (will sync later)", now.format("%H:%M")),
    ))
}

/// Start Break: requires an open session and no break already running.
pub async fn start_break(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    let Some(session) = ctx.mirror.active_session() else {
        return ActionOutcome::rejected(stamp(now, "Time in before starting a break"));
    };

    let mut breaks = ctx.mirror.breaks(&session.id);
    if breaks.iter().any(|b| b.is_open()) {
        return ActionOutcome::rejected(stamp(now, "A break is already running"));
    }

    let brk = Break::begin(session.id.clone(), now);
    breaks.push(brk.clone());
    ctx.mirror.save_breaks(&session.id, &breaks);

    if ctx.online {
        if let Some(session_remote_id) = ctx.mirror.resolve(&session.id).confirmed() {
            match ctx.store.insert_break(session_remote_id, &brk).await {
                Ok(remote_id) => {
                    if let RecordId::Pending(local) = &brk.id {
                        ctx.mirror.promote_break(&session.id, local, remote_id);
                    }
                    return ActionOutcome::changed(stamp(now, "Break started"));
                }
                Err(e) => log::warn!("Start break did not reach the backend, queuing: {}", e),
            }
        }
    }

    ctx.queue.enqueue(PendingAction::begin_break(&brk, now));
    ActionOutcome::changed(stamp(now, "Break started (will sync later)"))
}

/// End Break: closes the one open break.
pub async fn end_break(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    let Some(session) = ctx.mirror.active_session() else {
        return ActionOutcome::rejected(stamp(now, "No session is open"));
    };

    let mut breaks = ctx.mirror.breaks(&session.id);
    let Some(pos) = breaks.iter().position(|b| b.is_open()) else {
        return ActionOutcome::rejected(stamp(now, "No break is running"));
    };

    breaks[pos].finish(now);
    let brk = breaks[pos].clone();
    ctx.mirror.save_breaks(&session.id, &breaks);

    let minutes = brk.duration_seconds / 60;
    let payload = EndBreakPayload {
        break_id: brk.id.clone(),
        session_id: session.id.clone(),
        end_time: now,
        duration_seconds: brk.duration_seconds,
    };

    if ctx.online {
        if let Some(break_remote_id) = ctx.mirror.resolve(&brk.id).confirmed() {
            match ctx
                .store
                .update_break(break_remote_id, now, brk.duration_seconds)
                .await
            {
                Ok(()) => {
                    return ActionOutcome::changed(stamp(
                        now,
                        format!("Break ended after {}m", minutes),
                    ));
                }
                Err(e) => log::warn!("End break did not reach the backend, queuing: {}", e),
            }
        }
    }

    ctx.queue.enqueue(PendingAction::end_break(&payload, now));
    ActionOutcome::changed(stamp(
        now,
        format!("Break ended after {}m (will sync later)", minutes),
    ))
}

/// The Time Out preconditions, shared by the key handler (to decide whether
/// to open the description prompt) and by `time_out` itself. Checks only;
/// the mirror is untouched on rejection.
pub fn validate_time_out(mirror: &MirrorStore, now: DateTime<Local>) -> Result<Session, String> {
    let Some(session) = mirror.active_session() else {
        return Err("No open session to time out".to_string());
    };
    if mirror.breaks(&session.id).iter().any(|b| b.is_open()) {
        return Err("End your break before timing out".to_string());
    }
    let elapsed = session.elapsed_seconds(now);
    if elapsed < MIN_SESSION_SECONDS {
        return Err(format!(
            "Session too short to time out: {}m logged, minimum is {}m",
            elapsed / 60,
            MIN_SESSION_SECONDS / 60
        ));
    }
    Ok(session)
}

/// Time Out: closes the session, excluding break time from the hour total,
/// then frees the active slot.
pub async fn time_out(
    ctx: &mut ActionContext<'_>,
    now: DateTime<Local>,
    description: Option<String>,
) -> ActionOutcome {
    let mut session = match validate_time_out(ctx.mirror, now) {
        Ok(session) => session,
        Err(reason) => return ActionOutcome::rejected(stamp(now, reason)),
    };

    let breaks = ctx.mirror.breaks(&session.id);
    let break_seconds: i64 = breaks.iter().map(|b| b.duration_seconds).sum();
    session.finish(now, break_seconds, description);

    let payload = EndSessionPayload {
        session_id: session.id.clone(),
        end_time: now,
        duration_seconds: session.duration_seconds,
        total_hours: session.total_hours,
        description: session.description.clone(),
    };

    let mut synced = false;
    if ctx.online {
        if let Some(remote_id) = ctx.mirror.resolve(&session.id).confirmed() {
            match ctx
                .store
                .update_session(
                    remote_id,
                    now,
                    session.duration_seconds,
                    session.total_hours,
                    session.description.as_deref(),
                )
                .await
            {
                Ok(()) => synced = true,
                Err(e) => log::warn!("Time out did not reach the backend, queuing: {}", e),
            }
        }
    }
    if !synced {
        ctx.queue.enqueue(PendingAction::end_session(&payload, now));
    }

    ctx.mirror.clear_breaks(&session.id);
    ctx.mirror.clear_active_session();

    let suffix = if synced { "" } else { " (will sync later)" };
    ActionOutcome::changed(stamp(
        now,
        format!("Timed out, {:.2}h logged{}", session.total_hours, suffix),
    ))
}

/// Sync Now: replay the queue against the backend.
pub async fn sync_now(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    if ctx.queue.is_empty() {
        return ActionOutcome::rejected(stamp(now, "Nothing to sync"));
    }
    let report = drain::drain(ctx.store, ctx.mirror, ctx.queue).await;
    ActionOutcome::changed(stamp(now, report.summary()))
}

/// Force Delete Session: drops the mirrored session, its breaks, and every
/// queued action for it; deletes the backend row too when one exists.
pub async fn force_delete(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    let Some(session) = ctx.mirror.active_session() else {
        return ActionOutcome::rejected(stamp(now, "No session to force delete"));
    };

    let aliases = ctx.mirror.aliases(&session.id);
    let dropped = ctx.queue.remove_for_session(&aliases);

    if let Some(remote_id) = ctx.mirror.resolve(&session.id).confirmed() {
        if ctx.online {
            if let Err(e) = ctx.store.delete_breaks_for_session(remote_id).await {
                log::warn!("Could not delete remote breaks for {}: {}", remote_id, e);
            }
            if let Err(e) = ctx.store.delete_session(remote_id).await {
                log::warn!("Could not delete remote session {}: {}", remote_id, e);
            }
        } else {
            log::warn!(
                "Force delete while offline: remote session {} is left behind",
                remote_id
            );
        }
    }

    ctx.mirror.clear_breaks(&session.id);
    ctx.mirror.clear_active_session();

    ActionOutcome::changed(stamp(
        now,
        format!(
            "Force deleted session {} ({} queued actions dropped)",
            session.id, dropped
        ),
    ))
}

/// Clean Up Stuck Sessions: closes out backend rows that were left open for
/// over a day (crashed clients, lost devices) and empties the dead-letter
/// list.
pub async fn cleanup_stuck(ctx: &mut ActionContext<'_>, now: DateTime<Local>) -> ActionOutcome {
    if !ctx.online {
        return ActionOutcome::rejected(stamp(now, "Cannot clean up stuck sessions while offline"));
    }

    let open = match ctx.store.open_sessions_for_user(ctx.user_id).await {
        Ok(open) => open,
        Err(e) => {
            log::warn!("Could not list open sessions: {}", e);
            return ActionOutcome::rejected(stamp(now, format!("Cleanup failed: {}", e)));
        }
    };

    let active_id = ctx
        .mirror
        .active_session()
        .map(|s| ctx.mirror.resolve(&s.id));
    let cutoff = now - Duration::hours(STUCK_AFTER_HOURS);

    let mut removed = 0usize;
    for stuck in open {
        if Some(&stuck.id) == active_id.as_ref() {
            continue; // still the live one on this device
        }
        if stuck.start_time >= cutoff {
            continue;
        }
        let Some(remote_id) = stuck.id.confirmed() else {
            continue;
        };
        let break_count = match ctx.store.breaks_for_session(remote_id).await {
            Ok(breaks) => breaks.len(),
            Err(_) => 0,
        };
        if let Err(e) = ctx.store.delete_breaks_for_session(remote_id).await {
            log::warn!("Could not delete breaks of stuck session {}: {}", remote_id, e);
            continue;
        }
        if let Err(e) = ctx.store.delete_session(remote_id).await {
            log::warn!("Could not delete stuck session {}: {}", remote_id, e);
            continue;
        }
        log::info!(
            "Removed stuck session {} ({} breaks) from {}",
            remote_id,
            break_count,
            stuck.start_time.format("%Y-%m-%d %H:%M")
        );
        removed += 1;
    }

    let letters = ctx.queue.clear_dead_letters();
    ActionOutcome::changed(stamp(
        now,
        format!(
            "Cleaned up {} stuck sessions, dropped {} dead letters",
            removed, letters
        ),
    ))
}
