use chrono::{DateTime, Duration, Local};
use tempfile::TempDir;

use crate::database::RemoteStore;
use crate::models::pending::ActionKind;
use crate::models::record_id::RecordId;
use crate::store::mirror::MirrorStore;
use crate::store::queue::PendingQueue;
use crate::sync::drain::drain;
use crate::tests::fake_remote::FakeRemote;
use crate::ui::actions::{self, ActionContext};

fn stores(user: &str) -> (TempDir, MirrorStore, PendingQueue) {
    let dir = tempfile::tempdir().unwrap();
    let mirror = MirrorStore::open(dir.path().join("mirror.json"), user);
    let queue = PendingQueue::open(dir.path().join("queue.json"));
    (dir, mirror, queue)
}

/// A work day earlier today, long enough to clear the 15-minute minimum.
fn shift_start() -> DateTime<Local> {
    Local::now() - Duration::hours(9)
}

#[tokio::test]
async fn test_offline_day_queues_four_actions_in_order() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let t0 = shift_start();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: false,
    };

    actions::time_in(&mut ctx, t0).await;
    actions::start_break(&mut ctx, t0 + Duration::hours(4)).await;
    actions::end_break(&mut ctx, t0 + Duration::hours(4) + Duration::minutes(30)).await;
    actions::time_out(&mut ctx, t0 + Duration::hours(8), Some("stockroom".to_string())).await;

    let queued = queue.list();
    let kinds: Vec<ActionKind> = queued.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::BeginSession,
            ActionKind::BeginBreak,
            ActionKind::EndBreak,
            ActionKind::EndSession,
        ]
    );
    // all four belong to the same session
    let key = &queued[0].session_key;
    assert!(queued.iter().all(|a| &a.session_key == key));
    // nothing reached the backend
    assert_eq!(remote.session_count(), 0);
    // the day is over locally
    assert!(mirror.active_session().is_none());

    // connectivity returns; a full drain empties the queue
    let report = drain(&remote, &mut mirror, &mut queue).await;
    assert_eq!(report.delivered, 4);
    assert_eq!(report.failed, 0);
    assert!(queue.is_empty());

    // the backend now holds the closed session with breaks excluded:
    // 8h elapsed minus a 30m break is 7.5h
    assert_eq!(remote.session_count(), 1);
    let session = remote.session(1).unwrap();
    assert!(session.end_time.is_some());
    assert_eq!(session.duration_seconds, 8 * 3600);
    assert_eq!(session.total_hours, 7.5);
    assert_eq!(session.description.as_deref(), Some("stockroom"));

    assert_eq!(remote.break_count(), 1);
    let brk = remote.break_record(2).unwrap();
    assert!(brk.end_time.is_some());
    assert_eq!(brk.duration_seconds, 30 * 60);

    // the progress gauge sums exactly what was delivered
    assert_eq!(remote.total_hours_for_user("student").await.unwrap(), 7.5);
}

#[tokio::test]
async fn test_offline_time_in_promotes_after_drain() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let t0 = shift_start();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: false,
    };
    actions::time_in(&mut ctx, t0).await;

    let cached = mirror.active_session().unwrap();
    assert!(cached.id.is_pending());
    assert_eq!(cached.start_time, t0);
    assert!(cached.end_time.is_none());
    assert_eq!(queue.len(), 1);

    let report = drain(&remote, &mut mirror, &mut queue).await;
    assert_eq!(report.delivered, 1);
    assert!(queue.is_empty());

    // the cached session now carries the backend-assigned durable id
    let promoted = mirror.active_session().unwrap();
    assert_eq!(promoted.id, RecordId::Confirmed(1));
}

#[tokio::test]
async fn test_online_time_in_writes_through() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: true,
    };
    actions::time_in(&mut ctx, Local::now()).await;

    assert!(queue.is_empty());
    assert_eq!(remote.session_count(), 1);
    assert_eq!(
        mirror.active_session().unwrap().id,
        RecordId::Confirmed(1)
    );
}

#[tokio::test]
async fn test_time_out_under_minimum_is_rejected_without_mutation() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let t0 = Local::now() - Duration::minutes(10);

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: false,
    };
    actions::time_in(&mut ctx, t0).await;

    let outcome = actions::time_out(&mut ctx, Local::now(), None).await;
    assert!(!outcome.should_refresh);
    assert!(outcome.messages[0].contains("too short"));

    // the session is still open locally and no end mutation was queued
    let cached = mirror.active_session().unwrap();
    assert!(cached.is_open());
    let kinds: Vec<ActionKind> = queue.list().iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::BeginSession]);
}

#[tokio::test]
async fn test_double_time_in_is_rejected() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: true,
    };
    actions::time_in(&mut ctx, Local::now()).await;
    let outcome = actions::time_in(&mut ctx, Local::now()).await;

    assert!(!outcome.should_refresh);
    assert!(outcome.messages[0].contains("Already timed in"));
    assert_eq!(remote.session_count(), 1);
}

#[tokio::test]
async fn test_second_break_requires_first_to_end() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let t0 = shift_start();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: false,
    };
    actions::time_in(&mut ctx, t0).await;
    actions::start_break(&mut ctx, t0 + Duration::hours(1)).await;

    let outcome = actions::start_break(&mut ctx, t0 + Duration::hours(2)).await;
    assert!(outcome.messages[0].contains("already running"));

    // and timing out with the break still open is refused
    let outcome = actions::time_out(&mut ctx, t0 + Duration::hours(8), None).await;
    assert!(outcome.messages[0].contains("End your break"));
    assert!(mirror.active_session().unwrap().is_open());
}

#[tokio::test]
async fn test_force_delete_purges_queued_actions() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let t0 = shift_start();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: false,
    };
    actions::time_in(&mut ctx, t0).await;
    actions::start_break(&mut ctx, t0 + Duration::hours(1)).await;
    assert_eq!(ctx.queue.len(), 2);

    let outcome = actions::force_delete(&mut ctx, t0 + Duration::hours(2)).await;
    assert!(outcome.messages[0].contains("2 queued actions dropped"));
    assert!(queue.is_empty());
    assert!(mirror.active_session().is_none());
}

#[tokio::test]
async fn test_cleanup_removes_stale_open_sessions() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let now = Local::now();

    // a session abandoned two days ago, with a dangling break
    {
        let mut ctx = ActionContext {
            store: &remote,
            mirror: &mut mirror,
            queue: &mut queue,
            user_id: "student",
            online: true,
        };
        actions::time_in(&mut ctx, now - Duration::days(2)).await;
        actions::start_break(&mut ctx, now - Duration::days(2) + Duration::hours(1)).await;
        // simulate the device that owned it disappearing
        let abandoned_id = ctx.mirror.active_session().unwrap().id.clone();
        ctx.mirror.clear_breaks(&abandoned_id);
        ctx.mirror.clear_active_session();
    }
    assert_eq!(remote.session_count(), 1);
    assert_eq!(remote.break_count(), 1);

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: true,
    };
    let outcome = actions::cleanup_stuck(&mut ctx, now).await;
    assert!(outcome.messages[0].contains("Cleaned up 1 stuck sessions"));
    assert_eq!(remote.session_count(), 0);
    assert_eq!(remote.break_count(), 0);
}

#[tokio::test]
async fn test_cleanup_spares_todays_session() {
    let (_dir, mut mirror, mut queue) = stores("student");
    let remote = FakeRemote::new();
    let now = Local::now();

    let mut ctx = ActionContext {
        store: &remote,
        mirror: &mut mirror,
        queue: &mut queue,
        user_id: "student",
        online: true,
    };
    actions::time_in(&mut ctx, now - Duration::hours(2)).await;

    let outcome = actions::cleanup_stuck(&mut ctx, now).await;
    assert!(outcome.messages[0].contains("Cleaned up 0 stuck sessions"));
    assert_eq!(remote.session_count(), 1);
    assert!(mirror.active_session().is_some());
}
