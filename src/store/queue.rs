use chrono::{DateTime, Duration, Local};
use std::path::Path;

use crate::models::pending::PendingAction;
use crate::store::kv::KvStore;

pub const MAX_ATTEMPTS: u32 = 8;
const BASE_BACKOFF_SECS: i64 = 30;

const QUEUE_KEY: &str = "pending_actions";
const DEAD_LETTER_KEY: &str = "dead_letters";

/// Ordered list of mutations the backend has not confirmed. Append-only
/// until the drain consumes entries; no dedup, no size bound.
pub struct PendingQueue {
    kv: KvStore,
}

impl PendingQueue {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            kv: KvStore::open(path),
        }
    }

    fn load(&self, key: &str) -> Vec<PendingAction> {
        let Some(raw) = self.kv.get(key) else {
            return vec![];
        };
        match serde_json::from_str(&raw) {
            Ok(actions) => actions,
            Err(e) => {
                log::warn!("Stored action list under {} is unreadable: {}", key, e);
                vec![]
            }
        }
    }

    fn store(&mut self, key: &str, actions: &[PendingAction]) {
        match serde_json::to_string(actions) {
            Ok(raw) => self.kv.set(key, raw),
            Err(e) => log::error!("Failed to serialize action list: {}", e),
        }
    }

    pub fn enqueue(&mut self, action: PendingAction) {
        let mut actions = self.load(QUEUE_KEY);
        log::info!("Queued {:?} for {}", action.kind, action.session_key);
        actions.push(action);
        self.store(QUEUE_KEY, &actions);
    }

    pub fn list(&self) -> Vec<PendingAction> {
        self.load(QUEUE_KEY)
    }

    pub fn len(&self) -> usize {
        self.load(QUEUE_KEY).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&mut self, action_id: &str) {
        let actions: Vec<PendingAction> = self
            .load(QUEUE_KEY)
            .into_iter()
            .filter(|a| a.id != action_id)
            .collect();
        self.store(QUEUE_KEY, &actions);
    }

    /// Drops every queued action belonging to any of the given session id
    /// strings. Used by Force Delete, which must also discard undelivered
    /// mutations of the session it removes.
    pub fn remove_for_session(&mut self, session_keys: &[String]) -> usize {
        let before = self.load(QUEUE_KEY);
        let before_len = before.len();
        let after: Vec<PendingAction> = before
            .into_iter()
            .filter(|a| !session_keys.contains(&a.session_key))
            .collect();
        let removed = before_len - after.len();
        self.store(QUEUE_KEY, &after);
        removed
    }

    pub fn clear(&mut self) {
        self.store(QUEUE_KEY, &[]);
    }

    /// Marks one failed replay. Backoff doubles per attempt starting at 30s;
    /// after MAX_ATTEMPTS the entry is parked on the dead-letter list.
    /// Returns true when the entry was dead-lettered.
    pub fn record_failure(&mut self, action_id: &str, now: DateTime<Local>) -> bool {
        let mut actions = self.load(QUEUE_KEY);
        let Some(pos) = actions.iter().position(|a| a.id == action_id) else {
            return false;
        };

        actions[pos].attempts += 1;
        if actions[pos].attempts >= MAX_ATTEMPTS {
            let dead = actions.remove(pos);
            log::warn!(
                "Action {} ({:?}) failed {} times, moving to dead letters",
                dead.id, dead.kind, dead.attempts
            );
            let mut letters = self.load(DEAD_LETTER_KEY);
            letters.push(dead);
            self.store(DEAD_LETTER_KEY, &letters);
            self.store(QUEUE_KEY, &actions);
            return true;
        }

        let shift = (actions[pos].attempts - 1).min(10);
        let backoff = Duration::seconds(BASE_BACKOFF_SECS << shift);
        actions[pos].next_attempt_at = Some(now + backoff);
        self.store(QUEUE_KEY, &actions);
        false
    }

    pub fn dead_letters(&self) -> Vec<PendingAction> {
        self.load(DEAD_LETTER_KEY)
    }

    pub fn clear_dead_letters(&mut self) -> usize {
        let count = self.dead_letters().len();
        self.store(DEAD_LETTER_KEY, &[]);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::Session;

    fn queue() -> (tempfile::TempDir, PendingQueue) {
        let dir = tempfile::tempdir().unwrap();
        let q = PendingQueue::open(dir.path().join("queue.json"));
        (dir, q)
    }

    fn some_action() -> PendingAction {
        let now = Local::now();
        PendingAction::begin_session(&Session::begin("student", now), now)
    }

    #[test]
    fn test_enqueue_preserves_insertion_order() {
        let (_dir, mut q) = queue();
        let a = some_action();
        let b = some_action();
        let c = some_action();
        q.enqueue(a.clone());
        q.enqueue(b.clone());
        q.enqueue(c.clone());

        let ids: Vec<String> = q.list().into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_remove_middle_keeps_relative_order() {
        let (_dir, mut q) = queue();
        let a = some_action();
        let b = some_action();
        let c = some_action();
        q.enqueue(a.clone());
        q.enqueue(b.clone());
        q.enqueue(c.clone());

        q.remove(&b.id);
        let ids: Vec<String> = q.list().into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[test]
    fn test_duplicate_enqueue_is_not_deduped() {
        let (_dir, mut q) = queue();
        let a = some_action();
        q.enqueue(a.clone());
        q.enqueue(a.clone());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_record_failure_backs_off_exponentially() {
        let (_dir, mut q) = queue();
        let a = some_action();
        q.enqueue(a.clone());

        let now = Local::now();
        assert!(!q.record_failure(&a.id, now));
        let after_one = q.list()[0].clone();
        assert_eq!(after_one.attempts, 1);
        assert_eq!(after_one.next_attempt_at, Some(now + Duration::seconds(30)));

        assert!(!q.record_failure(&a.id, now));
        let after_two = q.list()[0].clone();
        assert_eq!(after_two.attempts, 2);
        assert_eq!(after_two.next_attempt_at, Some(now + Duration::seconds(60)));
    }

    #[test]
    fn test_dead_letter_after_max_attempts() {
        let (_dir, mut q) = queue();
        let a = some_action();
        q.enqueue(a.clone());

        let now = Local::now();
        for _ in 0..MAX_ATTEMPTS - 1 {
            assert!(!q.record_failure(&a.id, now));
        }
        assert!(q.record_failure(&a.id, now));

        assert!(q.is_empty());
        let letters = q.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].id, a.id);
        assert_eq!(letters[0].attempts, MAX_ATTEMPTS);

        assert_eq!(q.clear_dead_letters(), 1);
        assert!(q.dead_letters().is_empty());
    }

    #[test]
    fn test_clear_empties_the_queue() {
        let (_dir, mut q) = queue();
        q.enqueue(some_action());
        q.enqueue(some_action());
        q.clear();
        assert!(q.is_empty());
        assert!(q.list().is_empty());
    }

    #[test]
    fn test_remove_for_session() {
        let (_dir, mut q) = queue();
        let a = some_action();
        let b = some_action();
        q.enqueue(a.clone());
        q.enqueue(b.clone());

        let removed = q.remove_for_session(&[a.session_key.clone()]);
        assert_eq!(removed, 1);
        assert_eq!(q.list()[0].id, b.id);
    }
}
