use std::path::Path;

use crate::models::breaks::Break;
use crate::models::record_id::RecordId;
use crate::models::session::Session;
use crate::store::kv::KvStore;

/// Local cache of the zero-or-one open session per user, its breaks, and the
/// temporary-to-durable identifier map. Lets the UI render without a network
/// round-trip. No operation here touches the backend.
pub struct MirrorStore {
    kv: KvStore,
    user_id: String,
}

impl MirrorStore {
    pub fn open(path: impl AsRef<Path>, user_id: &str) -> Self {
        Self {
            kv: KvStore::open(path),
            user_id: user_id.to_string(),
        }
    }

    fn session_key(&self) -> String {
        format!("active_session:{}", self.user_id)
    }

    fn breaks_key(id: &RecordId) -> String {
        format!("breaks:{}", id)
    }

    fn map_key(local_id: &str) -> String {
        format!("id_map:{}", local_id)
    }

    pub fn save_active_session(&mut self, session: &Session) {
        match serde_json::to_string(session) {
            Ok(raw) => self.kv.set(&self.session_key(), raw),
            Err(e) => log::error!("Failed to serialize active session: {}", e),
        }
    }

    pub fn active_session(&self) -> Option<Session> {
        let raw = self.kv.get(&self.session_key())?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Cached active session is unreadable, ignoring it: {}", e);
                None
            }
        }
    }

    pub fn clear_active_session(&mut self) {
        let key = self.session_key();
        self.kv.remove(&key);
    }

    pub fn save_breaks(&mut self, session_id: &RecordId, breaks: &[Break]) {
        match serde_json::to_string(breaks) {
            Ok(raw) => self.kv.set(&Self::breaks_key(session_id), raw),
            Err(e) => log::error!("Failed to serialize breaks for {}: {}", session_id, e),
        }
    }

    pub fn breaks(&self, session_id: &RecordId) -> Vec<Break> {
        let Some(raw) = self.kv.get(&Self::breaks_key(session_id)) else {
            return vec![];
        };
        match serde_json::from_str(&raw) {
            Ok(breaks) => breaks,
            Err(e) => {
                log::warn!("Cached breaks for {} are unreadable: {}", session_id, e);
                vec![]
            }
        }
    }

    pub fn clear_breaks(&mut self, session_id: &RecordId) {
        self.kv.remove(&Self::breaks_key(session_id));
    }

    /// Maps a still-temporary identifier to its durable one, when the begin
    /// mutation it belongs to has been delivered. Confirmed ids pass through.
    pub fn resolve(&self, id: &RecordId) -> RecordId {
        match id {
            RecordId::Confirmed(_) => id.clone(),
            RecordId::Pending(local) => match self.kv.get(&Self::map_key(local)) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map(RecordId::Confirmed)
                    .unwrap_or_else(|_| id.clone()),
                None => id.clone(),
            },
        }
    }

    /// Every id string this record has been known under: the current one and
    /// the temporary alias on either side of the promotion map.
    pub fn aliases(&self, id: &RecordId) -> Vec<String> {
        let mut out = vec![id.to_string()];
        match id {
            RecordId::Pending(_) => {
                let resolved = self.resolve(id);
                if &resolved != id {
                    out.push(resolved.to_string());
                }
            }
            RecordId::Confirmed(remote) => {
                // reverse lookup over the (small) promotion map
                for local in self.mapped_locals() {
                    if self.kv.get(&Self::map_key(&local)) == Some(remote.to_string()) {
                        out.push(local);
                    }
                }
            }
        }
        out
    }

    fn mapped_locals(&self) -> Vec<String> {
        // KvStore has no scan; keep the key list under a well-known key.
        self.kv
            .get("id_map_keys")
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default()
    }

    fn record_mapping(&mut self, local_id: &str, remote_id: i64) {
        self.kv.set(&Self::map_key(local_id), remote_id.to_string());
        let mut keys = self.mapped_locals();
        if !keys.iter().any(|k| k == local_id) {
            keys.push(local_id.to_string());
            match serde_json::to_string(&keys) {
                Ok(raw) => self.kv.set("id_map_keys", raw),
                Err(e) => log::error!("Failed to serialize id map index: {}", e),
            }
        }
    }

    /// The one promotion point for sessions: records the mapping, then
    /// rewrites the cached session and re-keys its break list so everything
    /// local speaks the durable id from here on.
    pub fn promote_session(&mut self, local_id: &str, remote_id: i64) {
        self.record_mapping(local_id, remote_id);

        let old_id = RecordId::Pending(local_id.to_string());
        let new_id = RecordId::Confirmed(remote_id);

        if let Some(mut session) = self.active_session() {
            if session.id == old_id {
                session.id = new_id.clone();
                self.save_active_session(&session);
            }
        }

        let mut breaks = self.breaks(&old_id);
        if !breaks.is_empty() {
            for brk in &mut breaks {
                brk.session_id = new_id.clone();
            }
            self.save_breaks(&new_id, &breaks);
            self.clear_breaks(&old_id);
        }
        log::info!("Promoted session {} -> {}", local_id, remote_id);
    }

    /// Promotion point for breaks. `session_id` may still be the temporary
    /// one; the break list is looked up under whichever key is current.
    pub fn promote_break(&mut self, session_id: &RecordId, local_id: &str, remote_id: i64) {
        self.record_mapping(local_id, remote_id);

        let key_id = self.resolve(session_id);
        let mut breaks = self.breaks(&key_id);
        let mut touched = false;
        for brk in &mut breaks {
            if brk.id == RecordId::Pending(local_id.to_string()) {
                brk.id = RecordId::Confirmed(remote_id);
                touched = true;
            }
        }
        if touched {
            self.save_breaks(&key_id, &breaks);
        }
        log::info!("Promoted break {} -> {}", local_id, remote_id);
    }
}
