use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generates a client-side placeholder identifier: "local-" plus 12 random
/// alphanumeric characters.
pub fn local_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + (idx - 10)) as char
            }
        })
        .collect();
    format!("local-{}", suffix)
}

/// Identifier of a session or break record. Records are created client-side
/// with a `Pending` placeholder and promoted to `Confirmed` exactly once,
/// when the backend acknowledges the insert and hands back its row id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    Pending(String),
    Confirmed(i64),
}

impl RecordId {
    pub fn new_pending() -> Self {
        RecordId::Pending(local_token())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RecordId::Pending(_))
    }

    /// The durable backend id, if this identifier has one.
    pub fn confirmed(&self) -> Option<i64> {
        match self {
            RecordId::Confirmed(id) => Some(*id),
            RecordId::Pending(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Pending(local) => write!(f, "{}", local),
            RecordId::Confirmed(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_tokens_are_unique() {
        let a = local_token();
        let b = local_token();
        assert!(a.starts_with("local-"));
        assert_eq!(a.len(), "local-".len() + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_confirmed_accessor() {
        assert_eq!(RecordId::Confirmed(42).confirmed(), Some(42));
        assert_eq!(RecordId::new_pending().confirmed(), None);
        assert!(RecordId::new_pending().is_pending());
    }
}
