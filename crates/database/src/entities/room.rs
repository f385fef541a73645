//! Room entity definitions

use serde::{Deserialize, Serialize};

/// The conversation bucket for an unordered pair of users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub public_id: String,
    pub user_low: String,
    pub user_high: String,
    pub created_at: String,
}

/// Canonical key for an unordered pair of user ids.
///
/// The pair is normalized lexicographically so that `pair_key(a, b) ==
/// pair_key(b, a)` for any two ids.
pub fn pair_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{user_a}:{user_b}")
    } else {
        format!("{user_b}:{user_a}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("alice", "bob"), pair_key("bob", "alice"));
        assert_eq!(pair_key("alice", "bob"), "alice:bob");
        assert_eq!(pair_key("zoe", "adam"), "adam:zoe");
    }

    #[test]
    fn test_pair_key_distinct_pairs_differ() {
        assert_ne!(pair_key("alice", "bob"), pair_key("alice", "carol"));
        assert_ne!(pair_key("alice", "bob"), pair_key("bob", "carol"));
    }
}
