//! Utility functions for the matchmaking engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique server ID
pub fn generate_server_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_session_id();
        let id2 = generate_session_id();
        assert_ne!(id1, id2);

        let match_id1 = generate_match_id();
        let match_id2 = generate_match_id();
        assert_ne!(match_id1, match_id2);

        let server_id1 = generate_server_id();
        let server_id2 = generate_server_id();
        assert_ne!(server_id1, server_id2);
    }
}
