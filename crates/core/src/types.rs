/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Effective usability of a marketplace account.
///
/// Stored as lowercase text in the `marketplace_accounts` table. The
/// transitions are: `disconnected` -> `connected` (user authorizes),
/// `connected` -> `expired` (refresh fails with an auth error on an old
/// token), `expired` -> `connected` (user reconnects), and
/// `connected` -> `disconnected` (user disconnects; app credentials are
/// preserved separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Expired,
}

impl ConnectionStatus {
    /// Database representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Expired => "expired",
        }
    }

    /// Parse the database representation. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disconnected" => Some(ConnectionStatus::Disconnected),
            "connected" => Some(ConnectionStatus::Connected),
            "expired" => Some(ConnectionStatus::Expired),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connected,
            ConnectionStatus::Expired,
        ] {
            assert_eq!(ConnectionStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_text_is_rejected() {
        assert_eq!(ConnectionStatus::parse("linked"), None);
    }
}
