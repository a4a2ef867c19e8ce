use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Descending
    }
}

/// Opaque pagination cursor, keyed on `(created_at, id)` so ties between
/// servers created in the same instant still sort and page deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub last_id: Uuid,
}

impl Cursor {
    pub fn encode(&self) -> String {
        format!(
            "{}.{}:{}",
            self.created_at.timestamp(),
            self.created_at.timestamp_subsec_nanos(),
            self.last_id
        )
    }

    pub fn decode(token: &str) -> Option<Cursor> {
        let (ts, id) = token.split_once(':')?;
        let (secs, nanos) = ts.split_once('.')?;
        let secs: i64 = secs.parse().ok()?;
        let nanos: u32 = nanos.parse().ok()?;
        let last_id = Uuid::parse_str(id).ok()?;
        let created_at = DateTime::from_timestamp(secs, nanos)?;
        Some(Cursor { created_at, last_id })
    }
}

pub fn clamp_page_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_through_its_token() {
        let cursor = Cursor {
            created_at: Utc::now(),
            last_id: Uuid::new_v4(),
        };
        let token = cursor.encode();
        let decoded = Cursor::decode(&token).unwrap();
        assert_eq!(cursor.last_id, decoded.last_id);
        assert_eq!(cursor.created_at.timestamp_nanos_opt(), decoded.created_at.timestamp_nanos_opt());
    }

    #[test]
    fn malformed_cursor_decodes_to_none() {
        assert!(Cursor::decode("not-a-cursor").is_none());
        assert!(Cursor::decode("123:not-a-uuid").is_none());
    }

    #[test]
    fn page_size_is_clamped_to_the_maximum() {
        assert_eq!(clamp_page_size(Some(10_000)), MAX_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
    }
}
