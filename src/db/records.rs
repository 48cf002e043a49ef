use chrono::DateTime;
use std::cmp::Ordering;

/// Which search facet a resume cursor belongs to. A scope keeps one cursor
/// per facet and they advance independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Media,
    Message,
}

impl CursorKind {
    pub(crate) fn column(self) -> &'static str {
        match self {
            CursorKind::Media => "last_media_cursor",
            CursorKind::Message => "last_message_cursor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    pub id: String,
    pub name: Option<String>,
    pub last_media_cursor: Option<String>,
    pub last_message_cursor: Option<String>,
}

impl ScopeRecord {
    pub fn cursor(&self, kind: CursorKind) -> Option<&str> {
        match kind {
            CursorKind::Media => self.last_media_cursor.as_deref(),
            CursorKind::Message => self.last_message_cursor.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    pub guild_id: String,
    pub is_dm: bool,
    pub is_nsfw: bool,
}

/// How a message's channel is written alongside it.
#[derive(Debug, Clone)]
pub enum ChannelWrite {
    /// Insert or refresh name and flags.
    Refresh(ChannelRecord),
    /// Insert if missing, never touch an existing row.
    EnsureExists(ChannelRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub content: String,
    pub timestamp: Option<String>,
    pub edited_timestamp: Option<String>,
    pub user_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub account_id: String,
    pub observed_cursor: Option<String>,
    pub has_media: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub file_id: String,
    pub url: String,
    pub filename: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub message_id: String,
    pub observed_cursor: Option<String>,
}

/// Everything one search hit writes, applied in a single transaction with
/// parents first.
#[derive(Debug, Clone)]
pub struct ObservedMessage {
    pub author_id: String,
    pub author_name: Option<String>,
    pub channel: ChannelWrite,
    pub message: MessageRecord,
    pub media: Vec<MediaRecord>,
}

/// A cursor as epoch milliseconds: integers are taken as-is, RFC 3339
/// timestamps are converted.
fn cursor_millis(cursor: &str) -> Option<i128> {
    if let Ok(millis) = cursor.parse::<i128>() {
        return Some(millis);
    }
    DateTime::parse_from_rfc3339(cursor)
        .ok()
        .map(|at| i128::from(at.timestamp_millis()))
}

/// Orders two cursor values by the instant they denote when both are epoch
/// milliseconds or RFC 3339 (in any mix), lexicographically otherwise.
pub fn compare_cursors(a: &str, b: &str) -> Ordering {
    match (cursor_millis(a), cursor_millis(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
