use serde::{Deserialize, Serialize};

/// Body of `POST .../messages/search/tabs` for the media tab.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub include_nsfw: bool,
    pub tabs: SearchTabs,
    pub track_exact_total_hits: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTabs {
    pub media: MediaTab,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaTab {
    pub sort_by: &'static str,
    pub sort_order: &'static str,
    /// Serialized as `null` for the first page.
    pub cursor: Option<SearchCursor>,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchCursor {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl SearchRequest {
    /// Ascending timestamp walk starting after `cursor`.
    pub fn media(cursor: Option<&str>, limit: u32) -> Self {
        Self {
            include_nsfw: true,
            tabs: SearchTabs {
                media: MediaTab {
                    sort_by: "timestamp",
                    sort_order: "asc",
                    cursor: cursor.map(|timestamp| SearchCursor {
                        timestamp: timestamp.to_string(),
                        kind: "timestamp",
                    }),
                    limit,
                },
            },
            track_exact_total_hits: true,
        }
    }
}

/// One search hit. Every field is optional on the wire; a hit without an
/// `id` is discarded by the classifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachment {
    /// The media row's key; an attachment without one is not stored.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Entry of `GET /users/@me/guilds`.
#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `GET /guilds/{id}/channels`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<i64>,
    #[serde(default)]
    pub nsfw: Option<bool>,
}

impl GuildChannel {
    pub const GUILD_TEXT: i64 = 0;

    pub fn is_text(&self) -> bool {
        self.kind == Some(Self::GUILD_TEXT)
    }
}
