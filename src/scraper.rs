//! Run orchestration: discover guilds and channels, walk every scope, persist
//! each page, report the media delta.

use crate::classify::{classify_listing, ListOutcome};
use crate::config::Config;
use crate::db::{
    ChannelRecord, ChannelWrite, CursorKind, Database, MediaRecord, MessageRecord,
    ObservedMessage,
};
use crate::discord::models::{GuildChannel, PartialGuild, SearchMessage};
use crate::discord::{channels_path, DiscordApi, DM_SCOPE, GUILDS_PATH};
use crate::error::ScrapeError;
use crate::gate::RequestGate;
use crate::scope::{enumerate_scopes, guild_scopes, Scope};
use crate::walker::{backoff_delay, CursorWalker, Unavailable, WalkSettings, WalkStep};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DM_SCOPE_NAME: &str = "DMs";
const UNKNOWN_ID: &str = "0";

/// Every scope walks the media facet.
const CURSOR_KIND: CursorKind = CursorKind::Media;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub new_media: u64,
    pub total_media: u64,
    pub scopes_scanned: usize,
    pub scopes_removed: usize,
    pub pages: usize,
    pub messages: usize,
}

enum Listing<T> {
    Items(Vec<T>),
    Unavailable(Unavailable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    Completed,
    Removed(Unavailable),
}

pub struct Scraper {
    config: Config,
    db: Database,
    api: Arc<dyn DiscordApi>,
    gate: Arc<RequestGate>,
}

impl Scraper {
    pub fn new(
        config: Config,
        db: Database,
        api: Arc<dyn DiscordApi>,
        gate: Arc<RequestGate>,
    ) -> Self {
        Self {
            config,
            db,
            api,
            gate,
        }
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let (user_id, username, token) = (
            self.config.user_id.clone(),
            self.config.username.clone(),
            self.config.discord_token.clone(),
        );
        let start = self
            .db
            .run_blocking(move |db| {
                db.upsert_account(&user_id, &username, &token)?;
                db.upsert_guild(DM_SCOPE, DM_SCOPE_NAME)?;
                db.count_media()
            })
            .await?;
        info!("Scraper: {} media items stored before this run", start);

        let mut summary = RunSummary::default();

        self.sync_guilds().await?;

        let allowlist = self.config.guild_allowlist.clone();
        let guilds = self
            .db
            .run_blocking(move |db| guild_scopes(db, &allowlist, CURSOR_KIND))
            .await?;
        for guild in &guilds {
            if let Some(reason) = self.sync_channels(guild).await? {
                debug!("Scraper: {} dropped during channel sync ({:?})", guild.id, reason);
                summary.scopes_removed += 1;
            }
        }

        let allowlist = self.config.guild_allowlist.clone();
        let scopes = self
            .db
            .run_blocking(move |db| enumerate_scopes(db, &allowlist, CURSOR_KIND))
            .await?;
        for scope in &scopes {
            match self.scrape_scope(scope, &mut summary).await? {
                ScopeOutcome::Completed => summary.scopes_scanned += 1,
                ScopeOutcome::Removed(_) => summary.scopes_removed += 1,
            }
        }

        summary.total_media = self.db.run_blocking(|db| db.count_media()).await?;
        summary.new_media = summary.total_media.saturating_sub(start);

        info!(
            "Scraper: {} scopes scanned, {} removed, {} pages, {} messages",
            summary.scopes_scanned, summary.scopes_removed, summary.pages, summary.messages
        );
        info!(
            "Found: {} new media items. Total: {} media items.",
            summary.new_media, summary.total_media
        );
        Ok(summary)
    }

    /// Registers every guild the account can see. Returns how many.
    pub async fn sync_guilds(&self) -> anyhow::Result<usize> {
        let guilds = match self.fetch_listing::<PartialGuild>(GUILDS_PATH).await? {
            Listing::Items(guilds) => guilds,
            Listing::Unavailable(reason) => {
                anyhow::bail!("Guild listing unavailable ({:?}); is the token valid?", reason)
            }
        };

        let count = guilds.len();
        self.db
            .run_blocking(move |db| {
                for guild in &guilds {
                    let name = guild.name.as_deref().unwrap_or_default();
                    db.upsert_guild(&guild.id, name)?;
                    info!("Found guild: {} {}", guild.id, name);
                }
                Ok(())
            })
            .await?;
        Ok(count)
    }

    /// Stores the guild's text channels. A guild that denies access or no
    /// longer exists is deregistered and `Some(reason)` is returned.
    pub async fn sync_channels(&self, guild: &Scope) -> anyhow::Result<Option<Unavailable>> {
        info!("Getting channels for guild: {} {}", guild.id, guild.label());
        let channels = match self
            .fetch_listing::<GuildChannel>(&channels_path(&guild.id))
            .await?
        {
            Listing::Items(channels) => channels,
            Listing::Unavailable(reason) => {
                self.deregister(guild, reason).await?;
                return Ok(Some(reason));
            }
        };

        let guild_id = guild.id.clone();
        let stored = self
            .db
            .run_blocking(move |db| {
                let mut stored = 0usize;
                for channel in channels.iter().filter(|c| c.is_text()) {
                    db.upsert_channel(&ChannelRecord {
                        id: channel.id.clone(),
                        name: channel.name.clone().unwrap_or_default(),
                        guild_id: guild_id.clone(),
                        is_dm: false,
                        is_nsfw: channel.nsfw.unwrap_or(false),
                    })?;
                    stored += 1;
                }
                Ok(stored)
            })
            .await?;
        debug!("Scraper: {} text channels stored for {}", stored, guild.id);
        Ok(None)
    }

    /// Walks one scope to exhaustion, committing each page before its
    /// cursor.
    pub async fn scrape_scope(
        &self,
        scope: &Scope,
        summary: &mut RunSummary,
    ) -> anyhow::Result<ScopeOutcome> {
        let start = if self.config.deep_scrape {
            let scope_id = scope.id.clone();
            self.db
                .run_blocking(move |db| db.reset_cursor(&scope_id, CURSOR_KIND))
                .await?;
            None
        } else {
            scope.resume_cursor.clone()
        };
        info!(
            "Scraper: Searching {} from {}",
            scope.label(),
            start.as_deref().unwrap_or("the beginning")
        );

        let mut walker = CursorWalker::new(
            self.api.clone(),
            self.gate.clone(),
            &scope.id,
            start,
            WalkSettings::from_config(&self.config),
        );

        loop {
            match walker.next_page().await? {
                WalkStep::Page(page) => {
                    let observed: Vec<ObservedMessage> = page
                        .messages
                        .iter()
                        .filter_map(|message| {
                            self.extract(scope, message, page.cursor.as_deref())
                        })
                        .collect();
                    let count = observed.len();
                    let scope_id = scope.id.clone();
                    let cursor = page.cursor;

                    self.db
                        .run_blocking(move |db| {
                            for message in &observed {
                                db.record_message(message)?;
                            }
                            if let Some(cursor) = cursor {
                                db.advance_cursor(&scope_id, &cursor, CURSOR_KIND)?;
                            }
                            Ok(())
                        })
                        .await?;

                    summary.pages += 1;
                    summary.messages += count;
                    debug!("Scraper: {} stored {} messages", scope.id, count);
                }
                WalkStep::Exhausted => return Ok(ScopeOutcome::Completed),
                WalkStep::Unavailable(reason) => {
                    self.deregister(scope, reason).await?;
                    return Ok(ScopeOutcome::Removed(reason));
                }
            }
        }
    }

    /// Maps one search hit onto the rows it writes. Hits without an id are
    /// dropped.
    fn extract(
        &self,
        scope: &Scope,
        message: &SearchMessage,
        page_cursor: Option<&str>,
    ) -> Option<ObservedMessage> {
        let id = message.id.clone()?;
        let author_id = message
            .author
            .as_ref()
            .and_then(|author| author.id.clone())
            .unwrap_or_else(|| UNKNOWN_ID.to_string());
        let author_name = message
            .author
            .as_ref()
            .and_then(|author| author.username.clone());
        let channel_id = message
            .channel_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_ID.to_string());
        let observed_cursor = page_cursor.map(str::to_string);

        let channel = if scope.is_dm() {
            ChannelWrite::Refresh(ChannelRecord {
                id: channel_id.clone(),
                name: format!("{} DMs", author_name.as_deref().unwrap_or(&author_id)),
                guild_id: DM_SCOPE.to_string(),
                is_dm: true,
                is_nsfw: false,
            })
        } else {
            ChannelWrite::EnsureExists(ChannelRecord {
                id: channel_id.clone(),
                name: String::new(),
                guild_id: scope.id.clone(),
                is_dm: false,
                is_nsfw: false,
            })
        };

        let media = message
            .attachments
            .iter()
            .filter_map(|attachment| {
                let file_id = attachment.id.clone().filter(|id| !id.is_empty())?;
                let url = attachment.url.clone().filter(|url| !url.is_empty())?;
                Some(MediaRecord {
                    file_id,
                    url,
                    filename: attachment.filename.clone(),
                    size: attachment.size,
                    content_type: attachment.content_type.clone(),
                    width: attachment.width,
                    height: attachment.height,
                    message_id: id.clone(),
                    observed_cursor: observed_cursor.clone(),
                })
            })
            .collect();

        Some(ObservedMessage {
            author_id: author_id.clone(),
            author_name,
            channel,
            message: MessageRecord {
                id: id.clone(),
                content: message.content.clone().unwrap_or_default(),
                timestamp: message.timestamp.clone(),
                edited_timestamp: message.edited_timestamp.clone(),
                user_id: author_id,
                guild_id: scope.id.clone(),
                channel_id,
                account_id: self.config.user_id.clone(),
                observed_cursor,
                has_media: !message.attachments.is_empty(),
            },
            media,
        })
    }

    async fn fetch_listing<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Listing<T>> {
        let settings = WalkSettings::from_config(&self.config);
        let mut throttled = 0u32;

        loop {
            let permit = self.gate.acquire().await;
            let response = self.api.get(permit, path).await?;

            match classify_listing::<T>(response.status, &response.body) {
                ListOutcome::Items(items) => return Ok(Listing::Items(items)),
                ListOutcome::Forbidden => return Ok(Listing::Unavailable(Unavailable::Forbidden)),
                ListOutcome::NotFound => return Ok(Listing::Unavailable(Unavailable::NotFound)),
                ListOutcome::Fatal { status } => {
                    return Err(ScrapeError::UnexpectedStatus {
                        endpoint: path.to_string(),
                        status,
                    }
                    .into())
                }
                ListOutcome::RateLimited { retry_after } => {
                    throttled += 1;
                    if throttled > settings.max_rate_limit_retries {
                        return Err(ScrapeError::RetriesExhausted {
                            endpoint: path.to_string(),
                            attempts: throttled,
                        }
                        .into());
                    }
                    let delay = backoff_delay(retry_after, &settings);
                    warn!(
                        "Rate limited on {}, retrying in {:.1}s...",
                        path,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn deregister(&self, scope: &Scope, reason: Unavailable) -> anyhow::Result<()> {
        match reason {
            Unavailable::Forbidden => {
                warn!("Forbidden access to guild: {} {}", scope.id, scope.label())
            }
            Unavailable::NotFound => warn!("Guild not found: {} {}", scope.id, scope.label()),
        }
        let scope_id = scope.id.clone();
        self.db
            .run_blocking(move |db| db.remove_scope(&scope_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::search_path;
    use crate::testing::{empty_page, hit, rate_limited, search_page, test_config, ScriptedApi};
    use serde_json::{json, Value};
    use std::time::Duration;

    const G1_SEARCH: &str = "v9/guilds/G1/messages/search/tabs";
    const G2_SEARCH: &str = "v9/guilds/G2/messages/search/tabs";
    const DM_SEARCH: &str = "v9/users/@me/messages/search/tabs";

    fn test_db() -> Database {
        let db = Database::new(&test_config()).unwrap();
        db.execute_init().unwrap();
        db
    }

    fn scraper(config: Config, db: &Database, api: &Arc<ScriptedApi>) -> Scraper {
        Scraper::new(
            config,
            db.clone(),
            api.clone(),
            Arc::new(RequestGate::unlimited()),
        )
    }

    fn guilds(api: &ScriptedApi, ids: &[&str]) {
        let body: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "name": format!("Guild {}", id)}))
            .collect();
        api.respond(GUILDS_PATH, 200, Value::Array(body));
    }

    fn text_channels(api: &ScriptedApi, guild: &str, channel: &str) {
        api.respond(
            channels_path(guild),
            200,
            json!([
                {"id": channel, "name": "general", "type": 0, "nsfw": false},
                {"id": format!("{}-voice", channel), "name": "voice", "type": 2}
            ]),
        );
    }

    /// A page holding a single hit whose timestamp is also the page cursor.
    fn one_hit(id: &str, channel: &str, timestamp: &str, file: &str) -> Value {
        search_page(vec![hit(id, channel, timestamp, &[file])], Some(timestamp))
    }

    fn search_bodies(api: &ScriptedApi, path: &str) -> Vec<Value> {
        api.calls_to(path)
            .into_iter()
            .map(|call| call.body.unwrap()["tabs"]["media"]["cursor"].clone())
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_stores_media_and_cursor() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        text_channels(&api, "G1", "c1");
        api.respond(
            G1_SEARCH,
            200,
            search_page(
                vec![hit("m1", "c1", "t1", &["f1"]), hit("m2", "c1", "t2", &["f2"])],
                Some("t2"),
            ),
        )
        .respond(G1_SEARCH, 200, empty_page());

        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        assert_eq!(summary.new_media, 2);
        assert_eq!(summary.total_media, 2);
        assert_eq!(summary.scopes_scanned, 2);
        assert_eq!(summary.scopes_removed, 0);
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.messages, 2);
        assert_eq!(api.calls_to(G1_SEARCH).len(), 2);
        assert_eq!(
            db.get_cursor("G1", CursorKind::Media).unwrap().as_deref(),
            Some("t2")
        );

        // Channel sync named it; the message write must not blank the name.
        let channel = db.get_channel("c1").unwrap().unwrap();
        assert_eq!(channel.name, "general");
        assert_eq!(channel.guild_id, "G1");
        assert!(db.get_channel("c1-voice").unwrap().is_none());

        let message = db.get_message("m1").unwrap().unwrap();
        assert_eq!(message.account_id, "acc");
        assert_eq!(message.user_id, "u1");
        assert_eq!(message.observed_cursor.as_deref(), Some("t2"));
        assert!(message.has_media);
    }

    #[tokio::test]
    async fn test_dm_hits_land_in_dm_scope() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        api.respond(DM_SEARCH, 200, one_hit("m9", "d1", "t4", "f9"));

        let summary = scraper(test_config(), &db, &api).run().await.unwrap();
        assert_eq!(summary.new_media, 1);
        assert_eq!(summary.scopes_scanned, 1);

        let channel = db.get_channel("d1").unwrap().unwrap();
        assert_eq!(channel.name, "alice DMs");
        assert_eq!(channel.guild_id, DM_SCOPE);
        assert!(channel.is_dm);
        assert_eq!(db.get_message("m9").unwrap().unwrap().guild_id, DM_SCOPE);
        assert_eq!(
            db.get_cursor(DM_SCOPE, CursorKind::Media).unwrap().as_deref(),
            Some("t4")
        );
    }

    #[tokio::test]
    async fn test_forbidden_channel_listing_deregisters_guild() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1", "G2"]);
        text_channels(&api, "G1", "c1");
        api.respond(channels_path("G2"), 403, json!({"message": "Missing Access"}));

        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        assert_eq!(summary.scopes_removed, 1);
        assert!(api.calls_to(G2_SEARCH).is_empty());
        assert_eq!(api.calls_to(G1_SEARCH).len(), 1);
        let remaining: Vec<String> = db
            .list_scopes(None)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(remaining, vec!["G1".to_string(), DM_SCOPE.to_string()]);
    }

    #[tokio::test]
    async fn test_guild_with_history_is_deregistered_without_losing_it() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        text_channels(&api, "G1", "c1");
        api.respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"));
        scraper(test_config(), &db, &api).run().await.unwrap();

        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(channels_path("G1"), 403, json!({"message": "Missing Access"}));
        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        assert_eq!(summary.scopes_removed, 1);
        assert_eq!(summary.total_media, 1);
        assert!(api.calls_to(G1_SEARCH).is_empty());
        assert_eq!(api.calls_to(DM_SEARCH).len(), 1);
        assert_eq!(db.get_message("m1").unwrap().unwrap().guild_id, "G1");
        assert_eq!(db.get_channel("c1").unwrap().unwrap().name, "general");
        let remaining: Vec<String> = db
            .list_scopes(None)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(remaining, vec![DM_SCOPE.to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable_scope_mid_walk_is_removed_and_run_continues() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1", "G2"]);
        api.respond(G1_SEARCH, 404, json!({"message": "Unknown Guild"}));
        api.respond(G2_SEARCH, 200, one_hit("m5", "c2", "t5", "f5"));

        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        assert_eq!(summary.scopes_removed, 1);
        assert_eq!(summary.new_media, 1);
        assert!(db.get_cursor("G1", CursorKind::Media).unwrap().is_none());
        assert_eq!(
            db.get_cursor("G2", CursorKind::Media).unwrap().as_deref(),
            Some("t5")
        );
        assert!(db.list_scopes(Some(&["G1".to_string()])).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_resumes_from_stored_cursor() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"));
        scraper(test_config(), &db, &api).run().await.unwrap();

        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(G1_SEARCH, 200, one_hit("m2", "c1", "t2", "f2"));
        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        assert_eq!(
            search_bodies(&api, G1_SEARCH)[0],
            json!({"timestamp": "t1", "type": "timestamp"})
        );
        assert_eq!(summary.new_media, 1);
        assert_eq!(summary.total_media, 2);
    }

    #[tokio::test]
    async fn test_deep_scrape_restarts_and_stays_idempotent() {
        let db = test_db();
        for _ in 0..2 {
            let api = Arc::new(ScriptedApi::new());
            guilds(&api, &["G1"]);
            api.respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"));
            let mut config = test_config();
            config.deep_scrape = true;
            scraper(config, &db, &api).run().await.unwrap();
            assert_eq!(search_bodies(&api, G1_SEARCH)[0], Value::Null);
        }
        assert_eq!(db.count_media().unwrap(), 1);

        db.advance_cursor("G1", "t9", CursorKind::Media).unwrap();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"));
        let mut config = test_config();
        config.deep_scrape = true;
        let summary = scraper(config, &db, &api).run().await.unwrap();

        assert_eq!(summary.new_media, 0);
        assert_eq!(
            db.get_cursor("G1", CursorKind::Media).unwrap().as_deref(),
            Some("t1")
        );
    }

    #[tokio::test]
    async fn test_allowlist_limits_guild_scopes() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1", "G2"]);
        let mut config = test_config();
        config.guild_allowlist = vec!["G2".to_string()];

        let summary = scraper(config, &db, &api).run().await.unwrap();

        assert_eq!(summary.scopes_scanned, 2);
        assert!(api.calls_to(&channels_path("G1")).is_empty());
        assert!(api.calls_to(G1_SEARCH).is_empty());
        assert_eq!(api.calls_to(G2_SEARCH).len(), 1);
        assert_eq!(api.calls_to(DM_SEARCH).len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_status_aborts_but_keeps_committed_pages() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"))
            .respond(G1_SEARCH, 500, Value::Null);

        let err = scraper(test_config(), &db, &api).run().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ScrapeError>(),
            Some(ScrapeError::UnexpectedStatus { status: 500, .. })
        ));
        assert_eq!(db.count_media().unwrap(), 1);
        assert_eq!(
            db.get_cursor("G1", CursorKind::Media).unwrap().as_deref(),
            Some("t1")
        );
        assert!(api.calls_to(DM_SEARCH).is_empty());
    }

    #[tokio::test]
    async fn test_guild_listing_failure_is_fatal() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        api.respond(GUILDS_PATH, 401, json!({"message": "401: Unauthorized"}));

        assert!(scraper(test_config(), &db, &api).run().await.is_err());
        assert!(api.calls_to(DM_SEARCH).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_channel_listing_waits_then_retries() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        guilds(&api, &["G1"]);
        api.respond(channels_path("G1"), 429, Value::Null);
        text_channels(&api, "G1", "c1");
        api.respond(G1_SEARCH, 200, rate_limited(1.0))
            .respond(G1_SEARCH, 200, one_hit("m1", "c1", "t1", "f1"));

        let summary = scraper(test_config(), &db, &api).run().await.unwrap();

        let listing = api.calls_to(&channels_path("G1"));
        assert_eq!(listing.len(), 2);
        assert!(listing[1].at - listing[0].at >= Duration::from_secs(5));
        let searches = api.calls_to(G1_SEARCH);
        assert!(searches[1].at - searches[0].at >= Duration::from_millis(1200));
        assert_eq!(searches[0].body, searches[1].body);
        assert_eq!(summary.new_media, 1);
        assert!(db.get_channel("c1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_extract_skips_attachments_without_url_or_id() {
        let db = test_db();
        let scraper = scraper(test_config(), &db, &Arc::new(ScriptedApi::new()));
        let message: SearchMessage = serde_json::from_value(json!({
            "id": "m1",
            "channel_id": "c1",
            "attachments": [
                {"id": "f1", "url": "https://cdn.example/f1.png"},
                {"id": "f2"},
                {"url": "https://cdn.example/anonymous.png"}
            ]
        }))
        .unwrap();
        let scope = Scope {
            id: "G1".to_string(),
            name: None,
            kind: crate::scope::ScopeKind::Guild,
            resume_cursor: None,
        };

        let observed = scraper.extract(&scope, &message, Some("t1")).unwrap();
        assert_eq!(observed.media.len(), 1);
        assert_eq!(observed.media[0].file_id, "f1");
        assert!(observed.message.has_media);
        assert_eq!(observed.author_id, UNKNOWN_ID);
        assert_eq!(observed.message.content, "");
        assert!(matches!(observed.channel, ChannelWrite::EnsureExists(_)));
        assert_eq!(search_path(&scope.id), G1_SEARCH);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_run() {
        let db = test_db();
        let api = Arc::new(ScriptedApi::new());
        api.fail_posts_to(DM_SEARCH);

        assert!(scraper(test_config(), &db, &api).run().await.is_err());
        assert_eq!(api.calls_to(DM_SEARCH).len(), 1);
    }
}
