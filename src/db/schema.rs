// A deregistered guild keeps its row with `removed = 1` so the channels,
// messages and media that reference it stay valid.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        name TEXT,
        credential TEXT
    );

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT
    );

    CREATE TABLE IF NOT EXISTS guilds (
        id TEXT PRIMARY KEY,
        name TEXT,
        last_media_cursor TEXT,
        last_message_cursor TEXT,
        removed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS channels (
        id TEXT PRIMARY KEY,
        name TEXT,
        is_dm INTEGER NOT NULL DEFAULT 0,
        is_nsfw INTEGER NOT NULL DEFAULT 0,
        guild_id TEXT NOT NULL,
        FOREIGN KEY (guild_id) REFERENCES guilds(id)
    );
    CREATE INDEX IF NOT EXISTS idx_channels_guild ON channels (guild_id);

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        content TEXT,
        timestamp TEXT,
        edited_timestamp TEXT,
        user_id TEXT NOT NULL,
        guild_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        account_id TEXT NOT NULL,
        observed_cursor TEXT,
        has_media INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (guild_id) REFERENCES guilds(id),
        FOREIGN KEY (channel_id) REFERENCES channels(id),
        FOREIGN KEY (account_id) REFERENCES accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_messages_guild ON messages (guild_id);

    CREATE TABLE IF NOT EXISTS media (
        file_id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        filename TEXT,
        size INTEGER,
        content_type TEXT,
        width INTEGER,
        height INTEGER,
        message_id TEXT NOT NULL,
        observed_cursor TEXT,
        FOREIGN KEY (message_id) REFERENCES messages(id)
    );
    CREATE INDEX IF NOT EXISTS idx_media_message ON media (message_id);
";
