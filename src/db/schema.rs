pub const SCHEMA: &str = r#"
-- Photos: one row per stored object
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    storage_path TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT NOT NULL,

    -- Optional associations, kept consistent by the application
    album_id TEXT,
    event_id TEXT,

    -- Derived by the remote analysis functions
    tags TEXT NOT NULL DEFAULT '[]',   -- JSON array
    context TEXT NOT NULL DEFAULT '',
    embedding BLOB,                    -- float32 array stored as bytes
    embedding_dim INTEGER,
    faces TEXT NOT NULL DEFAULT '[]',  -- JSON array of face identifiers

    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_user ON photos(user_id);
CREATE INDEX IF NOT EXISTS idx_photos_album ON photos(album_id);
CREATE INDEX IF NOT EXISTS idx_photos_event ON photos(event_id);
CREATE INDEX IF NOT EXISTS idx_photos_created ON photos(created_at);

CREATE TABLE IF NOT EXISTS albums (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    cover_image_url TEXT,
    is_public INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_albums_user ON albums(user_id);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    location TEXT,
    date TEXT NOT NULL,
    is_public INTEGER NOT NULL DEFAULT 0,
    photo_count INTEGER NOT NULL DEFAULT 0,  -- denormalized, see counters
    share_code TEXT UNIQUE,
    cover_image_url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);

-- Named reference embeddings for people
CREATE TABLE IF NOT EXISTS face_profiles (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    embedding BLOB NOT NULL,
    embedding_dim INTEGER NOT NULL,
    reference_photo_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_face_profiles_user ON face_profiles(user_id);

CREATE TABLE IF NOT EXISTS shared_links (
    id TEXT PRIMARY KEY,
    event_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    share_code TEXT NOT NULL UNIQUE,
    requires_face_auth INTEGER NOT NULL DEFAULT 0,
    expires_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shared_links_event ON shared_links(event_id);
"#;

/// Statements applied after SCHEMA to bring older databases up to date;
/// a failure means the change is already present. Columns that SCHEMA
/// already creates never belong here.
pub const MIGRATIONS: &[&str] = &[];
