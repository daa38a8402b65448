//! Database schema definitions.

/// SQL schema for the settings database.
pub const SCHEMA_SQL: &str = r#"
-- Key/value settings (current source, channel lock, DLG state)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Last program per ownership class
CREATE TABLE IF NOT EXISTS programs (
    class TEXT PRIMARY KEY NOT NULL,     -- 'tuner' or 'external'
    frequency_hz INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    video_pid INTEGER NOT NULL,
    audio_pid INTEGER NOT NULL,
    pcr_pid INTEGER NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- EDID blob per HDMI port
CREATE TABLE IF NOT EXISTS edid (
    port INTEGER PRIMARY KEY NOT NULL,   -- zero-based HDMI port index
    version INTEGER NOT NULL,
    data BLOB NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Last signal snapshot per source (JSON)
CREATE TABLE IF NOT EXISTS source_info (
    source INTEGER PRIMARY KEY NOT NULL,
    info TEXT NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Channels found by the scanner
CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    service_type INTEGER NOT NULL,       -- 0=ATV, 1=DTV, 2=Radio, 3=Data
    frequency_hz INTEGER NOT NULL,
    service_id INTEGER NOT NULL DEFAULT 0,
    name TEXT,
    major INTEGER NOT NULL DEFAULT 0,
    minor INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE(service_type, frequency_hz, service_id)
);

CREATE INDEX IF NOT EXISTS idx_channels_frequency ON channels(frequency_hz);
CREATE INDEX IF NOT EXISTS idx_channels_service_type ON channels(service_type);
"#;
