//! Database schema definitions
//!
//! The same schema backs the in-memory catalog and the durable store.

/// SQL schema for both metadata tables
pub const SCHEMA_SQL: &str = r#"
-- Every discovered page, keyed by canonical URL.
-- last_crawled NULL = pending; claiming sets it with a provisional 200.
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    last_crawled TEXT,
    last_seen TEXT NOT NULL,
    status_code INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_pending ON pages(last_crawled);

-- Every discovered image, keyed by canonical URL.
-- mime 'unsupported' marks a permanently rejected image.
CREATE TABLE IF NOT EXISTS images (
    url TEXT PRIMARY KEY,
    alt TEXT,
    source TEXT NOT NULL,
    surrounding TEXT,
    file_size INTEGER NOT NULL DEFAULT 0,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    mime TEXT,
    last_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_mime ON images(mime);
"#;

/// Initializes the schema on a connection; safe to run repeatedly
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
