//! SQLite table store
//!
//! [`MetaStore`] wraps one rusqlite connection and implements every record
//! operation the catalog and the persistence synchronizer need. The same
//! type is opened `:memory:` for the live catalog and on a file path for
//! the durable store.

use crate::config::{PENDING_STATUS, UNSUPPORTED_MIME};
use crate::storage::schema::initialize_schema;
use crate::storage::{CatalogCounts, ImageMetadata, ImageRecord, PageRecord, StorageResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Metadata store holding the pages and images tables
pub struct MetaStore {
    conn: Connection,
}

impl MetaStore {
    /// Opens (or creates) a durable store at the given path
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates the in-memory tier used as the live catalog
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Page operations =====

    /// Inserts a page, or refreshes `last_seen` when the URL already exists
    pub fn upsert_page(&self, url: &str, last_seen: &str) -> StorageResult<()> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (url, last_crawled, last_seen, status_code)
             VALUES (?1, NULL, ?2, ?3)",
            params![url, last_seen, PENDING_STATUS],
        )?;
        if inserted == 0 {
            self.conn.execute(
                "UPDATE pages SET last_seen = ?1 WHERE url = ?2",
                params![last_seen, url],
            )?;
        }
        Ok(())
    }

    /// Inserts a full page record, ignoring an existing row with the same URL
    pub fn insert_page_if_absent(&self, page: &PageRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (url, last_crawled, last_seen, status_code)
             VALUES (?1, ?2, ?3, ?4)",
            params![page.url, page.last_crawled, page.last_seen, page.status_code],
        )?;
        Ok(inserted > 0)
    }

    /// Claims one pending page: marks it crawled-now with a provisional 200
    /// and returns its URL. Returns `None` when nothing is pending.
    ///
    /// Callers serialize claims through the catalog lock, which is what makes
    /// the select-then-update pair atomic.
    pub fn claim_next_pending(&self, now: &str) -> StorageResult<Option<String>> {
        let url: Option<String> = self
            .conn
            .query_row(
                "SELECT url FROM pages WHERE last_crawled IS NULL LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(ref url) = url {
            self.conn.execute(
                "UPDATE pages SET last_crawled = ?1, status_code = 200 WHERE url = ?2",
                params![now, url],
            )?;
        }
        Ok(url)
    }

    /// Records the terminal status of a claimed page
    pub fn finalize_page(&self, url: &str, status_code: u16) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET status_code = ?1 WHERE url = ?2",
            params![status_code, url],
        )?;
        Ok(())
    }

    // ===== Image operations =====

    /// Attempts to insert a newly discovered image
    ///
    /// Returns `true` when the record was inserted (the image is new); on a
    /// URL conflict only `last_seen` is refreshed and `false` is returned.
    pub fn upsert_image_if_new(&self, image: &ImageRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO images
                 (url, alt, source, surrounding, file_size, width, height, mime, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                image.url,
                image.alt,
                image.source_page,
                image.surrounding,
                image.file_size as i64,
                image.width,
                image.height,
                image.mime,
                image.last_seen,
            ],
        )?;
        if inserted == 0 {
            self.conn.execute(
                "UPDATE images SET last_seen = ?1 WHERE url = ?2",
                params![image.last_seen, image.url],
            )?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Patches resolved metadata after a successful download
    pub fn update_image_metadata(&self, url: &str, meta: &ImageMetadata) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE images
             SET alt = ?1, surrounding = ?2, file_size = ?3, width = ?4, height = ?5, mime = ?6
             WHERE url = ?7",
            params![
                meta.alt,
                meta.surrounding,
                meta.file_size as i64,
                meta.width,
                meta.height,
                meta.mime,
                url,
            ],
        )?;
        Ok(())
    }

    /// Permanently rejects an image for this run
    pub fn mark_image_unsupported(&self, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE images SET mime = ?1 WHERE url = ?2",
            params![UNSUPPORTED_MIME, url],
        )?;
        Ok(())
    }

    // ===== Aggregates =====

    /// Read-only counts for backpressure and the stats display
    pub fn counts(&self) -> StorageResult<CatalogCounts> {
        let pending_pages = self.count("SELECT COUNT(*) FROM pages WHERE last_crawled IS NULL")?;
        let visited_pages = self.count(
            "SELECT COUNT(*) FROM pages WHERE last_crawled IS NOT NULL AND status_code = 200",
        )?;
        let resolved_images = self.conn.query_row(
            "SELECT COUNT(*) FROM images WHERE mime IS NULL OR mime != ?1",
            params![UNSUPPORTED_MIME],
            |row| row.get::<_, i64>(0),
        )? as u64;
        let cached_images = self.count("SELECT COUNT(*) FROM images WHERE file_size > 0")?;

        Ok(CatalogCounts {
            pending_pages,
            visited_pages,
            resolved_images,
            cached_images,
        })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ===== Synchronizer operations =====

    /// Removes terminal-failure pages and unsupported images in one
    /// transaction. Returns (pages removed, images removed).
    pub fn prune_terminal_failures(&mut self) -> StorageResult<(usize, usize)> {
        let tx = self.conn.transaction()?;
        let pages = tx.execute(
            "DELETE FROM pages WHERE last_crawled IS NOT NULL AND status_code != 200",
            [],
        )?;
        let images = tx.execute(
            "DELETE FROM images WHERE mime = ?1",
            params![UNSUPPORTED_MIME],
        )?;
        tx.commit()?;
        Ok((pages, images))
    }

    /// Reads every page record
    pub fn load_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, last_crawled, last_seen, status_code FROM pages")?;
        let rows = stmt.query_map([], page_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Reads every image record
    pub fn load_images(&self) -> StorageResult<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, alt, source, surrounding, file_size, width, height, mime, last_seen
             FROM images",
        )?;
        let rows = stmt.query_map([], image_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Reads every image URL, for the offline cache reconciler
    pub fn image_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM images")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replaces the entire contents of this store with the given records,
    /// inside one transaction so a crash never leaves it half-empty
    pub fn replace_all(
        &mut self,
        pages: &[PageRecord],
        images: &[ImageRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM pages", [])?;
        tx.execute("DELETE FROM images", [])?;
        {
            let mut page_stmt = tx.prepare(
                "INSERT INTO pages (url, last_crawled, last_seen, status_code)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for page in pages {
                page_stmt.execute(params![
                    page.url,
                    page.last_crawled,
                    page.last_seen,
                    page.status_code,
                ])?;
            }
            let mut image_stmt = tx.prepare(
                "INSERT INTO images
                     (url, alt, source, surrounding, file_size, width, height, mime, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for image in images {
                image_stmt.execute(params![
                    image.url,
                    image.alt,
                    image.source_page,
                    image.surrounding,
                    image.file_size as i64,
                    image.width,
                    image.height,
                    image.mime,
                    image.last_seen,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Bulk-inserts image records, skipping URLs already present; used by the
    /// offline cache-move utility. Runs in one transaction.
    pub fn merge_images(&mut self, images: &[ImageRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut merged = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO images
                     (url, alt, source, surrounding, file_size, width, height, mime, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for image in images {
                merged += stmt.execute(params![
                    image.url,
                    image.alt,
                    image.source_page,
                    image.surrounding,
                    image.file_size as i64,
                    image.width,
                    image.height,
                    image.mime,
                    image.last_seen,
                ])?;
            }
        }
        tx.commit()?;
        Ok(merged)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        url: row.get(0)?,
        last_crawled: row.get(1)?,
        last_seen: row.get(2)?,
        status_code: row.get::<_, i64>(3)? as u16,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        url: row.get(0)?,
        alt: row.get(1)?,
        source_page: row.get(2)?,
        surrounding: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        width: row.get::<_, i64>(5)? as u32,
        height: row.get::<_, i64>(6)? as u32,
        mime: row.get(7)?,
        last_seen: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2026-01-01 00:00:00";

    fn store() -> MetaStore {
        MetaStore::in_memory().unwrap()
    }

    #[test]
    fn upsert_page_deduplicates() {
        let store = store();
        store.upsert_page("https://x.com/a", NOW).unwrap();
        store.upsert_page("https://x.com/a", "2026-01-02 00:00:00").unwrap();

        let pages = store.load_pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].last_seen, "2026-01-02 00:00:00");
        assert!(pages[0].last_crawled.is_none());
    }

    #[test]
    fn claim_marks_provisional_success() {
        let store = store();
        store.upsert_page("https://x.com/a", NOW).unwrap();

        let claimed = store.claim_next_pending(NOW).unwrap();
        assert_eq!(claimed.as_deref(), Some("https://x.com/a"));

        let pages = store.load_pages().unwrap();
        assert_eq!(pages[0].last_crawled.as_deref(), Some(NOW));
        assert_eq!(pages[0].status_code, 200);

        // Nothing left to claim
        assert!(store.claim_next_pending(NOW).unwrap().is_none());
    }

    #[test]
    fn claim_on_empty_store_is_none() {
        assert!(store().claim_next_pending(NOW).unwrap().is_none());
    }

    #[test]
    fn image_insert_reports_newness_once() {
        let store = store();
        let img = ImageRecord::discovered(
            "https://x.com/i.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        assert!(store.upsert_image_if_new(&img).unwrap());

        let mut again = img.clone();
        again.last_seen = "2026-01-02 00:00:00".into();
        again.source_page = "https://other.com/b".into();
        assert!(!store.upsert_image_if_new(&again).unwrap());

        // First discovery wins for the source page; only last_seen moves
        let images = store.load_images().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].source_page, "https://x.com/a");
        assert_eq!(images[0].last_seen, "2026-01-02 00:00:00");
    }

    #[test]
    fn metadata_patch_round_trips() {
        let store = store();
        let img = ImageRecord::discovered(
            "https://x.com/i.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        store.upsert_image_if_new(&img).unwrap();
        store
            .update_image_metadata(
                "https://x.com/i.jpg",
                &ImageMetadata {
                    alt: "sunset".into(),
                    surrounding: "beach sunset".into(),
                    file_size: 2048,
                    width: 640,
                    height: 480,
                    mime: "jpg".into(),
                },
            )
            .unwrap();

        let images = store.load_images().unwrap();
        assert_eq!(images[0].file_size, 2048);
        assert_eq!(images[0].width, 640);
        assert_eq!(images[0].mime.as_deref(), Some("jpg"));
    }

    #[test]
    fn prune_removes_failures_and_unsupported() {
        let mut store = store();
        store.upsert_page("https://x.com/ok", NOW).unwrap();
        store.upsert_page("https://x.com/bad", NOW).unwrap();
        store.upsert_page("https://x.com/pending", NOW).unwrap();

        // Claim and finalize the first two
        store.claim_next_pending(NOW).unwrap();
        store.claim_next_pending(NOW).unwrap();
        store.finalize_page("https://x.com/bad", 404).unwrap();

        let img = ImageRecord::discovered(
            "https://x.com/i.jpg".into(),
            "https://x.com/ok".into(),
            NOW.into(),
        );
        store.upsert_image_if_new(&img).unwrap();
        store.mark_image_unsupported("https://x.com/i.jpg").unwrap();

        let (pages, images) = store.prune_terminal_failures().unwrap();
        assert_eq!(pages, 1);
        assert_eq!(images, 1);

        let remaining = store.load_pages().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|p| p.url != "https://x.com/bad"));
        assert!(store.load_images().unwrap().is_empty());
    }

    #[test]
    fn counts_match_record_states() {
        let store = store();
        store.upsert_page("https://x.com/a", NOW).unwrap();
        store.upsert_page("https://x.com/b", NOW).unwrap();
        store.claim_next_pending(NOW).unwrap();

        let img_ok = ImageRecord {
            file_size: 100,
            mime: Some("jpg".into()),
            ..ImageRecord::discovered(
                "https://x.com/ok.jpg".into(),
                "https://x.com/a".into(),
                NOW.into(),
            )
        };
        let img_bad = ImageRecord::discovered(
            "https://x.com/bad.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        store.upsert_image_if_new(&img_ok).unwrap();
        store.upsert_image_if_new(&img_bad).unwrap();
        store.mark_image_unsupported("https://x.com/bad.jpg").unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.pending_pages, 1);
        assert_eq!(counts.visited_pages, 1);
        assert_eq!(counts.resolved_images, 1);
        assert_eq!(counts.cached_images, 1);
    }

    #[test]
    fn replace_all_then_load_reproduces_records() {
        let memory = store();
        memory.upsert_page("https://x.com/a", NOW).unwrap();
        let img = ImageRecord::discovered(
            "https://x.com/i.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        memory.upsert_image_if_new(&img).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queues.db");
        let mut durable = MetaStore::open(&db_path).unwrap();
        durable
            .replace_all(&memory.load_pages().unwrap(), &memory.load_images().unwrap())
            .unwrap();
        drop(durable);

        // Simulated restart
        let reopened = MetaStore::open(&db_path).unwrap();
        assert_eq!(reopened.load_pages().unwrap(), memory.load_pages().unwrap());
        assert_eq!(reopened.load_images().unwrap(), memory.load_images().unwrap());
    }

    #[test]
    fn merge_images_skips_duplicates() {
        let mut store = store();
        let img = ImageRecord::discovered(
            "https://x.com/i.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        store.upsert_image_if_new(&img).unwrap();

        let other = ImageRecord::discovered(
            "https://x.com/j.jpg".into(),
            "https://x.com/a".into(),
            NOW.into(),
        );
        let merged = store.merge_images(&[img, other]).unwrap();
        assert_eq!(merged, 1);
        assert_eq!(store.load_images().unwrap().len(), 2);
    }
}
