//! Image blob cache
//!
//! Every successfully downloaded image lives on disk at a path derived
//! deterministically from its URL: the lowercase hex SHA-256 of the URL,
//! sharded as `<h[0]>/<h[1]>/<h[2..]>.jpg`. The mapping needs no index and
//! is invertible from the path, which is what the offline move and
//! reconcile utilities rely on.

use crate::state::RunFlags;
use crate::storage::MetaStore;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Blob file extension; the pipeline re-encodes everything as JPEG
const BLOB_EXT: &str = "jpg";

/// Deterministic hash of a canonical image URL
pub fn url_hash(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// The two-level shard path of a hash under the cache root
pub fn shard_path(cache_root: &Path, hash: &str) -> PathBuf {
    cache_root
        .join(&hash[..1])
        .join(&hash[1..2])
        .join(format!("{}.{}", &hash[2..], BLOB_EXT))
}

/// Blob path for an image URL
pub fn blob_path(cache_root: &Path, url: &str) -> PathBuf {
    shard_path(cache_root, &url_hash(url))
}

/// Recovers the URL hash from a blob's sharded path
pub fn hash_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let sub = path.parent()?.file_name()?.to_str()?;
    let top = path.parent()?.parent()?.file_name()?.to_str()?;
    Some(format!("{}{}{}", top, sub, stem))
}

/// Visits every `.jpg` blob under `root` with an explicit-stack walk
///
/// The stop flag is checked once per file visited, so a cancellation
/// request bounds the remaining work to one file.
fn walk_blobs<F>(root: &Path, flags: &RunFlags, mut visit: F) -> std::io::Result<()>
where
    F: FnMut(PathBuf) -> std::io::Result<()>,
{
    if !root.is_dir() {
        return Ok(());
    }
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if flags.stop_requested() {
                return Ok(());
            }
            if path.is_dir() {
                dirs.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXT) {
                visit(path)?;
            }
        }
    }
    Ok(())
}

/// Outcome of a cache move
#[derive(Debug, Default)]
pub struct MoveReport {
    pub blobs_moved: u64,
    pub records_merged: usize,
}

/// Relocates the blob tree and image metadata to a new root
///
/// Each blob is copied to its recomputed shard path under
/// `dst_root/<cache dir name>` and removed from the source; image records
/// are then bulk-inserted into the destination metadata store in one
/// transaction, skipping URLs it already has.
pub fn move_cache(
    src_db: &Path,
    src_cache: &Path,
    dst_root: &Path,
    flags: &RunFlags,
) -> Result<MoveReport> {
    let cache_name = src_cache.file_name().unwrap_or_else(|| "img_cache".as_ref());
    let dst_cache = dst_root.join(cache_name);
    let db_name = src_db.file_name().unwrap_or_else(|| "queues.db".as_ref());
    let dst_db = dst_root.join(db_name);

    let mut report = MoveReport::default();
    walk_blobs(src_cache, flags, |path| {
        let Some(hash) = hash_from_path(&path) else {
            tracing::warn!("skipping blob with unexpected layout: {}", path.display());
            return Ok(());
        };
        let dest = shard_path(&dst_cache, &hash);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&path, &dest)?;
        std::fs::remove_file(&path)?;
        report.blobs_moved += 1;
        Ok(())
    })?;
    tracing::info!("moved {} blob(s) to {}", report.blobs_moved, dst_cache.display());

    let source = MetaStore::open(src_db)?;
    let mut destination = MetaStore::open(&dst_db)?;
    report.records_merged = destination.merge_images(&source.load_images()?)?;
    tracing::info!(
        "merged {} image record(s) into {}",
        report.records_merged,
        dst_db.display()
    );

    Ok(report)
}

/// Outcome of a cache reconciliation
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub blobs_scanned: u64,
    pub blobs_removed: u64,
}

/// Deletes cached blobs that no longer have a metadata row
///
/// Scans the blob tree, hashes every image URL in the metadata store, and
/// removes any blob whose hash has no matching row.
pub fn reconcile(db: &Path, cache_root: &Path, flags: &RunFlags) -> Result<ReconcileReport> {
    let mut blobs: HashMap<String, PathBuf> = HashMap::new();
    walk_blobs(cache_root, flags, |path| {
        if let Some(hash) = hash_from_path(&path) {
            blobs.insert(hash, path);
        }
        Ok(())
    })?;

    let store = MetaStore::open(db)?;
    let mut known: HashSet<String> = HashSet::new();
    for url in store.image_urls()? {
        if flags.stop_requested() {
            return Ok(ReconcileReport {
                blobs_scanned: blobs.len() as u64,
                blobs_removed: 0,
            });
        }
        known.insert(url_hash(&url));
    }

    let mut report = ReconcileReport {
        blobs_scanned: blobs.len() as u64,
        blobs_removed: 0,
    };
    for (hash, path) in &blobs {
        if flags.stop_requested() {
            break;
        }
        if !known.contains(hash) {
            std::fs::remove_file(path)?;
            report.blobs_removed += 1;
        }
    }
    tracing::info!(
        "reconcile: {} blob(s) scanned, {} removed",
        report.blobs_scanned,
        report.blobs_removed
    );
    Ok(report)
}
