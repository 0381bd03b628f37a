use std::path::{Path, PathBuf};
use std::sync::Arc;

use gradecore_models::Digest;
use libsql::{params, Connection, Database};
use sha2::{Digest as _, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::errors::CacheError;

/// Content-addressed blob store (§4.1). Blobs live on the local
/// filesystem sharded two levels deep by digest prefix; a small libsql
/// side-table tracks descriptions and tombstones.
#[derive(Clone)]
pub struct FileCache {
    root: PathBuf,
    metadata: Arc<Database>,
}

impl FileCache {
    pub async fn open(root: impl Into<PathBuf>, metadata_url: &str) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let metadata = libsql::Builder::new_local(metadata_url)
            .build()
            .await
            .map_err(CacheError::Metadata)?;

        let conn = metadata.connect().map_err(CacheError::Metadata)?;
        apply_schema(&conn).await?;

        Ok(Self {
            root,
            metadata: Arc::new(metadata),
        })
    }

    fn shard_path(&self, digest: &Digest) -> PathBuf {
        let s = digest.as_str();
        let (a, b) = if s.len() >= 4 {
            (&s[0..2], &s[2..4])
        } else {
            ("00", "00")
        };
        self.root.join(a).join(b).join(s)
    }

    /// Hashes `bytes`, stores them exactly once, and returns the Digest.
    /// Idempotent: re-putting identical bytes does not duplicate storage.
    #[instrument(skip(self, bytes))]
    pub async fn put(
        &self,
        bytes: &[u8],
        description: Option<&str>,
    ) -> Result<Digest, CacheError> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = Digest::new(hex::encode(hasher.finalize()));

        let path = self.shard_path(&digest);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let tmp = path.with_extension("tmp");
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&tmp, &path).await?;
            info!(digest = %digest, bytes = bytes.len(), "blob stored");
        }

        let conn = self.metadata.connect().map_err(CacheError::Metadata)?;
        conn.execute(
            "INSERT INTO blob_metadata (digest, description, tombstoned) VALUES (?1, ?2, 0)
             ON CONFLICT(digest) DO UPDATE SET description = COALESCE(excluded.description, blob_metadata.description)",
            params![digest.as_str(), description],
        )
        .await
        .map_err(CacheError::Metadata)?;

        Ok(digest)
    }

    /// Reads the full blob into memory. Fails `NotFound` if unknown,
    /// `Tombstone` if marked known-lost.
    pub async fn get(&self, digest: &Digest) -> Result<Vec<u8>, CacheError> {
        self.check_not_tombstoned(digest).await?;
        let path = self.shard_path(digest);
        fs::read(&path)
            .await
            .map_err(|_| CacheError::NotFound(digest.as_str().to_string()))
    }

    /// Materializes the blob at `dest`, atomically (write to a temp file
    /// in the same directory, then rename).
    pub async fn get_to_path(&self, digest: &Digest, dest: &Path) -> Result<(), CacheError> {
        self.check_not_tombstoned(digest).await?;
        let src = self.shard_path(digest);
        if !fs::try_exists(&src).await.unwrap_or(false) {
            return Err(CacheError::NotFound(digest.as_str().to_string()));
        }
        let tmp = dest.with_extension("tmp");
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&src, &tmp).await?;
        fs::rename(&tmp, dest).await?;
        Ok(())
    }

    pub async fn exists(&self, digest: &Digest) -> bool {
        fs::try_exists(self.shard_path(digest)).await.unwrap_or(false)
    }

    pub async fn describe(&self, digest: &Digest) -> Result<Option<String>, CacheError> {
        let conn = self.metadata.connect().map_err(CacheError::Metadata)?;
        let mut rows = conn
            .query(
                "SELECT description FROM blob_metadata WHERE digest = ?1",
                params![digest.as_str()],
            )
            .await
            .map_err(CacheError::Metadata)?;
        match rows.next().await.map_err(CacheError::Metadata)? {
            Some(row) => Ok(row.get::<Option<String>>(0).map_err(CacheError::Metadata)?),
            None => Ok(None),
        }
    }

    /// Marks a digest known-lost. Subsequent `get`/`get_to_path` calls
    /// fail with `Tombstone` instead of `NotFound` (§7).
    pub async fn tombstone(&self, digest: &Digest) -> Result<(), CacheError> {
        let conn = self.metadata.connect().map_err(CacheError::Metadata)?;
        conn.execute(
            "INSERT INTO blob_metadata (digest, description, tombstoned) VALUES (?1, NULL, 1)
             ON CONFLICT(digest) DO UPDATE SET tombstoned = 1",
            params![digest.as_str()],
        )
        .await
        .map_err(CacheError::Metadata)?;
        warn!(digest = %digest, "digest tombstoned");
        Ok(())
    }

    async fn check_not_tombstoned(&self, digest: &Digest) -> Result<(), CacheError> {
        let conn = self.metadata.connect().map_err(CacheError::Metadata)?;
        let mut rows = conn
            .query(
                "SELECT tombstoned FROM blob_metadata WHERE digest = ?1",
                params![digest.as_str()],
            )
            .await
            .map_err(CacheError::Metadata)?;
        if let Some(row) = rows.next().await.map_err(CacheError::Metadata)? {
            let tombstoned: i64 = row.get(0).map_err(CacheError::Metadata)?;
            if tombstoned != 0 {
                return Err(CacheError::Tombstone(digest.as_str().to_string()));
            }
        }
        Ok(())
    }
}

async fn apply_schema(conn: &Connection) -> Result<(), CacheError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS blob_metadata (
            digest TEXT PRIMARY KEY,
            description TEXT,
            tombstoned INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )
    .await
    .map_err(CacheError::Metadata)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> (FileCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blobs");
        let meta = dir.path().join("meta.db");
        let cache = FileCache::open(root, meta.to_str().unwrap()).await.unwrap();
        (cache, dir)
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let (cache, _dir) = cache().await;
        let d1 = cache.put(b"hello", None).await.unwrap();
        let d2 = cache.put(b"hello", None).await.unwrap();
        assert_eq!(d1, d2);
        assert_eq!(cache.get(&d1).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn unknown_digest_is_not_found() {
        let (cache, _dir) = cache().await;
        let digest = Digest::new("deadbeef");
        assert!(matches!(
            cache.get(&digest).await,
            Err(CacheError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn tombstoned_digest_fails_distinctly() {
        let (cache, _dir) = cache().await;
        let digest = cache.put(b"payload", None).await.unwrap();
        cache.tombstone(&digest).await.unwrap();
        assert!(matches!(
            cache.get(&digest).await,
            Err(CacheError::Tombstone(_))
        ));
    }

    #[tokio::test]
    async fn get_to_path_materializes_file() {
        let (cache, dir) = cache().await;
        let digest = cache.put(b"materialize me", None).await.unwrap();
        let dest = dir.path().join("out.bin");
        cache.get_to_path(&digest, &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"materialize me");
    }
}
