use super::CacheStore;
use crate::error::{LadderError, LadderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::fs;

// On-disk layout of one cache file. Freshness is judged from the file's
// modification time plus the ttl stored alongside the value.
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    ttl_secs: u64,
    value: String,
}

/// Local cache persisted as one JSON file per key, surviving restarts.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> FileCache {
        FileCache { dir }
    }

    /// Keys carry player names (spaces, unicode), so file names are the hex
    /// encoding of the key bytes.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key.bytes().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{name}.json"))
    }
}

fn io_error(context: &str, e: std::io::Error) -> LadderError {
    LadderError::CacheUnavailable(format!("{context}. {e}"))
}

#[async_trait]
impl CacheStore for FileCache {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> LadderResult<Option<String>> {
        let path = self.path_for(key);
        let modified = match fs::metadata(&path).await {
            Ok(metadata) => metadata.modified().map_err(|e| io_error("No mtime", e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("Could not stat cache file", e)),
        };

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("Could not read cache file", e))?;
        let entry: FileEntry = serde_json::from_str(&content)?;

        let expires_at = modified + Duration::from_secs(entry.ttl_secs);
        if SystemTime::now() >= expires_at {
            // Another reader may have removed it already.
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> LadderResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("Could not create cache dir", e))?;

        let path = self.path_for(key);
        let content = serde_json::to_string(&FileEntry {
            ttl_secs: ttl.as_secs(),
            value,
        })?;

        // Write then rename so readers never see a half-written file.
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, content)
            .await
            .map_err(|e| io_error("Could not write cache file", e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("Could not move cache file", e))?;
        Ok(())
    }
}
