use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

/// Snapshot files in a data directory, one JSON document per file.
#[derive(Clone, Debug)]
pub struct JsonStore {
    dir: PathBuf,
    // One writer at a time; every write of a file goes through the same temp path.
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::default(),
        }
    }

    /// Read `file`, returning `None` when it does not exist yet.
    pub async fn read<T>(&self, file: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read `{}`", path.display()));
            }
        };

        let parsed = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("failed to parse `{}`: {e}", path.display()))?;
        Ok(Some(parsed))
    }

    /// Write `value` to `file` through a temp file and rename, so readers never see a partial
    /// snapshot.
    pub async fn write<T>(&self, file: &str, value: &T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create `{}`", self.dir.display()))?;

        let path = self.dir.join(file);
        let tmp_path = self.dir.join(format!("{file}.tmp"));
        let payload = serde_json::to_vec_pretty(value)
            .map_err(|e| anyhow::anyhow!("failed to serialize `{file}`: {e}"))?;

        tokio::fs::write(&tmp_path, payload)
            .await
            .with_context(|| format!("failed to write `{}`", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("failed to replace `{}`", path.display()))?;

        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }
}
