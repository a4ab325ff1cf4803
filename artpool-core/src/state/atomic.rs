use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PoolError, Result};

/// Marker embedded in staged file names. Directory listings skip anything
/// carrying it, so a staged file is never mistaken for a real document or
/// pool member.
pub const STAGING_MARKER: &str = ".tmp-";

pub fn is_staging_name(name: &str) -> bool {
    name.contains(STAGING_MARKER)
}

/// Bytes written to a sibling temp path but not yet visible at the target.
///
/// Dropping a `StagedWrite` without committing leaves the temp file behind,
/// exactly like a crash between write and rename would. The target keeps
/// its previous content either way.
#[derive(Debug)]
#[must_use = "staged bytes are invisible until committed"]
pub struct StagedWrite {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over the target. This is the only operation
    /// that mutates the target path.
    pub async fn commit(self) -> Result<PathBuf> {
        match tokio::fs::rename(&self.tmp, &self.target).await {
            Ok(()) => Ok(self.target),
            Err(err) => {
                let _ = tokio::fs::remove_file(&self.tmp).await;
                Err(PoolError::Internal(format!(
                    "failed to move {:?} -> {:?}: {err}",
                    self.tmp, self.target
                )))
            }
        }
    }
}

/// Write `bytes` to a temp file next to `target` and flush it to disk.
pub async fn stage_bytes(target: &Path, bytes: &[u8]) -> Result<StagedWrite> {
    let parent = target.parent().ok_or_else(|| {
        PoolError::Internal(format!("{target:?} has no parent directory"))
    })?;
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            PoolError::Internal(format!("{target:?} has no usable file name"))
        })?;

    let tmp = parent.join(format!(
        "{file_name}{STAGING_MARKER}{}",
        Uuid::new_v4().simple()
    ));

    let mut file = tokio::fs::File::create(&tmp).await.map_err(|err| {
        PoolError::Internal(format!(
            "failed to create temp file {:?}: {err}",
            tmp
        ))
    })?;

    let written = async {
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(err) = written {
        drop(file);
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PoolError::Internal(format!(
            "failed to write temp file {:?}: {err}",
            tmp
        )));
    }
    drop(file);

    Ok(StagedWrite {
        tmp,
        target: target.to_path_buf(),
    })
}

/// Atomically replace `target` with `bytes` (temp + rename).
pub async fn write_bytes_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    stage_bytes(target, bytes).await?.commit().await?;
    Ok(())
}

/// Atomically replace `target` with the pretty-printed JSON of `value`.
pub async fn write_json_atomic<T>(target: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(target, &bytes).await?;
    debug!(path = ?target, bytes = bytes.len(), "wrote state document");
    Ok(())
}

/// Read a JSON document, falling back to defaults when it is missing or
/// cannot be parsed. A corrupt document is never fatal.
pub async fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return T::default();
        }
        Err(err) => {
            warn!(path = ?path, error = %err, "unreadable state document; using defaults");
            return T::default();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = ?path, error = %err, "corrupt state document; using defaults");
            T::default()
        }
    }
}
