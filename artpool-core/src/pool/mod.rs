//! Pool directories and their members.

pub mod member;
pub mod resolver;

use std::path::{Path, PathBuf};

pub use member::{MemberNameAllocator, PoolMember, is_member_name, is_snapshot_name};
pub use resolver::{ARTWORK_EXTENSIONS, PoolLocation, PoolResolver};

use crate::error::Result;
use crate::state::PoolSideFiles;

/// Handle to one pool directory.
#[derive(Debug, Clone)]
pub struct Pool {
    dir: PathBuf,
    side_files: PoolSideFiles,
}

impl Pool {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            side_files: PoolSideFiles::new(&dir),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn side_files(&self) -> &PoolSideFiles {
        &self.side_files
    }

    pub fn member_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Current members sorted by file name. A missing directory is an empty
    /// pool.
    pub async fn members(&self) -> Result<Vec<PoolMember>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut members = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            // Zero-byte files are interrupted copies, not artwork.
            if meta.len() == 0 {
                continue;
            }
            if let Some(member) = PoolMember::from_path(entry.path(), meta.len()) {
                members.push(member);
            }
        }
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    pub async fn snapshot(&self) -> Result<Option<PoolMember>> {
        Ok(self.members().await?.into_iter().find(|m| m.is_snapshot))
    }
}
