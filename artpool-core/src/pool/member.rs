use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::state::atomic::is_staging_name;

pub const MEMBER_PREFIX: &str = "pool_";
pub const SNAPSHOT_STEM: &str = "pool_currentprimary";

/// One image file inside a pool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Seeded from the item's artwork at the time the pool was created.
    pub is_snapshot: bool,
}

impl PoolMember {
    pub fn from_path(path: PathBuf, size: u64) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        if !is_member_name(&name) {
            return None;
        }
        Some(Self {
            is_snapshot: is_snapshot_name(&name),
            name,
            path,
            size,
        })
    }

    pub fn extension(&self) -> &str {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("jpg")
    }
}

/// `pool_<anything>.<image ext>`, excluding staged temp files and the JSON
/// side-files (which share the prefix).
pub fn is_member_name(name: &str) -> bool {
    if !name.starts_with(MEMBER_PREFIX) || is_staging_name(name) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .is_some()
}

pub fn is_snapshot_name(name: &str) -> bool {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.eq_ignore_ascii_case(SNAPSHOT_STEM))
}

pub fn snapshot_name(ext: &str) -> String {
    format!("{SNAPSHOT_STEM}.{ext}")
}

pub fn timestamped_name(unix_millis: i64, ext: &str) -> String {
    format!("{MEMBER_PREFIX}{unix_millis}.{ext}")
}

/// Hands out `pool_<millis>` names that are strictly increasing within one
/// allocator and never collide with an existing file in the pool.
#[derive(Debug)]
pub struct MemberNameAllocator {
    dir: PathBuf,
    last_millis: i64,
}

impl MemberNameAllocator {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            last_millis: 0,
        }
    }

    pub fn next(&mut self, now_millis: i64, ext: &str) -> String {
        let mut millis = now_millis.max(self.last_millis + 1);
        loop {
            let name = timestamped_name(millis, ext);
            if !self.dir.join(&name).exists() {
                self.last_millis = millis;
                return name;
            }
            millis += 1;
        }
    }
}
