//! Operations for manual pool curation.
//!
//! These sit beside the run loop and share its state files; none of them
//! honour the cooldown or the pool lock.

use std::path::PathBuf;

use artpool_model::{CatalogItem, ItemId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::context::RunContext;
use crate::error::{PoolError, Result};
use crate::fingerprint::{Fingerprint, find_near_duplicate};
use crate::pass::{Promotion, ordered_members, promote_and_record};
use crate::pool::{MemberNameAllocator, PoolLocation, is_member_name};
use crate::probe;
use crate::rotation::{RotationSelector, Selection};
use crate::state::{PoolOrder, write_bytes_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub item_id: ItemId,
    pub title: String,
    pub pool_dir: PathBuf,
    pub members: usize,
    pub locked: bool,
    pub last_rotated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDetails {
    pub name: String,
    pub size: u64,
    pub is_snapshot: bool,
    pub language: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolDetails {
    pub summary: PoolSummary,
    /// Members in rotation order.
    pub members: Vec<MemberDetails>,
    pub custom_order: bool,
    pub cursor: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub pools_removed: usize,
    pub state_cleared: bool,
}

#[derive(Debug, Clone)]
pub struct PoolManager {
    ctx: RunContext,
}

impl PoolManager {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    async fn items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self
            .ctx
            .catalog
            .eligible_items(&self.ctx.config.item_kinds)
            .await?)
    }

    async fn locate(&self, id: &ItemId) -> Result<(CatalogItem, PoolLocation)> {
        let item = self
            .items()
            .await?
            .into_iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| PoolError::NotFound(format!("item {id}")))?;
        let location = self
            .ctx
            .resolver
            .resolve(&item)
            .await
            .ok_or_else(|| PoolError::NotFound(format!("content for item {id}")))?;
        Ok((item, location))
    }

    async fn summarize(&self, item: &CatalogItem, location: &PoolLocation) -> Result<PoolSummary> {
        let pool = location.pool();
        Ok(PoolSummary {
            item_id: item.id.clone(),
            title: item.title.clone(),
            pool_dir: location.pool_dir.clone(),
            members: pool.members().await?.len(),
            locked: pool.side_files().is_locked().await,
            last_rotated: self.ctx.rotation_state.get(&item.id).await.last_rotated,
        })
    }

    /// Every item whose pool directory exists.
    pub async fn list_pools(&self) -> Result<Vec<PoolSummary>> {
        let mut pools = Vec::new();
        for item in self.items().await? {
            let Some(location) = self.ctx.resolver.resolve(&item).await else {
                continue;
            };
            if !location.pool().exists().await {
                continue;
            }
            pools.push(self.summarize(&item, &location).await?);
        }
        Ok(pools)
    }

    pub async fn pool_details(&self, id: &ItemId) -> Result<PoolDetails> {
        let (item, location) = self.locate(id).await?;
        let pool = location.pool();
        let side_files = pool.side_files();
        let languages = side_files.languages().await;
        let fingerprints = side_files.fingerprints().await;
        let order = side_files.order().await;

        let members = ordered_members(&pool)
            .await?
            .into_iter()
            .map(|member| MemberDetails {
                language: languages.get(&member.name).map(str::to_string),
                fingerprint: fingerprints
                    .get(&member.name)
                    .map(|fp| format!("{:016x}", fp.bits())),
                name: member.name,
                size: member.size,
                is_snapshot: member.is_snapshot,
            })
            .collect();

        Ok(PoolDetails {
            summary: self.summarize(&item, &location).await?,
            members,
            custom_order: !order.is_empty(),
            cursor: self.ctx.rotation_state.get(id).await.cursor,
        })
    }

    /// Store `bytes` as a new member. Near-duplicates of existing members
    /// are refused.
    pub async fn add_member(
        &self,
        id: &ItemId,
        bytes: &[u8],
        language: Option<&str>,
    ) -> Result<String> {
        let (_, location) = self.locate(id).await?;
        let pool = location.pool();
        let probed = probe::probe(bytes)?;

        let side_files = pool.side_files();
        let mut fingerprints = side_files.fingerprints().await;
        let fingerprint = Fingerprint::from_bytes(bytes);
        if let Some(existing) =
            find_near_duplicate(fingerprint, &fingerprints, self.ctx.config.duplicate_threshold)
        {
            return Err(PoolError::InvalidMedia(format!("near-duplicate of {existing}")));
        }

        pool.ensure_dir().await?;
        let name = MemberNameAllocator::new(pool.dir())
            .next(Utc::now().timestamp_millis(), probed.extension());
        write_bytes_atomic(&pool.member_path(&name), bytes).await?;

        fingerprints.insert(name.clone(), fingerprint);
        side_files.save_fingerprints(&fingerprints).await?;
        let mut languages = side_files.languages().await;
        languages.insert(name.clone(), language);
        side_files.save_languages(&languages).await?;

        info!(item = %id, member = %name, "member added manually");
        Ok(name)
    }

    pub async fn remove_member(&self, id: &ItemId, name: &str) -> Result<()> {
        let (_, location) = self.locate(id).await?;
        let pool = location.pool();
        let member = self.member_named(&location, name).await?;
        tokio::fs::remove_file(&member).await?;

        let side_files = pool.side_files();
        let mut languages = side_files.languages().await;
        if languages.remove(name) {
            side_files.save_languages(&languages).await?;
        }
        let mut fingerprints = side_files.fingerprints().await;
        if fingerprints.remove(name) {
            side_files.save_fingerprints(&fingerprints).await?;
        }
        let mut order = side_files.order().await;
        if order.remove(name) {
            side_files.save_order(&order).await?;
        }

        info!(item = %id, member = %name, "member removed manually");
        Ok(())
    }

    /// Save a custom rotation order. Every name must be a current member.
    pub async fn reorder(&self, id: &ItemId, names: Vec<String>) -> Result<()> {
        let (_, location) = self.locate(id).await?;
        for name in &names {
            self.member_named(&location, name).await?;
        }
        let order = PoolOrder::new(names);
        location.pool().side_files().save_order(&order).await?;
        info!(item = %id, members = order.names().len(), "custom order saved");
        Ok(())
    }

    /// Promote now, ignoring the cooldown. With `member` the named member is
    /// promoted and the sequential cursor moves past it; otherwise the
    /// configured policy picks.
    pub async fn force_promote(&self, id: &ItemId, member: Option<&str>) -> Result<Promotion> {
        let (item, location) = self.locate(id).await?;
        let ordered = ordered_members(&location.pool()).await?;
        let state = self.ctx.rotation_state.get(id).await;

        let selection = match member {
            Some(name) => {
                let index = ordered
                    .iter()
                    .position(|m| m.name == name)
                    .ok_or_else(|| PoolError::NotFound(format!("member {name}")))?;
                Selection {
                    member: ordered[index].clone(),
                    index,
                    next_cursor: Some(index as u64 + 1),
                }
            }
            None => RotationSelector::new(self.ctx.config.rotation_policy)
                .select(&ordered, &state)
                .ok_or_else(|| PoolError::NotFound(format!("members for item {id}")))?,
        };

        promote_and_record(&self.ctx, &item, &location, &selection, &state, Utc::now()).await
    }

    /// Delete every pool directory and the rotation state.
    pub async fn purge_all(&self) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();
        for item in self.items().await? {
            let Some(location) = self.ctx.resolver.resolve(&item).await else {
                continue;
            };
            match tokio::fs::remove_dir_all(&location.pool_dir).await {
                Ok(()) => {
                    report.pools_removed += 1;
                    info!(item = %item.id, pool = ?location.pool_dir, "pool purged");
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.ctx.rotation_state.clear().await?;
        report.state_cleared = true;
        Ok(report)
    }

    async fn member_named(&self, location: &PoolLocation, name: &str) -> Result<PathBuf> {
        if name.contains(['/', '\\']) || !is_member_name(name) {
            return Err(PoolError::InvalidMedia(format!("not a pool member name: {name}")));
        }
        let path = location.pool().member_path(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PoolError::NotFound(format!("member {name}")));
        }
        Ok(path)
    }
}
