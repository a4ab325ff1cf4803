//! One item's trip through resolve, top-up and rotation.

use std::path::{Path, PathBuf};

use artpool_model::{CatalogItem, ItemOutcome, SkipReason};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{ArtworkTarget, CollaboratorError};
use crate::context::RunContext;
use crate::error::Result;
use crate::pool::{ARTWORK_EXTENSIONS, Pool, PoolLocation, PoolMember};
use crate::rotation::{self, PoolPhase, RotationSelector, Selection, order_members};
use crate::state::RotationState;
use crate::topup::TopUpEngine;

/// What a finished pass hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResult {
    pub outcome: ItemOutcome,
    /// Library root to nudge because artwork under it changed.
    pub changed_root: Option<PathBuf>,
    /// A catalog notification that is supported failed.
    pub notify_failed: bool,
}

impl PassResult {
    fn skipped(reason: SkipReason, added: usize) -> Self {
        Self {
            outcome: ItemOutcome::Skipped { reason, added },
            changed_root: None,
            notify_failed: false,
        }
    }
}

/// Result of copying a selected member into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub member: String,
    pub destination: PathBuf,
    pub notify_failed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ItemPass<'a> {
    ctx: &'a RunContext,
}

impl<'a> ItemPass<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, item: &CatalogItem) -> Result<PassResult> {
        self.run_at(item, Utc::now()).await
    }

    pub async fn run_at(&self, item: &CatalogItem, now: DateTime<Utc>) -> Result<PassResult> {
        let config = &self.ctx.config;
        let Some(location) = self.ctx.resolver.resolve(item).await else {
            debug!(item = %item.id, "content path did not resolve; skipping");
            return Ok(PassResult::skipped(SkipReason::ContentMissing, 0));
        };
        let pool = location.pool();
        let side_files = pool.side_files();

        let mut locked = side_files.is_locked().await;
        if locked && !config.lock_after_fill {
            side_files.unlock().await?;
            info!(item = %item.id, "lock_after_fill disabled; pool unlocked");
            locked = false;
        }

        let state = self.ctx.rotation_state.get(&item.id).await;
        let members = pool.members().await?;
        let phase = PoolPhase::of(members.len(), &state, config.min_interval(), now);
        let needed = config.pool_size.saturating_sub(members.len());

        let mut added = 0;
        let mut topped_up = false;
        if locked {
            debug!(item = %item.id, "pool locked; top-up suppressed");
            if members.is_empty() {
                added += usize::from(
                    TopUpEngine::new(self.ctx)
                        .seed_snapshot(item, &location)
                        .await?
                        .is_some(),
                );
            }
        } else if !phase.allows_top_up() {
            debug!(item = %item.id, ?phase, "cooldown active; top-up suppressed");
        } else if needed > 0 {
            let report = TopUpEngine::new(self.ctx).top_up(item, &location, needed).await?;
            added = report.added_count();
            topped_up = true;
        }

        let members = pool.members().await?;
        if config.lock_after_fill && !locked && members.len() >= config.pool_size {
            side_files.lock().await?;
            info!(item = %item.id, members = members.len(), "pool full; locked");
        }

        if members.is_empty() {
            return Ok(PassResult::skipped(SkipReason::EmptyPool, added));
        }

        let ordered = order_members(members, &side_files.order().await);
        let selector = RotationSelector::new(config.rotation_policy);
        let Some(selection) = selector.select(&ordered, &state) else {
            return Ok(PassResult::skipped(SkipReason::EmptyPool, added));
        };

        let promotion = promote_and_record(self.ctx, item, &location, &selection, &state, now).await?;
        Ok(PassResult {
            outcome: ItemOutcome::Rotated {
                member: promotion.member,
                added,
                topped_up,
            },
            changed_root: self.ctx.catalog.library_root(item),
            notify_failed: promotion.notify_failed,
        })
    }
}

/// Promote `selection`, tell the catalog, then persist the new rotation
/// state. State is only written once the copy has succeeded.
pub async fn promote_and_record(
    ctx: &RunContext,
    item: &CatalogItem,
    location: &PoolLocation,
    selection: &Selection,
    previous: &RotationState,
    now: DateTime<Utc>,
) -> Result<Promotion> {
    let member = &selection.member;
    let destination = ctx
        .artwork_target
        .destination(ctx.catalog.as_ref(), item, location, member.extension())
        .await;

    rotation::promote(member, &destination).await?;
    info!(
        item = %item.id,
        member = %member.name,
        index = selection.index,
        destination = ?destination,
        "promoted pool member"
    );

    let mut notify_failed = false;
    match ctx.artwork_target {
        ArtworkTarget::Convention => remove_stale_artwork(location, &destination).await,
        ArtworkTarget::CatalogManaged => {
            notify_failed |= report_collaborator(
                item,
                "set_artwork",
                ctx.catalog.set_artwork(item, &destination).await,
            );
        }
    }
    notify_failed |= report_collaborator(
        item,
        "notify_artwork_changed",
        ctx.catalog.notify_artwork_changed(item).await,
    );

    let state = RotationState {
        last_rotated: Some(now),
        cursor: selection.next_cursor.or(previous.cursor),
    };
    ctx.rotation_state.update(&item.id, state).await?;

    Ok(Promotion {
        member: member.name.clone(),
        destination,
        notify_failed,
    })
}

/// `true` when the call failed for a reason other than being unsupported.
fn report_collaborator(
    item: &CatalogItem,
    operation: &str,
    result: std::result::Result<(), CollaboratorError>,
) -> bool {
    match result {
        Ok(()) => false,
        Err(CollaboratorError::Unsupported) => {
            debug!(item = %item.id, operation, "catalog operation unsupported");
            false
        }
        Err(err) => {
            warn!(item = %item.id, operation, error = %err, "catalog operation failed");
            true
        }
    }
}

/// Conventional artwork with the same stem but another extension would
/// shadow the promoted file.
async fn remove_stale_artwork(location: &PoolLocation, promoted: &Path) {
    for ext in ARTWORK_EXTENSIONS {
        let path = location.artwork_path(ext);
        if path == promoted {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = ?path, "removed stale artwork"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = ?path, error = %err, "could not remove stale artwork"),
        }
    }
}

/// Current members of `pool` in rotation order.
pub async fn ordered_members(pool: &Pool) -> Result<Vec<PoolMember>> {
    let members = pool.members().await?;
    Ok(order_members(members, &pool.side_files().order().await))
}
