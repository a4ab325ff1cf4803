//! Choosing and promoting the next pool member.

use std::path::Path;
use std::time::{Duration, SystemTime};

use artpool_model::RotationPolicy;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::error::{PoolError, Result};
use crate::pool::PoolMember;
use crate::state::{PoolOrder, RotationState};

/// Where an item stands before a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// No usable members. Only top-up can leave this state.
    Empty,
    /// Top-up suppressed by the cooldown; promotion still allowed.
    Cooling,
    /// Top-up and promotion both allowed.
    Ready,
}

impl PoolPhase {
    pub fn of(
        member_count: usize,
        state: &RotationState,
        min_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        if member_count == 0 {
            return PoolPhase::Empty;
        }
        let Some(last) = state.last_rotated else {
            return PoolPhase::Ready;
        };
        let elapsed = now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < min_interval {
            PoolPhase::Cooling
        } else {
            PoolPhase::Ready
        }
    }

    pub fn allows_top_up(self) -> bool {
        !matches!(self, PoolPhase::Cooling)
    }
}

/// Members in rotation order: the custom order first when one is saved,
/// then everything else with the snapshot last and names ascending.
pub fn order_members(mut members: Vec<PoolMember>, custom: &PoolOrder) -> Vec<PoolMember> {
    members.sort_by(|a, b| {
        a.is_snapshot
            .cmp(&b.is_snapshot)
            .then_with(|| a.name.cmp(&b.name))
    });
    if custom.is_empty() {
        return members;
    }
    // Stable: unlisted members keep the default order behind listed ones.
    members.sort_by_key(|member| custom.position(&member.name).unwrap_or(usize::MAX));
    members
}

/// A member picked for promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub member: PoolMember,
    pub index: usize,
    /// Cursor to persist after a successful promotion. `None` leaves the
    /// stored cursor untouched.
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RotationSelector {
    policy: RotationPolicy,
}

impl RotationSelector {
    pub fn new(policy: RotationPolicy) -> Self {
        Self { policy }
    }

    pub fn select(&self, ordered: &[PoolMember], state: &RotationState) -> Option<Selection> {
        match self.policy {
            RotationPolicy::Sequential => select_sequential(ordered, state.cursor),
            RotationPolicy::Random => select_random(ordered, &mut rand::rng()),
        }
    }
}

/// Cursor walk over `ordered`. The first selection skips index 0 when there
/// is more than one member.
pub fn select_sequential(ordered: &[PoolMember], cursor: Option<u64>) -> Option<Selection> {
    if ordered.is_empty() {
        return None;
    }
    let len = ordered.len() as u64;
    let (index, next) = match cursor {
        None if len > 1 => (1, 2),
        None => (0, 1),
        Some(cursor) => (cursor % len, cursor.saturating_add(1)),
    };
    let index = usize::try_from(index).ok()?;
    Some(Selection {
        member: ordered.get(index)?.clone(),
        index,
        next_cursor: Some(next),
    })
}

/// Uniform pick among non-snapshot members; the snapshot only when nothing
/// else exists.
pub fn select_random<R: Rng + ?Sized>(ordered: &[PoolMember], rng: &mut R) -> Option<Selection> {
    let fresh: Vec<(usize, &PoolMember)> = ordered
        .iter()
        .enumerate()
        .filter(|(_, member)| !member.is_snapshot)
        .collect();
    let (index, member) = if fresh.is_empty() {
        let all: Vec<(usize, &PoolMember)> = ordered.iter().enumerate().collect();
        *all.choose(rng)?
    } else {
        *fresh.choose(rng)?
    };
    Some(Selection {
        member: member.clone(),
        index,
        next_cursor: None,
    })
}

/// Copy `member` over `destination` and refresh its modification time.
///
/// The pool member is only read. A read-only destination is made writable
/// first. Any error means the artwork may not have changed.
pub async fn promote(member: &PoolMember, destination: &Path) -> Result<()> {
    if let Ok(meta) = tokio::fs::metadata(destination).await {
        let mut permissions = meta.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            tokio::fs::set_permissions(destination, permissions).await?;
            debug!(destination = ?destination, "cleared read-only flag before promotion");
        }
    }

    let copied = tokio::fs::copy(&member.path, destination).await?;
    if copied != member.size {
        return Err(PoolError::Internal(format!(
            "short copy promoting {}: {} of {} bytes",
            member.name, copied, member.size
        )));
    }

    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new().write(true).open(&destination)?;
        file.set_modified(SystemTime::now())
    })
    .await
    .map_err(|e| PoolError::Internal(format!("touch task failed: {e}")))??;
    Ok(())
}
