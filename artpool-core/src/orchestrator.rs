//! Runs every eligible item once and reports what happened.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use artpool_model::{CatalogItem, ItemOutcome, ItemReport, RunScope, RunSummary, SkipReason};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::context::RunContext;
use crate::error::{PoolError, Result};
use crate::pass::ItemPass;

/// Marker touched inside a library root when its mtime cannot be set
/// directly. Created and removed again in the same call.
pub const NUDGE_MARKER: &str = ".artpool-nudge";

#[derive(Debug, Clone)]
pub struct Orchestrator {
    ctx: RunContext,
}

impl Orchestrator {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Process every eligible item sequentially.
    ///
    /// Only a failure to enumerate items is returned as an error; per-item
    /// failures are logged and counted in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let config = &self.ctx.config;
        let items = self
            .ctx
            .catalog
            .eligible_items(&config.item_kinds)
            .await
            .map_err(PoolError::from)?;
        info!(
            "Starting rotation run: {} items, {} providers, policy={}",
            items.len(),
            self.ctx.providers.len(),
            config.rotation_policy
        );

        let pass = ItemPass::new(&self.ctx);
        let mut summary = RunSummary::default();
        let mut changed_roots = BTreeSet::new();

        for item in &items {
            if self.ctx.cancel.is_cancelled() {
                info!("Cancellation requested; stopping before item {}", item.id);
                summary.cancelled = true;
                break;
            }

            if !in_scope(item, &config.scope) {
                debug!(item = %item.id, "out of scope");
                summary.record(report(item, ItemOutcome::Skipped {
                    reason: SkipReason::OutOfScope,
                    added: 0,
                }));
                continue;
            }

            let span = info_span!("item", id = %item.id, title = %item.title);
            let outcome = match pass.run(item).instrument(span).await {
                Ok(result) => {
                    if let Some(root) = result.changed_root
                        && matches!(result.outcome, ItemOutcome::Rotated { .. })
                    {
                        changed_roots.insert(root);
                    }
                    summary.notify_failures += usize::from(result.notify_failed);
                    result.outcome
                }
                Err(err) => {
                    error!(item = %item.id, title = %item.title, error = %err, "item failed");
                    ItemOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            summary.record(report(item, outcome));
        }

        for root in &changed_roots {
            match nudge(root).await {
                Ok(()) => summary.nudged_roots += 1,
                Err(err) => warn!(root = ?root, error = %err, "could not nudge library root"),
            }
        }
        if summary.notify_failures > 0 {
            warn!("{} catalog notification(s) failed", summary.notify_failures);
        }

        info!("Rotation run finished: {}", summary);
        Ok(summary)
    }
}

fn report(item: &CatalogItem, outcome: ItemOutcome) -> ItemReport {
    ItemReport {
        id: item.id.clone(),
        title: item.title.clone(),
        outcome,
    }
}

pub fn in_scope(item: &CatalogItem, scope: &RunScope) -> bool {
    match scope {
        RunScope::All => true,
        RunScope::Roots(roots) => roots.iter().any(|root| {
            item.content_path.starts_with(root)
                || item.library_root.as_deref() == Some(root.as_path())
        }),
        RunScope::Groups(groups) => item.group.as_deref().is_some_and(|group| {
            groups.iter().any(|wanted| wanted.eq_ignore_ascii_case(group))
        }),
    }
}

/// Touch a directory so file watchers see a change under it.
pub async fn nudge(root: &Path) -> Result<()> {
    let root: PathBuf = root.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let touched = std::fs::File::open(&root).and_then(|dir| dir.set_modified(SystemTime::now()));
        if touched.is_ok() {
            return Ok(());
        }
        let marker = root.join(NUDGE_MARKER);
        std::fs::write(&marker, b"")?;
        std::fs::remove_file(&marker)
    })
    .await
    .map_err(|e| PoolError::Internal(format!("nudge task failed: {e}")))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use artpool_model::{ItemId, ItemKind};

    fn item(path: &str, group: Option<&str>) -> CatalogItem {
        let mut item = CatalogItem::new(ItemId::new("x"), ItemKind::Movie, "X", PathBuf::from(path));
        item.group = group.map(str::to_string);
        item.library_root = Some(PathBuf::from("/media/movies"));
        item
    }

    #[test]
    fn scope_by_root_and_group() {
        let movie = item("/media/movies/Heat (1995)/Heat.mkv", Some("Movies"));

        assert!(in_scope(&movie, &RunScope::All));
        assert!(in_scope(&movie, &RunScope::Roots(vec![PathBuf::from("/media/movies")])));
        assert!(!in_scope(&movie, &RunScope::Roots(vec![PathBuf::from("/media/tv")])));
        assert!(in_scope(&movie, &RunScope::Groups(vec!["movies".into()])));
        assert!(!in_scope(&movie, &RunScope::Groups(vec!["Anime".into()])));
        assert!(!in_scope(&item("/a/b.mkv", None), &RunScope::Groups(vec!["Movies".into()])));
    }

    #[tokio::test]
    async fn nudge_touches_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        nudge(dir.path()).await.unwrap();
        assert!(!dir.path().join(NUDGE_MARKER).exists());
    }
}
