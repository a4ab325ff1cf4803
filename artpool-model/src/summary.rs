use std::fmt;

use crate::item::ItemId;

/// Why an item finished a pass without promoting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SkipReason {
    /// Content path did not resolve to an existing directory.
    ContentMissing,
    /// Item is outside the configured run scope.
    OutOfScope,
    /// No usable pool members, even after top-up and snapshot fallback.
    EmptyPool,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ContentMissing => write!(f, "content missing"),
            SkipReason::OutOfScope => write!(f, "out of scope"),
            SkipReason::EmptyPool => write!(f, "empty pool"),
        }
    }
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "status", rename_all = "snake_case")
)]
pub enum ItemOutcome {
    Rotated {
        member: String,
        added: usize,
        topped_up: bool,
    },
    Skipped {
        reason: SkipReason,
        added: usize,
    },
    Failed {
        error: String,
    },
}

impl ItemOutcome {
    pub fn added(&self) -> usize {
        match self {
            ItemOutcome::Rotated { added, .. }
            | ItemOutcome::Skipped { added, .. } => *added,
            ItemOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemReport {
    pub id: ItemId,
    pub title: String,
    pub outcome: ItemOutcome,
}

/// Aggregate of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub rotated: usize,
    pub skipped: usize,
    pub errored: usize,
    pub added: usize,
    /// Library roots touched so file watchers notice the change.
    pub nudged_roots: usize,
    /// Supported catalog notifications that failed after a promotion.
    pub notify_failures: usize,
    /// The run stopped early on a cancellation request.
    pub cancelled: bool,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn record(&mut self, report: ItemReport) {
        self.added += report.outcome.added();
        match &report.outcome {
            ItemOutcome::Rotated { .. } => self.rotated += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.errored += 1,
        }
        self.items.push(report);
    }

    pub fn processed(&self) -> usize {
        self.items.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} rotated={} skipped={} errored={} added={} nudged={}",
            self.processed(),
            self.rotated,
            self.skipped,
            self.errored,
            self.added,
            self.nudged_roots
        )?;
        if self.notify_failures > 0 {
            write!(f, " notify_failures={}", self.notify_failures)?;
        }
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
