//! Pool replenishment from image providers.

use std::path::{Path, PathBuf};

use artpool_model::{Candidate, CatalogItem, FallbackLanguage, ImageKind};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::catalog::CollaboratorError;
use crate::classify::{self, AdmissionRequest, detect_original_language};
use crate::context::RunContext;
use crate::error::Result;
use crate::fetch::fetch_with_retry;
use crate::fingerprint::{Fingerprint, find_near_duplicate};
use crate::pool::member::snapshot_name;
use crate::pool::{ARTWORK_EXTENSIONS, MemberNameAllocator, Pool, PoolLocation, PoolMember};
use crate::probe::{self, ProbedImage};
use crate::providers::{ImageProvider, ProviderError};
use crate::state::{FingerprintIndex, LanguageIndex, write_bytes_atomic};

/// What one top-up pass did to a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopUpReport {
    /// New member paths in admission order.
    pub added: Vec<PathBuf>,
    pub admitted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// The pool was seeded from the item's existing artwork.
    pub snapshot: Option<PathBuf>,
}

impl TopUpReport {
    pub fn added_count(&self) -> usize {
        self.added.len() + usize::from(self.snapshot.is_some())
    }
}

/// Fetches, filters and stores new pool members for one item at a time.
#[derive(Debug, Clone, Copy)]
pub struct TopUpEngine<'a> {
    ctx: &'a RunContext,
}

struct Indices {
    languages: LanguageIndex,
    fingerprints: FingerprintIndex,
    dirty: bool,
}

impl<'a> TopUpEngine<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Add up to `needed` members to the item's pool.
    ///
    /// Provider and network failures only reduce what gets added; the
    /// returned error is reserved for the pool directory itself being
    /// unusable.
    pub async fn top_up(
        &self,
        item: &CatalogItem,
        location: &PoolLocation,
        needed: usize,
    ) -> Result<TopUpReport> {
        let pool = location.pool();
        pool.ensure_dir().await?;

        let members = pool.members().await?;
        let mut indices = self.load_indices(&pool, &members).await;
        let mut report = TopUpReport::default();

        if needed > 0 {
            let candidates = self.gather_candidates(item).await;
            let existing_preferred = indices.languages.count_language(
                self.ctx.config.language.preferred.trim(),
                members.iter().map(|m| m.name.as_str()),
            );
            let original_language = self.original_language(item);
            let admission = classify::admit(
                candidates,
                &AdmissionRequest {
                    config: &self.ctx.config,
                    existing_preferred,
                    original_language,
                    slots: needed,
                },
            );
            report.admitted = admission.admitted.len();
            report.rejected = admission.rejected.len();
            debug!(
                item = %item.id,
                admitted = report.admitted,
                rejected = report.rejected,
                "[topup] admission decided"
            );

            let outcome = self
                .download_admitted(&pool, admission.admitted, needed, &mut indices, &mut report)
                .await;
            self.save_indices(&pool, &indices).await?;
            outcome?;
        } else {
            self.save_indices(&pool, &indices).await?;
        }

        if members.is_empty() && report.added.is_empty() {
            report.snapshot = self.seed_snapshot(item, location).await?;
        }

        if !report.added.is_empty() {
            info!(
                item = %item.id,
                added = report.added.len(),
                duplicates = report.duplicates,
                failed = report.failed,
                "[topup] pool replenished"
            );
        }
        Ok(report)
    }

    async fn load_indices(&self, pool: &Pool, members: &[PoolMember]) -> Indices {
        let side_files = pool.side_files();
        let mut languages = side_files.languages().await;
        let mut fingerprints = side_files.fingerprints().await;

        let names = members.iter().map(|m| m.name.as_str());
        let mut dirty = languages.retain_members(names.clone());
        dirty |= fingerprints.retain_members(names);

        for member in members {
            if fingerprints.contains(&member.name) {
                continue;
            }
            match Fingerprint::from_file(&member.path).await {
                Ok(fp) => {
                    debug!(member = %member.name, fingerprint = ?fp, "[topup] backfilled fingerprint");
                    fingerprints.insert(member.name.clone(), fp);
                    dirty = true;
                }
                Err(err) => warn!(member = %member.name, error = %err, "[topup] could not fingerprint member"),
            }
        }

        Indices {
            languages,
            fingerprints,
            dirty,
        }
    }

    async fn save_indices(&self, pool: &Pool, indices: &Indices) -> Result<()> {
        if !indices.dirty {
            return Ok(());
        }
        let side_files = pool.side_files();
        side_files.save_languages(&indices.languages).await?;
        side_files.save_fingerprints(&indices.fingerprints).await?;
        Ok(())
    }

    fn original_language(&self, item: &CatalogItem) -> Option<&'static str> {
        let language = &self.ctx.config.language;
        (language.enabled && language.fallback == FallbackLanguage::Original)
            .then(|| detect_original_language(item))
    }

    /// Candidates from every supporting provider, in provider order. A
    /// provider with nothing of the wanted kind is asked for its fallback.
    async fn gather_candidates(&self, item: &CatalogItem) -> Vec<Candidate> {
        let wanted = self.ctx.config.artwork_kind;
        let mut all = Vec::new();
        for provider in self.ctx.providers.image_providers() {
            if !provider.supports(item) {
                debug!(item = %item.id, provider = provider.name(), "[topup] provider does not support item");
                continue;
            }
            let mut found = self.query(provider.as_ref(), item, wanted).await;
            if found.is_empty() {
                found = self.query(provider.as_ref(), item, wanted.fallback()).await;
            }
            debug!(item = %item.id, provider = provider.name(), count = found.len(), "[topup] candidates");
            all.extend(found);
        }
        all
    }

    async fn query(
        &self,
        provider: &dyn ImageProvider,
        item: &CatalogItem,
        kind: ImageKind,
    ) -> Vec<Candidate> {
        match provider.candidates(item, kind).await {
            Ok(candidates) => candidates,
            Err(ProviderError::Unsupported(reason)) => {
                debug!(item = %item.id, provider = provider.name(), %reason, "[topup] provider skipped");
                Vec::new()
            }
            Err(err) => {
                warn!(item = %item.id, provider = provider.name(), %kind, error = %err, "[topup] provider query failed");
                Vec::new()
            }
        }
    }

    async fn download_admitted(
        &self,
        pool: &Pool,
        admitted: Vec<Candidate>,
        needed: usize,
        indices: &mut Indices,
        report: &mut TopUpReport,
    ) -> Result<()> {
        let config = &self.ctx.config;
        let fetcher = self.ctx.fetcher.as_ref();
        let cancel = &self.ctx.cancel;
        let concurrency = config.download_concurrency.max(1);

        let mut downloads = stream::iter(admitted.into_iter().map(move |candidate| async move {
            let result = fetch_with_retry(fetcher, &candidate.url, &config.retry, cancel).await;
            (candidate, result)
        }))
        .buffered(concurrency);

        let mut names = MemberNameAllocator::new(pool.dir());
        while let Some((candidate, result)) = downloads.next().await {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(url = %candidate.url, provider = %candidate.provider, error = %err, "[topup] download failed");
                    report.failed += 1;
                    continue;
                }
            };

            let Some(probed) = self.check_payload(&candidate, &bytes) else {
                report.rejected += 1;
                continue;
            };

            let fingerprint = Fingerprint::from_bytes(&bytes);
            if let Some(existing) =
                find_near_duplicate(fingerprint, &indices.fingerprints, config.duplicate_threshold)
            {
                debug!(url = %candidate.url, duplicate_of = existing, "[topup] near-duplicate skipped");
                report.duplicates += 1;
                continue;
            }

            let name = names.next(Utc::now().timestamp_millis(), probed.extension());
            let path = pool.member_path(&name);
            write_bytes_atomic(&path, &bytes).await?;

            indices.languages.insert(name.clone(), candidate.language_tag());
            indices.fingerprints.insert(name, fingerprint);
            indices.dirty = true;
            report.added.push(path);
            if report.added.len() >= needed {
                break;
            }
        }
        Ok(())
    }

    /// Header checks on a downloaded payload: it must be an image, and when
    /// the provider did not declare dimensions the probed ones must pass the
    /// orientation and resolution rules.
    fn check_payload(&self, candidate: &Candidate, bytes: &[u8]) -> Option<ProbedImage> {
        let probed = match probe::probe(bytes) {
            Ok(probed) => probed,
            Err(err) => {
                warn!(url = %candidate.url, error = %err, "[topup] payload is not an image");
                return None;
            }
        };
        if candidate.dimensions().is_none()
            && let Some(dims) = probed.dimensions
            && let Some(reason) = classify::dimension_rejection(
                Some(dims.width_u32()),
                Some(dims.height_u32()),
                &self.ctx.config,
            )
        {
            debug!(url = %candidate.url, ?reason, ?dims, "[topup] rejected after header probe");
            return None;
        }
        Some(probed)
    }

    /// Copy the item's existing artwork into an empty pool as the snapshot
    /// member. No-op when the pool already has members or no artwork exists.
    pub async fn seed_snapshot(
        &self,
        item: &CatalogItem,
        location: &PoolLocation,
    ) -> Result<Option<PathBuf>> {
        let pool = location.pool();
        if !pool.members().await?.is_empty() {
            return Ok(None);
        }
        let Some(source) = self.existing_artwork(item, location).await else {
            debug!(item = %item.id, "[topup] no existing artwork to snapshot");
            return Ok(None);
        };

        let bytes = tokio::fs::read(&source).await?;
        let probed = match probe::probe(&bytes) {
            Ok(probed) => probed,
            Err(err) => {
                warn!(item = %item.id, source = ?source, error = %err, "[topup] existing artwork unreadable");
                return Ok(None);
            }
        };

        pool.ensure_dir().await?;
        let name = snapshot_name(probed.extension());
        let path = pool.member_path(&name);
        write_bytes_atomic(&path, &bytes).await?;

        let side_files = pool.side_files();
        let mut fingerprints = side_files.fingerprints().await;
        fingerprints.insert(name.clone(), Fingerprint::from_bytes(&bytes));
        side_files.save_fingerprints(&fingerprints).await?;
        let mut languages = side_files.languages().await;
        languages.insert(name, None);
        side_files.save_languages(&languages).await?;

        info!(item = %item.id, source = ?source, "[topup] seeded pool from existing artwork");
        Ok(Some(path))
    }

    async fn existing_artwork(&self, item: &CatalogItem, location: &PoolLocation) -> Option<PathBuf> {
        match self.ctx.catalog.current_artwork(item).await {
            Ok(Some(path)) if is_nonempty_file(&path).await => return Some(path),
            Ok(_) | Err(CollaboratorError::Unsupported) => {}
            Err(err) => warn!(item = %item.id, error = %err, "[topup] catalog artwork lookup failed"),
        }
        for ext in ARTWORK_EXTENSIONS {
            let path = location.artwork_path(ext);
            if is_nonempty_file(&path).await {
                return Some(path);
            }
        }
        None
    }
}

async fn is_nonempty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
