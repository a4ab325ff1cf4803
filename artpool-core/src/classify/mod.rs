//! Candidate admission: kind, orientation, resolution and language rules.
//!
//! `admit` is pure. It decides which candidates a top-up pass will try to
//! download, in order, before any network call is made.

pub mod language;

use std::collections::HashSet;

use artpool_model::{Candidate, FallbackLanguage, ImageDimensions, ImageKind, PoolConfig};

pub use language::{detect_original_language, language_from_script};

/// Why a candidate did not make the admission list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not the wanted kind, and its provider offered the wanted kind.
    WrongKind,
    /// Declared wider than tall.
    Landscape,
    /// Declared below the configured minimum resolution.
    BelowMinimum,
    /// Same URL as an earlier candidate.
    DuplicateUrl,
    /// Neither the preferred nor an accepted fallback language.
    LanguageMismatch,
    /// Preferred language, but the pool already holds its quota.
    PreferredQuotaReached,
    /// Passed every rule but the pool has no slot left.
    OverCapacity,
}

/// Inputs for one admission decision.
#[derive(Debug, Clone)]
pub struct AdmissionRequest<'a> {
    pub config: &'a PoolConfig,
    /// Preferred-language members already in the pool.
    pub existing_preferred: usize,
    /// Heuristically detected original language of the item.
    pub original_language: Option<&'a str>,
    /// Pool slots still to fill.
    pub slots: usize,
}

impl AdmissionRequest<'_> {
    fn fallback_language(&self) -> Option<&str> {
        match &self.config.language.fallback {
            FallbackLanguage::Static(code) => Some(code.as_str()),
            FallbackLanguage::Original => self.original_language,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Admission {
    pub admitted: Vec<Candidate>,
    pub rejected: Vec<(Candidate, Rejection)>,
}

impl Admission {
    pub fn rejected_for(&self, reason: Rejection) -> usize {
        self.rejected.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// Dimension rules shared with the post-download header probe.
pub fn dimension_rejection(
    width: Option<u32>,
    height: Option<u32>,
    config: &PoolConfig,
) -> Option<Rejection> {
    let min = config.quality;
    if let (Some(w), Some(h)) = (width, height)
        && let Ok(dims) = ImageDimensions::try_from((w, h))
    {
        if dims.is_landscape() {
            return Some(Rejection::Landscape);
        }
        return (!dims.meets_minimum(min.min_width, min.min_height))
            .then_some(Rejection::BelowMinimum);
    }
    // One side missing or zero.
    let too_narrow = width.is_some_and(|w| min.min_width > 0 && w < min.min_width);
    let too_short = height.is_some_and(|h| min.min_height > 0 && h < min.min_height);
    (too_narrow || too_short).then_some(Rejection::BelowMinimum)
}

/// Apply kind rules per provider: keep the wanted kind when the provider has
/// any, otherwise keep the wanted kind's fallback. Wanted kind sorts first.
fn filter_kinds(
    candidates: Vec<Candidate>,
    wanted: ImageKind,
    rejected: &mut Vec<(Candidate, Rejection)>,
) -> Vec<Candidate> {
    let providers_with_wanted: HashSet<String> = candidates
        .iter()
        .filter(|c| c.kind == wanted)
        .map(|c| c.provider.clone())
        .collect();

    let mut kept = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let accepted_kind = if providers_with_wanted.contains(&candidate.provider) {
            wanted
        } else {
            wanted.fallback()
        };
        if candidate.kind == accepted_kind {
            kept.push(candidate);
        } else {
            rejected.push((candidate, Rejection::WrongKind));
        }
    }
    // Stable: provider preference order survives inside each kind.
    kept.sort_by_key(|c| c.kind != wanted);
    kept
}

/// Build the ordered admission list for one top-up pass.
pub fn admit(candidates: Vec<Candidate>, request: &AdmissionRequest<'_>) -> Admission {
    let config = request.config;
    let mut rejected = Vec::new();

    let mut seen_urls = HashSet::new();
    let eligible: Vec<Candidate> =
        filter_kinds(candidates, config.artwork_kind, &mut rejected)
            .into_iter()
            .filter_map(|candidate| {
                if let Some(reason) =
                    dimension_rejection(candidate.width, candidate.height, config)
                {
                    rejected.push((candidate, reason));
                    return None;
                }
                if !seen_urls.insert(candidate.url.clone()) {
                    rejected.push((candidate, Rejection::DuplicateUrl));
                    return None;
                }
                Some(candidate)
            })
            .collect();

    let ordered = if config.language.enabled {
        order_by_language(eligible, request, &mut rejected)
    } else {
        eligible
    };

    let mut admitted = ordered;
    if admitted.len() > request.slots {
        for candidate in admitted.split_off(request.slots) {
            rejected.push((candidate, Rejection::OverCapacity));
        }
    }

    Admission { admitted, rejected }
}

fn order_by_language(
    eligible: Vec<Candidate>,
    request: &AdmissionRequest<'_>,
    rejected: &mut Vec<(Candidate, Rejection)>,
) -> Vec<Candidate> {
    let language = &request.config.language;
    let preferred = language.preferred.trim();
    let fallback = request.fallback_language();
    let quota = language.max_preferred;

    let mut preferred_admitted = Vec::new();
    let mut fallback_admitted = Vec::new();

    for candidate in eligible {
        let tag = candidate.language_tag().map(str::to_string);
        match tag.as_deref() {
            Some(tag) if tag.eq_ignore_ascii_case(preferred) => {
                if request.existing_preferred + preferred_admitted.len() < quota {
                    preferred_admitted.push(candidate);
                } else {
                    rejected.push((candidate, Rejection::PreferredQuotaReached));
                }
            }
            Some(tag) if fallback.is_some_and(|f| tag.eq_ignore_ascii_case(f)) => {
                fallback_admitted.push(candidate);
            }
            None if language.include_unknown => fallback_admitted.push(candidate),
            _ => rejected.push((candidate, Rejection::LanguageMismatch)),
        }
    }

    preferred_admitted.extend(fallback_admitted);
    preferred_admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use artpool_model::{LanguageConfig, QualityConfig};

    fn poster(url: &str) -> Candidate {
        Candidate::new("TheMovieDb", url, ImageKind::Primary)
    }

    fn language_config(preferred: &str, max: usize) -> PoolConfig {
        PoolConfig {
            pool_size: 5,
            language: LanguageConfig {
                enabled: true,
                preferred: preferred.to_string(),
                max_preferred: max,
                fallback: FallbackLanguage::Original,
                include_unknown: true,
            },
            ..PoolConfig::default()
        }
    }

    #[test]
    fn french_quota_then_unlabeled_fill_remaining_slots() {
        let config = language_config("fr", 2);
        let mut candidates = Vec::new();
        for i in 0..4 {
            candidates.push(poster(&format!("https://img/fr{i}.jpg")).with_language("fr"));
        }
        for i in 0..6 {
            candidates.push(poster(&format!("https://img/none{i}.jpg")));
        }

        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: Some("en"),
            slots: 5,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://img/fr0.jpg",
                "https://img/fr1.jpg",
                "https://img/none0.jpg",
                "https://img/none1.jpg",
                "https://img/none2.jpg",
            ]
        );
        assert_eq!(admission.rejected.len(), 5);
        assert_eq!(admission.rejected_for(Rejection::PreferredQuotaReached), 2);
        assert_eq!(admission.rejected_for(Rejection::OverCapacity), 3);
    }

    #[test]
    fn existing_preferred_members_count_against_the_quota() {
        let config = language_config("fr", 2);
        let candidates = vec![
            poster("https://img/a.jpg").with_language("FR"),
            poster("https://img/b.jpg").with_language("ja"),
            poster("https://img/c.jpg").with_language("de"),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 2,
            original_language: Some("ja"),
            slots: 5,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/b.jpg"]);
        assert_eq!(admission.rejected_for(Rejection::PreferredQuotaReached), 1);
        assert_eq!(admission.rejected_for(Rejection::LanguageMismatch), 1);
    }

    #[test]
    fn preferred_matching_the_fallback_still_obeys_the_quota() {
        // English preferred, English original: the cap wins over the
        // fallback bucket.
        let config = language_config("en", 1);
        let candidates = vec![
            poster("https://img/en0.jpg").with_language("en"),
            poster("https://img/en1.jpg").with_language("en"),
            poster("https://img/none.jpg"),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: Some("en"),
            slots: 5,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/en0.jpg", "https://img/none.jpg"]);
        assert_eq!(admission.rejected_for(Rejection::PreferredQuotaReached), 1);
    }

    #[test]
    fn static_fallback_and_unknown_exclusion() {
        let mut config = language_config("en", 1);
        config.language.fallback = FallbackLanguage::Static("de".into());
        config.language.include_unknown = false;

        let candidates = vec![
            poster("https://img/a.jpg"),
            poster("https://img/b.jpg").with_language("de"),
            poster("https://img/c.jpg").with_language("en"),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: Some("ja"),
            slots: 5,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/c.jpg", "https://img/b.jpg"]);
    }

    #[test]
    fn rejects_landscape_and_small_but_passes_unknown_dimensions() {
        let config = PoolConfig {
            quality: QualityConfig {
                min_width: 500,
                min_height: 750,
            },
            ..PoolConfig::default()
        };
        let candidates = vec![
            poster("https://img/wide.jpg").with_dimensions(1920, 1080),
            poster("https://img/small.jpg").with_dimensions(300, 450),
            poster("https://img/good.jpg").with_dimensions(1000, 1500),
            poster("https://img/unknown.jpg"),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: None,
            slots: 10,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/good.jpg", "https://img/unknown.jpg"]);
        assert_eq!(admission.rejected_for(Rejection::Landscape), 1);
        assert_eq!(admission.rejected_for(Rejection::BelowMinimum), 1);
    }

    #[test]
    fn one_declared_side_is_still_checked_and_square_is_portrait() {
        let config = PoolConfig {
            quality: QualityConfig {
                min_width: 500,
                min_height: 750,
            },
            ..PoolConfig::default()
        };
        assert_eq!(
            dimension_rejection(Some(400), None, &config),
            Some(Rejection::BelowMinimum)
        );
        assert_eq!(dimension_rejection(None, Some(900), &config), None);
        assert_eq!(dimension_rejection(Some(800), Some(800), &config), None);
        assert_eq!(
            dimension_rejection(Some(801), Some(800), &config),
            Some(Rejection::Landscape)
        );
    }

    #[test]
    fn fallback_kind_only_for_providers_without_wanted_kind() {
        let config = PoolConfig::default();
        let candidates = vec![
            Candidate::new("Fanart", "https://f/thumb.jpg", ImageKind::Thumb),
            Candidate::new("TheMovieDb", "https://t/thumb.jpg", ImageKind::Thumb),
            Candidate::new("TheMovieDb", "https://t/poster.jpg", ImageKind::Primary),
            Candidate::new("Fanart", "https://f/backdrop.jpg", ImageKind::Backdrop),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: None,
            slots: 10,
        };
        let admission = admit(candidates, &request);

        let urls: Vec<_> = admission.admitted.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://t/poster.jpg", "https://f/thumb.jpg"]);
        assert_eq!(admission.rejected_for(Rejection::WrongKind), 2);
    }

    #[test]
    fn duplicate_urls_are_admitted_once() {
        let config = PoolConfig::default();
        let candidates = vec![
            poster("https://img/a.jpg"),
            Candidate::new("Other", "https://img/a.jpg", ImageKind::Primary),
        ];
        let request = AdmissionRequest {
            config: &config,
            existing_preferred: 0,
            original_language: None,
            slots: 10,
        };
        let admission = admit(candidates, &request);
        assert_eq!(admission.admitted.len(), 1);
        assert_eq!(admission.rejected_for(Rejection::DuplicateUrl), 1);
    }
}
