use std::fmt;

use artpool_model::{Candidate, CatalogItem, ImageKind, ItemKind, TmdbConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ImageProvider, ProviderError};

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const TMDB_V3_BASE: &str = "https://api.themoviedb.org/3";

pub const PROVIDER_NAME: &str = "TheMovieDb";

#[derive(Debug, Deserialize, Default)]
struct ImagesResponse {
    #[serde(default)]
    posters: Vec<ImageEntry>,
    #[serde(default)]
    backdrops: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    file_path: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    iso_639_1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
}

#[derive(Serialize)]
struct ApiKeyQuery<'a> {
    api_key: &'a str,
}

#[derive(Serialize)]
struct MovieSearchQuery<'a> {
    api_key: &'a str,
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Serialize)]
struct TvSearchQuery<'a> {
    api_key: &'a str,
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_air_date_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// Poster and backdrop candidates from TMDB's `/images` endpoints.
pub struct TmdbImageProvider {
    http: reqwest::Client,
    api_key: String,
    language: Option<String>,
    api_base: String,
    image_base: String,
}

impl fmt::Debug for TmdbImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbImageProvider")
            .field("api_base", &self.api_base)
            .field("language", &self.language)
            .finish()
    }
}

impl TmdbImageProvider {
    /// `None` when no API key is configured.
    pub fn from_config(http: reqwest::Client, config: &TmdbConfig) -> Option<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())?;
        Some(Self {
            http,
            api_key: api_key.to_string(),
            language: config.language.clone(),
            api_base: TMDB_V3_BASE.to_string(),
            image_base: TMDB_IMAGE_BASE.to_string(),
        })
    }

    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        image_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.image_base = image_base.into();
        self
    }

    async fn get_tmdb_json<Q, T>(&self, url: &str, query: &Q) -> Result<T, ProviderError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(ProviderError::from);
        }

        #[derive(Debug, Deserialize)]
        struct TmdbErrorBody {
            #[serde(default)]
            status_message: Option<String>,
        }

        let message = response
            .json::<TmdbErrorBody>()
            .await
            .ok()
            .and_then(|body| body.status_message)
            .unwrap_or_else(|| format!("TMDB request failed with status {}", status));

        match status.as_u16() {
            401 => Err(ProviderError::InvalidApiKey),
            404 => Err(ProviderError::NotFound),
            429 => Err(ProviderError::RateLimited),
            _ => Err(ProviderError::ApiError(message)),
        }
    }

    async fn resolve_id(&self, item: &CatalogItem) -> Result<u64, ProviderError> {
        if let Some(raw) = item.provider_id("tmdb") {
            return raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ProviderError::ParseError(format!("invalid tmdb id {raw:?}")));
        }

        let title = item.title.trim();
        if title.is_empty() {
            return Err(ProviderError::Unsupported("no tmdb id or title".into()));
        }

        let language = self.language.as_deref();
        let page: SearchPage = match item.kind {
            ItemKind::Movie => {
                let query = MovieSearchQuery {
                    api_key: &self.api_key,
                    query: title,
                    year: item.year,
                    language,
                };
                self.get_tmdb_json(&format!("{}/search/movie", self.api_base), &query)
                    .await?
            }
            ItemKind::Series => {
                let query = TvSearchQuery {
                    api_key: &self.api_key,
                    query: title,
                    first_air_date_year: item.year,
                    language,
                };
                self.get_tmdb_json(&format!("{}/search/tv", self.api_base), &query)
                    .await?
            }
        };

        let id = page
            .results
            .first()
            .map(|hit| hit.id)
            .ok_or(ProviderError::NotFound)?;
        debug!(item = %item.id, tmdb_id = id, "[tmdb] resolved id by search");
        Ok(id)
    }

    fn to_candidates(&self, response: ImagesResponse, kind: ImageKind) -> Vec<Candidate> {
        let entries = match kind {
            ImageKind::Primary => response.posters,
            ImageKind::Backdrop => response.backdrops,
            ImageKind::Thumb => return Vec::new(),
        };
        entries
            .into_iter()
            .filter(|entry| !entry.file_path.trim().is_empty())
            .map(|entry| {
                let mut candidate = Candidate::new(
                    PROVIDER_NAME,
                    format!("{}{}", self.image_base, entry.file_path),
                    kind,
                );
                candidate.width = entry.width.filter(|w| *w > 0);
                candidate.height = entry.height.filter(|h| *h > 0);
                candidate.language = entry.iso_639_1;
                candidate
            })
            .collect()
    }
}

#[async_trait]
impl ImageProvider for TmdbImageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn supports(&self, item: &CatalogItem) -> bool {
        item.provider_id("tmdb").is_some() || !item.title.trim().is_empty()
    }

    async fn candidates(
        &self,
        item: &CatalogItem,
        kind: ImageKind,
    ) -> Result<Vec<Candidate>, ProviderError> {
        if kind == ImageKind::Thumb {
            return Ok(Vec::new());
        }
        let id = self.resolve_id(item).await?;
        let segment = match item.kind {
            ItemKind::Movie => "movie",
            ItemKind::Series => "tv",
        };
        let url = format!("{}/{segment}/{id}/images", self.api_base);
        let response: ImagesResponse = self
            .get_tmdb_json(&url, &ApiKeyQuery { api_key: &self.api_key })
            .await?;
        Ok(self.to_candidates(response, kind))
    }
}
