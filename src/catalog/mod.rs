pub mod jamendo;
pub mod track;

pub use jamendo::{CatalogMode, JamendoClient, JamendoSettings};
pub use track::Track;

use crate::error::CatalogError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Genres offered when the catalog cannot list its own tags.
pub const DEFAULT_TAGS: [&str; 10] = [
    "pop",
    "rock",
    "electronic",
    "jazz",
    "classical",
    "hiphop",
    "metal",
    "world",
    "soundtrack",
    "lounge",
];

pub const DEFAULT_LIMIT: u32 = 50;

/// Track-listing queries understood by every catalog backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    ByTag,
    Popular,
    Latest,
    /// No native random listing exists; backends use a randomized offset.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Relevance,
    PopularityWeek,
    PopularityTotal,
    ReleaseDateDesc,
}

impl SortOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::PopularityWeek => "popularity_week",
            SortOrder::PopularityTotal => "popularity_total",
            SortOrder::ReleaseDateDesc => "releasedate_desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub text: Option<String>,
    pub tag: Option<String>,
    pub limit: u32,
    pub order: Option<SortOrder>,
    pub offset: Option<u32>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            text: None,
            tag: None,
            limit: DEFAULT_LIMIT,
            order: None,
            offset: None,
        }
    }
}

impl QueryParams {
    pub fn search(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// A remote source of track metadata and stream URLs.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn query(&self, endpoint: Endpoint, params: &QueryParams) -> Result<Vec<Track>, CatalogError>;

    async fn tags(&self) -> Result<Vec<String>, CatalogError>;

    /// Whether the catalog is configured and reachable.
    async fn check_available(&self) -> Result<bool, CatalogError>;
}

/// Query front end that never fails: catalog errors are logged and
/// reported as empty results.
pub struct TrackBrowser<C> {
    catalog: C,
    limit: u32,
}

impl<C: Catalog> TrackBrowser<C> {
    pub fn new(catalog: C, limit: u32) -> Self {
        Self { catalog, limit }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub async fn search(&self, text: &str) -> Vec<Arc<Track>> {
        self.run(Endpoint::Search, QueryParams::search(text)).await
    }

    pub async fn by_tag(&self, tag: &str) -> Vec<Arc<Track>> {
        self.run(Endpoint::ByTag, QueryParams::tag(tag)).await
    }

    pub async fn popular(&self) -> Vec<Arc<Track>> {
        self.run(Endpoint::Popular, QueryParams::default()).await
    }

    pub async fn latest(&self) -> Vec<Arc<Track>> {
        self.run(Endpoint::Latest, QueryParams::default()).await
    }

    pub async fn random(&self) -> Vec<Arc<Track>> {
        self.run(Endpoint::Random, QueryParams::default()).await
    }

    pub async fn tags(&self) -> Vec<String> {
        match self.catalog.tags().await {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
            Err(e) => {
                warn!(error = %e, "tag listing failed, using built-in genres");
                DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
            }
        }
    }

    async fn run(&self, endpoint: Endpoint, params: QueryParams) -> Vec<Arc<Track>> {
        let params = params.with_limit(self.limit);
        match self.catalog.query(endpoint, &params).await {
            Ok(tracks) => {
                debug!(?endpoint, count = tracks.len(), "catalog query returned");
                tracks.into_iter().map(Arc::new).collect()
            }
            Err(e) => {
                warn!(?endpoint, error = %e, "catalog query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyCatalog {
        fail: bool,
        seen: Mutex<Vec<(Endpoint, QueryParams)>>,
    }

    #[async_trait]
    impl Catalog for FlakyCatalog {
        async fn query(&self, endpoint: Endpoint, params: &QueryParams) -> Result<Vec<Track>, CatalogError> {
            self.seen.lock().unwrap().push((endpoint, params.clone()));
            if self.fail {
                return Err(CatalogError::Status {
                    status: 503,
                    reason: "Service Unavailable".into(),
                });
            }
            Ok(vec![Track::new("1", "One", 120)])
        }

        async fn tags(&self) -> Result<Vec<String>, CatalogError> {
            if self.fail {
                Err(CatalogError::Malformed("not json".into()))
            } else {
                Ok(vec!["ambient".into()])
            }
        }

        async fn check_available(&self) -> Result<bool, CatalogError> {
            Ok(!self.fail)
        }
    }

    fn catalog(fail: bool) -> FlakyCatalog {
        FlakyCatalog {
            fail,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_failures_become_empty_results() {
        let browser = TrackBrowser::new(catalog(true), 20);
        assert!(browser.search("rain").await.is_empty());
        assert!(browser.popular().await.is_empty());
        assert_eq!(browser.tags().await.len(), DEFAULT_TAGS.len());
    }

    #[tokio::test]
    async fn test_limit_and_text_are_forwarded() {
        let browser = TrackBrowser::new(catalog(false), 20);
        let found = browser.search("rain").await;
        assert_eq!(found.len(), 1);
        assert_eq!(browser.tags().await, vec!["ambient".to_string()]);

        let seen = browser.catalog().seen.lock().unwrap();
        assert_eq!(seen[0].0, Endpoint::Search);
        assert_eq!(seen[0].1.limit, 20);
        assert_eq!(seen[0].1.text.as_deref(), Some("rain"));
    }
}
