use super::track::RawTrack;
use super::{Catalog, Endpoint, QueryParams, SortOrder, Track};
use crate::error::CatalogError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const JAMENDO_API_URL: &str = "https://api.jamendo.com/v3.0";

/// Upper bound for the randomized offset used to emulate a random listing.
const RANDOM_OFFSET_MAX: u32 = 2000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How the catalog is reached: straight to Jamendo, or through the
/// application backend that holds the client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    #[default]
    Direct,
    Proxy,
}

#[derive(Debug, Clone)]
pub struct JamendoSettings {
    pub mode: CatalogMode,
    pub client_id: String,
    /// Backend origin used in proxy mode, e.g. `http://127.0.0.1:8000`
    pub api_base: String,
}

#[derive(Debug, Deserialize)]
struct DirectHeaders {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct DirectResponse {
    headers: DirectHeaders,
    #[serde(default)]
    results: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyConfig {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    status: String,
}

pub struct JamendoClient {
    client: Client,
    settings: JamendoSettings,
}

impl JamendoClient {
    pub fn new(settings: JamendoSettings) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(concat!("jamtune/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &JamendoSettings {
        &self.settings
    }

    /// URL and query pairs for a track listing.
    fn track_request(&self, endpoint: Endpoint, params: &QueryParams) -> Result<(String, Vec<(&'static str, String)>), CatalogError> {
        let mut pairs: Vec<(&'static str, String)> = vec![("limit", params.limit.to_string())];

        match self.settings.mode {
            CatalogMode::Direct => {
                if self.settings.client_id.trim().is_empty() {
                    return Err(CatalogError::NotConfigured("Jamendo client id is empty".into()));
                }
                pairs.push(("client_id", self.settings.client_id.clone()));
                pairs.push(("format", "json".into()));
                pairs.push(("audioformat", "mp32".into()));

                let order = params.order.unwrap_or(match endpoint {
                    Endpoint::Search => SortOrder::Relevance,
                    Endpoint::Popular => SortOrder::PopularityWeek,
                    Endpoint::Latest => SortOrder::ReleaseDateDesc,
                    Endpoint::ByTag | Endpoint::Random => SortOrder::PopularityTotal,
                });
                pairs.push(("order", order.as_param().into()));
                if let Some(text) = &params.text {
                    pairs.push(("search", text.clone()));
                }
                if let Some(tag) = &params.tag {
                    pairs.push(("tags", tag.clone()));
                }
                if let Some(offset) = params.offset {
                    pairs.push(("offset", offset.to_string()));
                }
                Ok((format!("{}/tracks/", JAMENDO_API_URL), pairs))
            }
            CatalogMode::Proxy => {
                let path = match endpoint {
                    Endpoint::Search => "search/",
                    Endpoint::ByTag => "tracks/tag/",
                    Endpoint::Popular => "tracks/popular/",
                    Endpoint::Latest => "tracks/latest/",
                    Endpoint::Random => "tracks/random/",
                };
                if let Some(text) = &params.text {
                    pairs.push(("q", text.clone()));
                }
                if let Some(tag) = &params.tag {
                    pairs.push(("tag", tag.clone()));
                }
                if let Some(order) = params.order {
                    pairs.push(("order", order.as_param().into()));
                }
                if let Some(offset) = params.offset {
                    pairs.push(("offset", offset.to_string()));
                }
                Ok((self.proxy_url(path), pairs))
            }
        }
    }

    fn proxy_url(&self, path: &str) -> String {
        format!("{}/api/jamendo/{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str, pairs: &[(&'static str, String)]) -> Result<Value, CatalogError> {
        debug!(url, "catalog request");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(pairs)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }

    fn parse_tracks(&self, body: Value) -> Result<Vec<Track>, CatalogError> {
        match self.settings.mode {
            CatalogMode::Direct => parse_direct_tracks(body),
            CatalogMode::Proxy => parse_proxy_tracks(body),
        }
    }
}

pub(crate) fn parse_direct_tracks(body: Value) -> Result<Vec<Track>, CatalogError> {
    let resp: DirectResponse =
        serde_json::from_value(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
    if resp.headers.status == "failed" {
        return Err(CatalogError::Api(resp.headers.error_message));
    }
    Ok(resp.results.into_iter().map(Track::from).collect())
}

pub(crate) fn parse_proxy_tracks(body: Value) -> Result<Vec<Track>, CatalogError> {
    let resp: ProxyResponse<RawTrack> =
        serde_json::from_value(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
    if let Some(err) = resp.error {
        return Err(CatalogError::Api(err));
    }
    Ok(resp.results.into_iter().map(Track::from).collect())
}

/// Tags come back either as plain strings or as `{ "name": ... }` objects.
pub(crate) fn parse_proxy_tags(body: Value) -> Result<Vec<String>, CatalogError> {
    let resp: ProxyResponse<Value> =
        serde_json::from_value(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
    if let Some(err) = resp.error {
        return Err(CatalogError::Api(err));
    }
    Ok(resp
        .results
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl Catalog for JamendoClient {
    async fn query(&self, endpoint: Endpoint, params: &QueryParams) -> Result<Vec<Track>, CatalogError> {
        let mut params = params.clone();
        if endpoint == Endpoint::Random && params.offset.is_none() {
            params.offset = Some(rand::thread_rng().gen_range(0..RANDOM_OFFSET_MAX));
        }

        let (url, pairs) = self.track_request(endpoint, &params)?;
        let body = self.get_json(&url, &pairs).await?;
        let tracks = self.parse_tracks(body)?;
        debug!(?endpoint, count = tracks.len(), "parsed catalog tracks");
        Ok(tracks)
    }

    async fn tags(&self) -> Result<Vec<String>, CatalogError> {
        match self.settings.mode {
            // The public API has no tag listing; the browser falls back to built-ins.
            CatalogMode::Direct => Ok(Vec::new()),
            CatalogMode::Proxy => {
                let body = self.get_json(&self.proxy_url("tags/"), &[]).await?;
                parse_proxy_tags(body)
            }
        }
    }

    async fn check_available(&self) -> Result<bool, CatalogError> {
        match self.settings.mode {
            CatalogMode::Direct => Ok(!self.settings.client_id.trim().is_empty()),
            CatalogMode::Proxy => {
                let body = self.get_json(&self.proxy_url("config/"), &[]).await?;
                let config: ProxyConfig =
                    serde_json::from_value(body).map_err(|e| CatalogError::Malformed(e.to_string()))?;
                Ok(config.available && config.status == "configured")
            }
        }
    }
}
