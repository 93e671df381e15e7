use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ALTERNATE_GATEWAYS, DEFAULT_API_BASE_URL, DEFAULT_CACHE_BASE_URL,
    DEFAULT_GATEWAY_PREFIX, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_ROOT_MARGIN, DEFAULT_SCHEME_PREFIXES,
    DEFAULT_USER_AGENT,
};

/// Effective configuration for the image pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub cache: CacheStoreConfig,
    pub http: HttpConfig,
    pub viewport: ViewportConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// `GET` target for a cached rendition.
    pub fn cache_read_url(
        &self,
        fingerprint: impl std::fmt::Display,
    ) -> String {
        format!("{}/{}", self.cache.base_url, fingerprint)
    }

    /// `POST` target asking the service to ingest `encoded_reference`.
    ///
    /// The caller is responsible for percent-encoding the reference.
    pub fn cache_populate_url(&self, encoded_reference: &str) -> String {
        format!("{}/cache/{}", self.cache.api_base_url, encoded_reference)
    }
}

/// Rewrite rules for the address normalizer.
///
/// `canonical_prefix` always ends with `/`. Scheme prefixes are tried before
/// alternate gateways; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub canonical_prefix: String,
    pub scheme_prefixes: Vec<String>,
    pub alternate_prefixes: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            canonical_prefix: DEFAULT_GATEWAY_PREFIX.to_string(),
            scheme_prefixes: to_owned_list(DEFAULT_SCHEME_PREFIXES),
            alternate_prefixes: to_owned_list(DEFAULT_ALTERNATE_GATEWAYS),
        }
    }
}

impl GatewayConfig {
    /// Every rewrite rule in application order.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.scheme_prefixes
            .iter()
            .chain(self.alternate_prefixes.iter())
            .map(String::as_str)
    }
}

/// Endpoints of the remote rendition cache.
///
/// Both URLs are stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStoreConfig {
    pub base_url: String,
    pub api_base_url: String,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CACHE_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    /// Process-wide cap on concurrent probe and original fetches.
    pub max_concurrent_fetches: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    /// Pixels added on every side of the viewport before intersecting.
    pub root_margin: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            root_margin: DEFAULT_ROOT_MARGIN,
        }
    }
}

/// Where the effective values came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
