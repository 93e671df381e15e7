use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub gateway: FileGatewayConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub http: FileHttpConfig,
    #[serde(default)]
    pub viewport: FileViewportConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileGatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_prefixes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHttpConfig {
    /// Human readable duration such as `"10s"` or `"1500ms"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileViewportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_margin: Option<f32>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub gateway_prefix: Option<String>,
    pub scheme_prefixes: Option<Vec<String>>,
    pub alternate_gateways: Option<Vec<String>>,
    pub cache_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub request_timeout: Option<String>,
    pub max_concurrent_fetches: Option<usize>,
    pub root_margin: Option<f32>,
    pub user_agent: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            std::env::var("VITRINE_CONFIG_PATH").ok().map(PathBuf::from);
        env_config.gateway_prefix = non_empty_var("VITRINE_GATEWAY_PREFIX");
        env_config.scheme_prefixes = parse_csv_var("VITRINE_SCHEME_PREFIXES");
        env_config.alternate_gateways =
            parse_csv_var("VITRINE_ALTERNATE_GATEWAYS");
        env_config.cache_base_url = non_empty_var("VITRINE_CACHE_BASE_URL");
        env_config.api_base_url = non_empty_var("VITRINE_API_BASE_URL");
        env_config.request_timeout = non_empty_var("VITRINE_REQUEST_TIMEOUT");
        env_config.max_concurrent_fetches =
            std::env::var("VITRINE_MAX_CONCURRENT_FETCHES")
                .ok()
                .and_then(|s| s.trim().parse().ok());
        env_config.root_margin = std::env::var("VITRINE_ROOT_MARGIN")
            .ok()
            .and_then(|s| s.trim().parse().ok());
        env_config.user_agent = non_empty_var("VITRINE_USER_AGENT");

        env_config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_values_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            split_csv(" https://a/ipfs/ ,, https://b/ipfs/"),
            vec!["https://a/ipfs/".to_string(), "https://b/ipfs/".to_string()]
        );
    }

    #[test]
    fn file_config_accepts_partial_tables() {
        let raw = r#"
            [gateway]
            canonical_prefix = "https://gw.example/ipfs/"

            [http]
            request_timeout = "2s"
        "#;
        let parsed: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(
            parsed.gateway.canonical_prefix.as_deref(),
            Some("https://gw.example/ipfs/")
        );
        assert!(parsed.gateway.alternate_prefixes.is_none());
        assert_eq!(parsed.http.request_timeout.as_deref(), Some("2s"));
        assert!(parsed.cache.base_url.is_none());
    }
}
