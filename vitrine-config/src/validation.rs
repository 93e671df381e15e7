use thiserror::Error;
use url::Url;

use super::constants::MAX_CONCURRENT_FETCHES_LIMIT;
use super::models::{Config, GatewayConfig};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} is not a valid URL: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{field} must use http or https, found '{scheme}'")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("gateway rewrite rules must not be empty strings")]
    EmptyRewriteRule,
    #[error(
        "gateway rule '{rule}' overlaps canonical prefix '{canonical}'; \
         normalization would not be idempotent"
    )]
    NonIdempotentRule { rule: String, canonical: String },
    #[error("max_concurrent_fetches must be at least 1")]
    ZeroConcurrency,
    #[error("max_concurrent_fetches is {value}; at most {limit} is allowed")]
    ExcessiveConcurrency { value: usize, limit: usize },
    #[error("request_timeout must be greater than zero")]
    ZeroTimeout,
    #[error("root_margin must be a finite, non-negative number of pixels")]
    InvalidRootMargin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Bring endpoint strings into the shape the pipeline expects.
///
/// The canonical gateway prefix gains a trailing `/`, base URLs lose theirs,
/// and rewrite rules identical to the canonical prefix are dropped.
pub fn normalize_endpoints(config: &mut Config, warnings: &mut ConfigWarnings) {
    let gateway = &mut config.gateway;
    gateway.canonical_prefix = gateway.canonical_prefix.trim().to_string();
    if !gateway.canonical_prefix.is_empty()
        && !gateway.canonical_prefix.ends_with('/')
    {
        gateway.canonical_prefix.push('/');
    }

    let canonical = gateway.canonical_prefix.clone();
    for rules in [
        &mut gateway.scheme_prefixes,
        &mut gateway.alternate_prefixes,
    ] {
        rules.retain(|rule| {
            if *rule == canonical {
                warnings.push(format!(
                    "gateway rule '{rule}' equals the canonical prefix \
                     and was ignored"
                ));
                false
            } else {
                true
            }
        });
    }

    config.cache.base_url =
        config.cache.base_url.trim().trim_end_matches('/').to_string();
    config.cache.api_base_url = config
        .cache
        .api_base_url
        .trim()
        .trim_end_matches('/')
        .to_string();
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    let canonical = parse_http_url(
        "gateway.canonical_prefix",
        &config.gateway.canonical_prefix,
    )?;
    if canonical.scheme() != "https" {
        warnings.push_with_hint(
            "canonical gateway prefix is not served over https",
            "Browsers block mixed content; prefer an https gateway",
        );
    }
    validate_rules(&config.gateway)?;

    let cache_base = parse_http_url("cache.base_url", &config.cache.base_url)?;
    if cache_base.query().is_some() {
        warnings.push(
            "cache.base_url carries a query string; \
             fingerprints are appended as a path segment",
        );
    }
    parse_http_url("cache.api_base_url", &config.cache.api_base_url)?;

    if config.http.max_concurrent_fetches == 0 {
        return Err(ConfigGuardRailError::ZeroConcurrency);
    }
    if config.http.max_concurrent_fetches > MAX_CONCURRENT_FETCHES_LIMIT {
        return Err(ConfigGuardRailError::ExcessiveConcurrency {
            value: config.http.max_concurrent_fetches,
            limit: MAX_CONCURRENT_FETCHES_LIMIT,
        });
    }
    if config.http.request_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroTimeout);
    }
    let margin = config.viewport.root_margin;
    if !margin.is_finite() || margin < 0.0 {
        return Err(ConfigGuardRailError::InvalidRootMargin);
    }

    if config.gateway.scheme_prefixes.is_empty() {
        warnings.push_with_hint(
            "no decentralized-storage scheme prefixes configured",
            "ipfs:// references will be fetched verbatim and fail",
        );
    }

    Ok(warnings)
}

/// Reject rule sets that would make normalization non-idempotent.
///
/// A rule that is a strict prefix of the canonical gateway, or that extends
/// it, would rewrite an already canonical address a second time.
pub fn validate_rules(
    gateway: &GatewayConfig,
) -> Result<(), ConfigGuardRailError> {
    let canonical = gateway.canonical_prefix.as_str();
    for rule in gateway.rules() {
        if rule.is_empty() {
            return Err(ConfigGuardRailError::EmptyRewriteRule);
        }
        if rule == canonical {
            continue;
        }
        if canonical.starts_with(rule) || rule.starts_with(canonical) {
            return Err(ConfigGuardRailError::NonIdempotentRule {
                rule: rule.to_string(),
                canonical: canonical.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_http_url(
    field: &'static str,
    value: &str,
) -> Result<Url, ConfigGuardRailError> {
    let url = Url::parse(value).map_err(|source| {
        ConfigGuardRailError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        }
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigGuardRailError::UnsupportedScheme {
            field,
            scheme: other.to_string(),
        }),
    }
}
