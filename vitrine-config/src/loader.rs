use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_CONFIG_LOCATIONS;
use crate::error::ConfigLoadError;
use crate::models::{
    CacheStoreConfig, Config, ConfigMetadata, GatewayConfig, HttpConfig,
    ViewportConfig,
};
use crate::sources::{EnvConfig, FileConfig};
use crate::validation::{self, ConfigWarnings};

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Result of a successful load: the effective config plus anything the
/// operator should hear about.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Load `.env`, gather `VITRINE_*` variables and merge them over the
    /// config file and built-in defaults.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_from_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] with an explicit environment snapshot
    /// and without touching `.env` files.
    pub fn load_from_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        self.compose_config(file_config, env, config_path)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No vitrine.toml detected; \
                 using environment variables and defaults",
                "Create vitrine.toml to pin gateway and cache endpoints",
            );
        }

        let FileConfig {
            gateway: file_gateway,
            cache: file_cache,
            http: file_http,
            viewport: file_viewport,
        } = file_config.unwrap_or_default();

        let defaults = Config::default();

        let gateway = GatewayConfig {
            canonical_prefix: env
                .gateway_prefix
                .clone()
                .or(file_gateway.canonical_prefix)
                .unwrap_or(defaults.gateway.canonical_prefix),
            scheme_prefixes: env
                .scheme_prefixes
                .clone()
                .or(file_gateway.scheme_prefixes)
                .unwrap_or(defaults.gateway.scheme_prefixes),
            alternate_prefixes: env
                .alternate_gateways
                .clone()
                .or(file_gateway.alternate_prefixes)
                .unwrap_or(defaults.gateway.alternate_prefixes),
        };

        let cache = CacheStoreConfig {
            base_url: env
                .cache_base_url
                .clone()
                .or(file_cache.base_url)
                .unwrap_or(defaults.cache.base_url),
            api_base_url: env
                .api_base_url
                .clone()
                .or(file_cache.api_base_url)
                .unwrap_or(defaults.cache.api_base_url),
        };

        let request_timeout = match env
            .request_timeout
            .clone()
            .or(file_http.request_timeout)
        {
            Some(raw) => parse_duration("http.request_timeout", &raw)?,
            None => defaults.http.request_timeout,
        };

        let http = HttpConfig {
            request_timeout,
            max_concurrent_fetches: env
                .max_concurrent_fetches
                .or(file_http.max_concurrent_fetches)
                .unwrap_or(defaults.http.max_concurrent_fetches),
            user_agent: env
                .user_agent
                .clone()
                .or(file_http.user_agent)
                .unwrap_or(defaults.http.user_agent),
        };

        let viewport = ViewportConfig {
            root_margin: env
                .root_margin
                .or(file_viewport.root_margin)
                .unwrap_or(defaults.viewport.root_margin),
        };

        let mut config = Config {
            gateway,
            cache,
            http,
            viewport,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        validation::normalize_endpoints(&mut config, &mut warnings);
        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        for warning in warnings.iter() {
            tracing::debug!(message = %warning.message, "config warning");
        }

        Ok(ConfigLoad { config, warnings })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.to_string(),
            source,
        }
    })
}
