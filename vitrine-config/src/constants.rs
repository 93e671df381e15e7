//! Defaults taken from the production deployment of the gallery.

use std::time::Duration;

pub const DEFAULT_GATEWAY_PREFIX: &str = "https://ftmdead.mypinata.cloud/ipfs/";

pub const DEFAULT_SCHEME_PREFIXES: &[&str] = &["ipfs://"];

pub const DEFAULT_ALTERNATE_GATEWAYS: &[&str] = &[
    "https://ipfs.io/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
];

pub const DEFAULT_CACHE_BASE_URL: &str =
    "https://enbzwejmbbmiirvimcib.supabase.in/storage/v1/object/public/cache";

pub const DEFAULT_API_BASE_URL: &str = "https://api.fantom.digital";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 6;

/// Upper bound accepted for `http.max_concurrent_fetches`.
pub const MAX_CONCURRENT_FETCHES_LIMIT: usize = 1024;

pub const DEFAULT_ROOT_MARGIN: f32 = 0.0;

pub const DEFAULT_USER_AGENT: &str =
    concat!("vitrine/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_CONFIG_LOCATIONS: &[&str] =
    &["vitrine.toml", "config/vitrine.toml"];
