use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitrine_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use vitrine_core::{
    AddressNormalizer, ImagePipeline, ImageSource, Rect, TilePhase, TileView,
    ViewportObserver, fingerprint,
};
use vitrine_model::{ImageReference, TokenData};

/// A single tile filling the viewport, so `resolve` starts visible.
const TILE: Rect = Rect::new(0.0, 0.0, 512.0, 512.0);

#[derive(Parser)]
#[command(
    name = "vitrinectl",
    about = "Resolve and inspect token gallery images"
)]
struct Cli {
    /// Config file (default: vitrine.toml or config/vitrine.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Env file loaded before reading VITRINE_* variables
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical gateway address of an image reference
    Normalize { reference: String },
    /// Print the canonical address and its cache fingerprint
    Fingerprint { reference: String },
    /// Resolve one image through the rendition cache, falling back to the
    /// original asset and warming the cache
    Resolve {
        reference: String,
        #[arg(long, default_value = "0x0")]
        contract: String,
        #[arg(long, default_value = "0")]
        token_id: String,
        /// Write the image bytes here
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration and any warnings
    Config {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ResolveSummary {
    key: String,
    href: String,
    canonical: String,
    fingerprint: u32,
    phase: String,
    placeholder: bool,
    encoding: Option<&'static str>,
    bytes: Option<usize>,
    dimensions: Option<(u32, u32)>,
}

impl ResolveSummary {
    fn new(view: &TileView, canonical: String, fingerprint: u32) -> Self {
        Self {
            key: view.key.clone(),
            href: view.href.clone(),
            canonical,
            fingerprint,
            phase: phase_label(view.phase).to_string(),
            placeholder: view.is_placeholder(),
            encoding: view.image.as_ref().map(|i| i.encoding().mime_type()),
            bytes: view.image.as_ref().map(|i| i.len()),
            dimensions: view.image.as_ref().and_then(|i| i.dimensions()),
        }
    }
}

#[derive(Serialize)]
struct ConfigReport {
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
    canonical_prefix: String,
    scheme_prefixes: Vec<String>,
    alternate_prefixes: Vec<String>,
    cache_base_url: String,
    api_base_url: String,
    request_timeout: String,
    max_concurrent_fetches: usize,
    user_agent: String,
    root_margin: f32,
    warnings: Vec<String>,
}

impl From<&ConfigLoad> for ConfigReport {
    fn from(load: &ConfigLoad) -> Self {
        let config = &load.config;
        Self {
            config_path: config.metadata.config_path.clone(),
            env_file_loaded: config.metadata.env_file_loaded,
            canonical_prefix: config.gateway.canonical_prefix.clone(),
            scheme_prefixes: config.gateway.scheme_prefixes.clone(),
            alternate_prefixes: config.gateway.alternate_prefixes.clone(),
            cache_base_url: config.cache.base_url.clone(),
            api_base_url: config.cache.api_base_url.clone(),
            request_timeout: humantime::format_duration(
                config.http.request_timeout,
            )
            .to_string(),
            max_concurrent_fetches: config.http.max_concurrent_fetches,
            user_agent: config.http.user_agent.clone(),
            root_margin: config.viewport.root_margin,
            warnings: load
                .warnings
                .iter()
                .map(|warning| match &warning.hint {
                    Some(hint) => format!("{} ({hint})", warning.message),
                    None => warning.message.clone(),
                })
                .collect(),
        }
    }
}

fn phase_label(phase: TilePhase) -> &'static str {
    match phase {
        TilePhase::Idle => "idle",
        TilePhase::ProbingCache => "probing-cache",
        TilePhase::FetchingOriginal => "fetching-original",
        TilePhase::Rendered(ImageSource::Cache) => "cache",
        TilePhase::Rendered(ImageSource::Original) => "original",
        TilePhase::Failed => "failed",
        TilePhase::Empty => "empty",
    }
}

fn load_config(cli: &Cli) -> Result<ConfigLoad> {
    let loader = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    });
    let load = loader.load().context("failed to load configuration")?;
    for warning in load.warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }
    Ok(load)
}

async fn resolve(
    load: ConfigLoad,
    token: TokenData,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let pipeline = ImagePipeline::with_http(load.config)
        .context("failed to build image pipeline")?;
    let canonical = pipeline.normalize(&token.image);
    let fingerprint = fingerprint(&canonical).value();

    let observer = ViewportObserver::new(TILE);
    let tile = pipeline.mount(token, observer.observe(TILE));
    let view = tile.settled().await;

    // Let the cache populate land before the runtime shuts down.
    let grace = pipeline.config().http.request_timeout;
    if let Some(populate) = tile.take_populate() {
        match tokio::time::timeout(grace, populate).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "cache populate task failed"),
            Err(_) => warn!("cache populate still pending at exit"),
        }
    }

    if let (Some(path), Some(image)) = (&out, &view.image) {
        std::fs::write(path, image.bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = image.len(), "image written");
    }

    let summary =
        ResolveSummary::new(&view, canonical.into_string(), fingerprint);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} -> {}", summary.href, summary.canonical);
        println!("fingerprint: {}", summary.fingerprint);
        println!("source: {}", summary.phase);
        if let (Some(encoding), Some(bytes)) = (summary.encoding, summary.bytes)
        {
            println!("image: {encoding}, {bytes} bytes");
        }
    }

    if view.is_placeholder() {
        bail!("no image could be resolved ({})", summary.phase);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let load = load_config(&cli)?;

    match cli.command {
        Command::Normalize { reference } => {
            let normalizer = AddressNormalizer::new(&load.config.gateway)?;
            println!("{}", normalizer.normalize_str(&reference));
        }
        Command::Fingerprint { reference } => {
            let normalizer = AddressNormalizer::new(&load.config.gateway)?;
            let canonical = normalizer.normalize_str(&reference);
            let fingerprint = fingerprint(&canonical);
            println!("canonical: {canonical}");
            println!("fingerprint: {fingerprint}");
            println!("cache: {}", load.config.cache_read_url(fingerprint));
        }
        Command::Resolve {
            reference,
            contract,
            token_id,
            out,
            json,
        } => {
            let token = TokenData::new(
                contract,
                token_id,
                ImageReference::new(reference),
            )?;
            resolve(load, token, out, json).await?;
        }
        Command::Config { json } => {
            let report = ConfigReport::from(&load);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", toml::to_string(&report)?);
            }
        }
    }

    Ok(())
}
