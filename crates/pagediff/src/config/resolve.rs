use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use super::capture::{CaptureConfig, CaptureSettings};
use super::{Config, validate_threshold};
use crate::compare::CompareOptions;

const DEFAULT_URL1: &str = "https://www.google.com";
const DEFAULT_URL2: &str = "https://www.bing.com";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_BROWSERS: usize = 1;

/// Values read from the process environment.
#[derive(Debug, Default)]
pub struct EnvLayer {
    pub port: Option<u16>,
    pub threshold: Option<f64>,
    pub chrome_url: Option<String>,
}

impl EnvLayer {
    pub fn from_process() -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()
            .context("PORT must be a valid port number")?;
        let threshold = std::env::var("PAGEDIFF_THRESHOLD")
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .context("PAGEDIFF_THRESHOLD must be a valid float")?;
        let chrome_url = std::env::var("PAGEDIFF_CHROME_URL")
            .ok()
            .filter(|v| !v.is_empty());
        Ok(Self {
            port,
            threshold,
            chrome_url,
        })
    }

    fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            chrome_url: self.chrome_url.clone(),
            ..CaptureConfig::default()
        }
    }
}

/// Values extracted from `pagediff compare` that participate in the merge.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub url1: Option<String>,
    pub url2: Option<String>,
    pub threshold: Option<f64>,
    pub include_aa: bool,
    pub out_dir: Option<PathBuf>,
    pub capture: CaptureConfig,
}

/// Values extracted from `pagediff serve` that participate in the merge.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_browsers: Option<usize>,
    pub capture: CaptureConfig,
}

/// One-shot run config after CLI > env > file > defaults merge.
#[derive(Debug)]
pub struct ResolvedRunConfig {
    pub url1: String,
    pub url2: String,
    pub out_dir: PathBuf,
    pub capture: CaptureSettings,
    pub options: CompareOptions,
}

impl ResolvedRunConfig {
    pub fn new(file: Config, env: EnvLayer, cli: RunOverrides) -> Result<Self> {
        let url1 = cli
            .url1
            .or(file.compare.url1)
            .unwrap_or_else(|| DEFAULT_URL1.to_owned());
        let url2 = cli
            .url2
            .or(file.compare.url2)
            .unwrap_or_else(|| DEFAULT_URL2.to_owned());
        let out_dir = cli
            .out_dir
            .or(file.compare.out_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut options = file.diff.options();
        options.threshold = resolve_threshold(cli.threshold, &env, options.threshold)?;
        options.include_aa |= cli.include_aa;

        // Capture: file base, then env, then CLI overlay
        let mut capture = file.capture;
        capture.merge(&env.capture());
        capture.merge(&cli.capture);
        let capture = capture.resolve(CaptureSettings::one_shot())?;

        Ok(Self {
            url1,
            url2,
            out_dir,
            capture,
            options,
        })
    }
}

/// Service config after CLI > env > file > defaults merge.
#[derive(Debug)]
pub struct ResolvedServeConfig {
    pub addr: SocketAddr,
    pub max_browsers: usize,
    pub capture: CaptureSettings,
    /// Applied to every request; a request's `threshold` replaces the default.
    pub options: CompareOptions,
}

impl ResolvedServeConfig {
    pub fn new(file: Config, env: EnvLayer, cli: ServeOverrides) -> Result<Self> {
        let host = cli
            .host
            .or(file.server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = cli
            .port
            .or(env.port)
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        let max_browsers = cli
            .max_browsers
            .or(file.server.max_browsers)
            .unwrap_or(DEFAULT_MAX_BROWSERS)
            .max(1);

        let mut options = file.diff.options();
        options.threshold = resolve_threshold(None, &env, options.threshold)?;

        let mut capture = file.capture;
        capture.merge(&env.capture());
        capture.merge(&cli.capture);
        let capture = capture.resolve(CaptureSettings::service())?;

        Ok(Self {
            addr,
            max_browsers,
            capture,
            options,
        })
    }
}

fn resolve_threshold(cli: Option<f64>, env: &EnvLayer, file: f64) -> Result<f64> {
    let threshold = cli.or(env.threshold).unwrap_or(file);
    validate_threshold(threshold).map_err(|e| anyhow!("{e}"))
}
