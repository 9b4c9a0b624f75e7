pub mod capture;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::compare::CompareOptions;

pub use self::capture::{CaptureConfig, CaptureSettings, WaitUntil};
pub use self::resolve::{
    EnvLayer, ResolvedRunConfig, ResolvedServeConfig, RunOverrides, ServeOverrides,
};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pagediff.toml";

pub fn validate_threshold(v: f64) -> Result<f64, String> {
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("threshold must be between 0.0 and 1.0, got {v}"));
    }
    Ok(v)
}

/// `[compare]`: the one-shot CLI run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareConfig {
    #[serde(default)]
    pub url1: Option<String>,
    #[serde(default)]
    pub url2: Option<String>,
    /// Where `screenshot1.png`, `screenshot2.png` and `diff.png` are written.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

/// `[diff]`: comparator settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffConfig {
    /// Per-pixel color sensitivity (0.0 = strict, 1.0 = lenient).
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Count anti-aliased pixels as differences.
    #[serde(default)]
    pub include_aa: Option<bool>,
    /// Opacity of unchanged pixels in the diff image.
    #[serde(default)]
    pub alpha: Option<f64>,
}

impl DiffConfig {
    pub fn options(&self) -> CompareOptions {
        let defaults = CompareOptions::default();
        CompareOptions {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            include_aa: self.include_aa.unwrap_or(defaults.include_aa),
            alpha: self.alpha.unwrap_or(defaults.alpha),
            ..defaults
        }
    }
}

/// `[server]`: the HTTP service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Browsers allowed to run at once across concurrent requests.
    #[serde(default)]
    pub max_browsers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate semantic constraints that serde cannot express.
    fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.diff.threshold {
            validate_threshold(threshold).map_err(|e| anyhow!("diff.{e}"))?;
        }
        if let Some(alpha) = self.diff.alpha
            && !(0.0..=1.0).contains(&alpha)
        {
            bail!("diff.alpha must be between 0.0 and 1.0, got {alpha}");
        }
        if self.server.max_browsers == Some(0) {
            bail!("server.max_browsers must be > 0");
        }
        Ok(())
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }
}

/// Load the config file.
///
/// An explicit `path` must exist. Without one, `pagediff.toml` is read if
/// present and defaults are used otherwise.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if !required && !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Config::parse(&content, &path)
}
