use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How long a freshly spawned Chrome gets to print its DevTools URL.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `shutdown` waits for the process to exit after the kill signal.
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable naming an explicit Chrome binary.
pub const CHROME_PATH_ENV: &str = "PAGEDIFF_CHROME_PATH";

/// Chrome process lifecycle: launch (or connect to remote), create tabs, kill.
///
/// Dropping a `Chrome` kills the child and removes its profile directory, so
/// the process never outlives the comparison that launched it.
pub struct Chrome {
    /// None when connected to a remote Chrome we don't own.
    child: Option<Child>,
    /// host:port for HTTP JSON API and building per-tab WebSocket URLs.
    host_port: String,
    /// Temp profile dir, removed on drop (only for local Chrome).
    data_dir: Option<PathBuf>,
}

impl Chrome {
    /// Launch a local headless Chrome with `--remote-debugging-port=0`
    /// (auto-assign). Parses `DevTools listening on ws://...` from stderr.
    pub async fn launch() -> Result<Self> {
        let id = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let data_dir = std::env::temp_dir().join(format!("pagediff-{}-{id}", std::process::id()));

        let chrome_path = find_chrome()?;
        info!(path = %chrome_path, "launching local Chrome");

        let mut child = Command::new(chrome_path)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-extensions",
                "--disable-background-networking",
                "--disable-background-timer-throttling",
                "--disable-backgrounding-occluded-windows",
                "--disable-renderer-backgrounding",
                "--disable-sync",
                "--disable-translate",
                "--mute-audio",
                "--hide-scrollbars",
                "--remote-debugging-port=0",
            ])
            .arg(format!("--user-data-dir={}", data_dir.display()))
            .stderr(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn Chrome")?;

        let stderr = child.stderr.take().context("No stderr from Chrome")?;
        let mut lines = tokio::io::BufReader::new(stderr).lines();

        let debug_url: String = loop {
            let line: Option<String> = tokio::time::timeout(STARTUP_TIMEOUT, lines.next_line())
                .await
                .context("Timed out waiting for Chrome DevTools URL")?
                .context("Failed to read Chrome stderr")?;

            match line {
                Some(ref text) if text.contains("DevTools listening on ") => {
                    break parse_devtools_line(text)?;
                }
                Some(_) => continue,
                None => bail!("Chrome exited before printing DevTools URL"),
            }
        };

        debug!(url = %debug_url, "Chrome DevTools URL discovered");
        let host_port = parse_host_port(&debug_url)?;

        Ok(Self {
            child: Some(child),
            host_port,
            data_dir: Some(data_dir),
        })
    }

    /// Connect to a remote Chrome instance (e.g. running in Docker).
    ///
    /// `base_url` is `http://host:port`; `/json/version` is queried to verify
    /// connectivity, then the HTTP JSON API is used for tab management.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let version_url = format!("{base}/json/version");

        // Use the host:port the caller gave us, not whatever address Chrome
        // reports internally (e.g. a container address).
        let caller_host_port = base
            .split("://")
            .nth(1)
            .context("Invalid chrome_url: no scheme")?
            .to_string();

        info!(url = %version_url, "connecting to remote Chrome");
        reqwest::get(&version_url)
            .await
            .with_context(|| format!("Failed to reach Chrome at {version_url}"))?
            .error_for_status()
            .context("Chrome /json/version returned error")?;

        debug!("remote Chrome is reachable");

        Ok(Self {
            child: None,
            host_port: caller_host_port,
            data_dir: None,
        })
    }

    /// Create a new tab via `PUT /json/new`.
    /// Returns `(target_id, ws_url)` where `ws_url` is the per-target WebSocket.
    pub async fn create_tab(&self) -> Result<(String, String)> {
        let url = format!("http://{}/json/new?about:blank", self.host_port);
        debug!(url = %url, "PUT /json/new");

        let resp: serde_json::Value = reqwest::Client::new()
            .put(&url)
            .send()
            .await
            .context("PUT /json/new failed")?
            .json()
            .await
            .context("Failed to parse /json/new response")?;

        let target_id = resp["id"]
            .as_str()
            .context("No id in /json/new response")?
            .to_string();

        let ws_url = format!("ws://{}/devtools/page/{target_id}", self.host_port);
        debug!(target_id = %target_id, "tab created");

        Ok((target_id, ws_url))
    }

    /// Close a tab via `GET /json/close/<id>`.
    pub async fn close_tab(&self, target_id: &str) -> Result<()> {
        let url = format!("http://{}/json/close/{target_id}", self.host_port);
        reqwest::get(&url)
            .await
            .with_context(|| format!("GET /json/close/{target_id} failed"))?;
        debug!(target_id, "tab closed");
        Ok(())
    }

    /// Kill the local Chrome process and wait for it to exit
    /// (no-op for remote connections).
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        child.start_kill().context("Failed to signal Chrome")?;
        match tokio::time::timeout(EXIT_TIMEOUT, child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to reap Chrome")?;
                debug!(%status, "Chrome exited");
            }
            Err(_) => warn!("Chrome did not exit within {}s", EXIT_TIMEOUT.as_secs()),
        }
        self.child = None;
        Ok(())
    }

    /// Kill the Chrome process without waiting (no-op for remote connections).
    pub fn kill(&mut self) {
        if let Some(ref mut child) = self.child {
            let _ = child.start_kill();
        }
    }
}

impl Drop for Chrome {
    fn drop(&mut self) {
        self.kill();
        if let Some(ref data_dir) = self.data_dir {
            let _ = std::fs::remove_dir_all(data_dir);
        }
    }
}

/// Extract the WebSocket URL from `DevTools listening on ws://...`.
fn parse_devtools_line(line: &str) -> Result<String> {
    let url = line
        .split("DevTools listening on ")
        .nth(1)
        .context("Failed to parse DevTools URL")?
        .trim();
    Ok(url.to_string())
}

/// Extract `host:port` from a WebSocket URL like `ws://127.0.0.1:9222/devtools/browser/...`
fn parse_host_port(ws_url: &str) -> Result<String> {
    let after_scheme = ws_url
        .split("://")
        .nth(1)
        .context("Invalid WebSocket URL: no scheme")?;
    let host_port = after_scheme
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .context("Invalid WebSocket URL: no host:port")?;
    Ok(host_port.to_string())
}

/// Find the Chrome executable: `PAGEDIFF_CHROME_PATH` first, then the usual
/// install locations for the current platform.
fn find_chrome() -> Result<String> {
    if let Ok(path) = std::env::var(CHROME_PATH_ENV)
        && !path.is_empty()
    {
        return Ok(path);
    }

    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ]
    };

    for path in &candidates {
        if std::path::Path::new(path).exists() {
            return Ok(path.to_string());
        }
    }

    // On Linux, check PATH
    if !cfg!(target_os = "macos") {
        for name in &candidates {
            if std::process::Command::new("which")
                .arg(name)
                .output()
                .is_ok_and(|o| o.status.success())
            {
                return Ok(name.to_string());
            }
        }
    }

    bail!(
        "Chrome not found (set {CHROME_PATH_ENV} to override). Tried: {}",
        candidates.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devtools_line_yields_ws_url() {
        let line = "DevTools listening on ws://127.0.0.1:40121/devtools/browser/abc-123\n";
        assert_eq!(
            parse_devtools_line(line).unwrap(),
            "ws://127.0.0.1:40121/devtools/browser/abc-123"
        );
    }

    #[test]
    fn host_port_from_ws_url() {
        let hp = parse_host_port("ws://127.0.0.1:9222/devtools/browser/xyz").unwrap();
        assert_eq!(hp, "127.0.0.1:9222");
    }

    #[test]
    fn host_port_requires_scheme_and_host() {
        assert!(parse_host_port("127.0.0.1:9222").is_err());
        assert!(parse_host_port("ws:///devtools").is_err());
    }
}
