use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;
use crate::config::CaptureConfig;

fn parse_threshold(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    config::validate_threshold(v)
}

#[derive(Parser)]
#[command(
    name = "pagediff",
    version,
    about = "Screenshot two web pages and measure how much they differ"
)]
pub struct Cli {
    /// Config file (default: ./pagediff.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Capture two pages, write screenshots and a diff image, print the mismatch
    Compare {
        /// First page (default: https://www.google.com)
        #[arg(long)]
        url1: Option<String>,
        /// Second page (default: https://www.bing.com)
        #[arg(long)]
        url2: Option<String>,
        /// Per-pixel color sensitivity (0.0 strict, 1.0 lenient; default 0.1)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// Count anti-aliased pixels as mismatches
        #[arg(long)]
        include_aa: bool,
        /// Directory for screenshot1.png, screenshot2.png and diff.png
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        capture: CaptureConfig,
    },

    /// Run the HTTP comparison service
    Serve {
        /// Listen port (overrides PORT and config)
        #[arg(long)]
        port: Option<u16>,
        /// Listen address (default: 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
        /// Browsers allowed to run at once (default: 1)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_browsers: Option<u64>,
        #[command(flatten)]
        capture: CaptureConfig,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::config::WaitUntil;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_flags_parse() {
        let cli = Cli::try_parse_from([
            "pagediff",
            "--config",
            "ci.toml",
            "compare",
            "--url1",
            "https://a.example",
            "--threshold",
            "0.25",
            "--include-aa",
            "--wait-until",
            "load",
            "--timeout-ms",
            "5000",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
        let Command::Compare {
            url1,
            url2,
            threshold,
            include_aa,
            capture,
            ..
        } = cli.command
        else {
            panic!("expected compare");
        };
        assert_eq!(url1.as_deref(), Some("https://a.example"));
        assert_eq!(url2, None);
        assert_eq!(threshold, Some(0.25));
        assert!(include_aa);
        assert_eq!(capture.wait_until, Some(WaitUntil::Load));
        assert_eq!(capture.timeout_ms, Some(5000));
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["pagediff", "compare", "--threshold", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["pagediff", "compare", "--threshold", "abc"]).is_err());
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from([
            "pagediff",
            "serve",
            "--port",
            "8080",
            "--max-browsers",
            "2",
            "--chrome-url",
            "http://localhost:9222",
        ])
        .unwrap();
        let Command::Serve {
            port,
            max_browsers,
            capture,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(port, Some(8080));
        assert_eq!(max_browsers, Some(2));
        assert_eq!(capture.chrome_url.as_deref(), Some("http://localhost:9222"));
        assert!(Cli::try_parse_from(["pagediff", "serve", "--max-browsers", "0"]).is_err());
    }
}
