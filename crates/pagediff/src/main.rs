use clap::Parser;
use pagediff::config::{
    self, EnvLayer, ResolvedRunConfig, ResolvedServeConfig, RunOverrides, ServeOverrides,
};
use pagediff::{cli, commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagediff=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let file = config::load(cli.config.as_deref())?;
    let env = EnvLayer::from_process()?;

    match cli.command {
        cli::Command::Compare {
            url1,
            url2,
            threshold,
            include_aa,
            out_dir,
            capture,
        } => {
            let overrides = RunOverrides {
                url1,
                url2,
                threshold,
                include_aa,
                out_dir,
                capture,
            };
            let config = ResolvedRunConfig::new(file, env, overrides)?;
            commands::compare(config).await?;
        }
        cli::Command::Serve {
            port,
            host,
            max_browsers,
            capture,
        } => {
            let overrides = ServeOverrides {
                host,
                port,
                max_browsers: max_browsers.map(|n| n as usize),
                capture,
            };
            let config = ResolvedServeConfig::new(file, env, overrides)?;
            commands::serve(config).await?;
        }
    }

    Ok(())
}
