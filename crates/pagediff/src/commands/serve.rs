use anyhow::Result;

use crate::config::ResolvedServeConfig;
use crate::server;

/// `pagediff serve`
pub async fn serve(config: ResolvedServeConfig) -> Result<()> {
    server::serve(config).await
}
