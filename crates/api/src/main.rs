use std::sync::Arc;

use anyhow::Context as _;

use tasklane_api::app::{build_app, services::AppServices};
use tasklane_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tasklane_observability::init_with(config.log_format);

    if config.jwt_secret_defaulted {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = Arc::new(AppServices::connect(&config).await?);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
