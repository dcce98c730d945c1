use anyhow::Context;
use clubhouse::{db, init_tracing, users, AppState, Config};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url).await?;

    if let Some((username, password)) = &config.bootstrap_admin {
        users::ensure_admin(&db_pool, username, password)
            .await
            .context("unable to create the bootstrap admin")?;
    }

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("unable to create {}", config.upload_dir.display()))?;

    let bind_addr = config.bind_addr;
    let app = clubhouse::app(AppState::new(db_pool, config)?);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("unable to bind {bind_addr}"))?;
    info!("listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(err) => {
            warn!(%err, "unable to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
