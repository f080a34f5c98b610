use std::net::SocketAddr;

use anyhow::Context;

use foundling::config::Config;
use foundling::uploads::UploadStore;
use foundling::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    foundling::logging::init();

    let config = Config::default();
    let pool = foundling::db::open_sqlite_pool(&config.database_path)
        .await
        .context("open database")?;
    foundling::migrate::apply_migrations(&pool)
        .await
        .context("apply migrations")?;
    foundling::auth::ensure_admin_user(&pool, &config.admin_username, &config.admin_password)
        .await
        .context("seed admin user")?;

    let uploads = UploadStore::new(&config.uploads_dir);
    uploads.ensure_dir().await?;

    let app = foundling::router(AppState::new(pool, uploads));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!(target = "foundling", event = "listening", addr = %config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!(target = "foundling", event = "shutdown_signal");
}
