//! # chip-ranking binary
//!
//! Assembles the application from configuration and the compiled-in
//! adapter features, then serves the JSON API and uploaded images.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use cr_api::{configure_routes, middleware, AppState};
use cr_config::{AppConfig, LogFormat};
use cr_core::service::{RankingService, ServiceSettings};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use cr_db_sqlite::SqliteChipRepo;

#[cfg(feature = "storage-local")]
use cr_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use cr_auth_simple::SimpleAuthProvider;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load().context("loading configuration")?;
    init_tracing(cfg.log_format);

    if cfg.session_salt.expose_secret() == "change-me" {
        warn!("CHIP_SESSION_SALT is the built-in default; set a real secret");
    }

    // 1. Database
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(
        SqliteChipRepo::new(&cfg.database_url)
            .await
            .context("opening the SQLite database")?,
    );

    // 2. Storage
    #[cfg(feature = "storage-local")]
    let media = Arc::new(LocalMediaStore::new(
        cfg.upload_root.clone(),
        cfg.public_url_prefix.clone(),
        cfg.max_upload_bytes,
    ));

    // 3. Auth, backed by the same database for credentials
    #[cfg(feature = "auth-simple")]
    let auth = Arc::new(SimpleAuthProvider::new(
        repo.clone(),
        cfg.session_salt.expose_secret(),
        cfg.session_ttl(),
    ));

    let sweeper = auth.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweeper.purge_expired();
        }
    });

    let settings = ServiceSettings {
        call_timeout: cfg.request_timeout(),
        comment_limit: cfg.comment_limit,
        image_bucket: cfg.image_bucket.clone(),
    };
    let state = web::Data::new(AppState {
        service: RankingService::new(repo, media, auth, settings),
        max_upload_bytes: cfg.max_upload_bytes,
    });

    std::fs::create_dir_all(&cfg.upload_root)
        .with_context(|| format!("creating {}", cfg.upload_root.display()))?;
    let upload_root = cfg.upload_root.clone();
    let public_prefix = cfg.public_url_prefix.trim_end_matches('/').to_string();

    info!(bind_addr = %cfg.bind_addr, "chip-ranking starting");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::cors_policy())
            .wrap(middleware::security_headers())
            .configure(configure_routes)
            .service(actix_files::Files::new(&public_prefix, &upload_root))
    })
    .bind(&cfg.bind_addr)
    .with_context(|| format!("binding {}", cfg.bind_addr))?
    .run()
    .await?;

    info!("chip-ranking stopped");
    Ok(())
}
