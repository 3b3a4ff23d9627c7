/// Profile Service Main Entry Point
///
/// Starts the HTTP adapter in front of the authorization pipeline.
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use profile_service::{build_pipeline, http, ProfileStore, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "profile_service=info,grpc_auth_pipeline=info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Profile Service");

    let config_path = std::env::var("PROFILE_CONFIG").ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("Failed to load configuration")?;
    info!(issuer = %settings.auth.issuer, "Configuration loaded successfully");

    let store = Arc::new(ProfileStore::new());
    let pipeline = build_pipeline(&settings.auth, store).context("Failed to build auth pipeline")?;

    let (host, port) = settings.bind_address();
    info!(host = %host, port, "HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pipeline.clone()))
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(http::configure)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {host}:{port}"))?
    .run()
    .await
    .context("HTTP server failed")?;

    info!("Profile Service stopped");
    Ok(())
}
