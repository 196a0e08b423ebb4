mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use notebook_core::store::SupabaseStore;

use auth::SupabaseJwtVerifier;
use config::AppConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notebook_api=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting notebook-api with config: {:?}", config);

    let store = SupabaseStore::new(config.supabase.clone())?.with_bearer(config.write_bearer());
    let verifier = Arc::new(SupabaseJwtVerifier::new(config.clone()));
    let state = AppState::new(config.clone(), verifier, store);

    let router = app_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("notebook-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
