//! Runnable server: env-driven configuration, migrations, then serve.

use axum::Router;
use roster_api::{
    common_routes, entity_routes, schema_routes, AppState, Registry, Representation, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

const BODY_LIMIT_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roster_api=info".parse()?))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://roster.db".into());
    let representation = match std::env::var("REPRESENTATION").ok().as_deref() {
        Some("linked") => Representation::Linked,
        _ => Representation::Embedded,
    };

    let registry = Arc::new(Registry::standard()?);
    let store = Store::connect(&database_url, registry).await?;
    store.migrate().await?;
    let state = AppState::new(store, representation);

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .merge(schema_routes(state.clone()))
        .merge(entity_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES));

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
