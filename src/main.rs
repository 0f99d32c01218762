// src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;
use crate::middleware::auth::admin_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let app_state = AppState::new(settings).await?;

    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!().run(pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    let app = router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(app_state: AppState) -> Router {
    // Rotas administrativas (protegidas pelo middleware)
    let admin_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/contracts",
            post(handlers::contracts::create_contract).get(handlers::contracts::list_contracts),
        )
        .route(
            "/contracts/{contract_id}",
            get(handlers::contracts::get_contract)
                .put(handlers::contracts::update_contract)
                .delete(handlers::contracts::delete_contract),
        )
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), admin_guard));

    // Rotas do cliente (link público)
    let public_routes = Router::new()
        .route("/contracts/{shareable_id}", get(handlers::public::view_contract))
        .route("/contracts/{shareable_id}/sign", post(handlers::public::sign_contract));

    let notification_routes = Router::new()
        .route("/confirmation", post(handlers::notifications::send_confirmation));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api", admin_routes)
        .nest("/api/public", public_routes)
        .nest("/api/notifications", notification_routes)
        .with_state(app_state)
}
