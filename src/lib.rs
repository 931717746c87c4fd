// src/lib.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use utoipa::OpenApi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use crate::config::AppState;
use crate::middleware::auth::author_guard;

/// Monta o router completo. O prefixo público de assinatura vem da configuração.
pub fn build_router(app_state: AppState) -> Router {
    // Rotas do autor (protegidas pelo middleware)
    let contract_routes = Router::new()
        .route(
            "/",
            post(handlers::contracts::create_contract).get(handlers::contracts::list_contracts),
        )
        .route("/events", get(handlers::contracts::contract_events))
        .route("/{id}", get(handlers::contracts::get_contract))
        .route("/{id}/draft", post(handlers::contracts::begin_drafting))
        .route(
            "/{id}/pdf",
            post(handlers::contracts::upload_pdf)
                .layer(DefaultBodyLimit::max(app_state.config.max_pdf_bytes)),
        )
        .route("/{id}/signatories", put(handlers::contracts::set_signatories))
        .route("/{id}/fields", post(handlers::contracts::place_field))
        .route("/{id}/fields/{index}", delete(handlers::contracts::remove_field))
        .route("/{id}/send", post(handlers::contracts::send_for_signature))
        .route("/{id}/render", get(handlers::contracts::render_contract))
        .route("/{id}/render.html", get(handlers::contracts::render_contract_html))
        .route("/{id}/export.pdf", get(handlers::contracts::export_contract_pdf))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            author_guard,
        ));

    // Rotas públicas do signatário (o token de sessão é validado no extrator)
    let signing_routes = Router::new()
        .route("/{id}/verify", post(handlers::signing::verify_signatory))
        .route("/{id}/session", get(handlers::signing::signing_session))
        .route("/{id}/sign", post(handlers::signing::sign_contract));

    let sign_prefix = format!("/{}", app_state.config.sign_prefix());

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(docs::ApiDoc::openapi()) }))
        .route("/files/{*path}", get(handlers::files::download_file))
        .nest("/api/contracts", contract_routes)
        .nest(&sign_prefix, signing_routes)
        .with_state(app_state)
}
