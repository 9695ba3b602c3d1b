//src/main.rs

use axum::{
    routing::{get, post, put},
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

use crate::config::{AppConfig, AppState};

fn app(app_state: AppState) -> Router {
    let loan_routes = Router::new()
        .route(
            "/",
            post(handlers::loans::create_loan).get(handlers::loans::list_loans),
        )
        .route(
            "/{loan_id}",
            get(handlers::loans::get_loan)
                .put(handlers::loans::edit_loan)
                .delete(handlers::loans::delete_loan),
        )
        .route("/{loan_id}/status", put(handlers::loans::set_loan_status))
        .route("/{loan_id}/settlement", post(handlers::loans::settle_loan))
        .route("/{loan_id}/rollover", post(handlers::loans::roll_over_loan))
        .route("/{loan_id}/overdue", post(handlers::loans::revert_to_overdue))
        .route("/{loan_id}/payments", get(handlers::loans::list_payments))
        .route("/{loan_id}/installments", get(handlers::loans::list_installments))
        .route(
            "/{loan_id}/installments/{sequence}/payment",
            post(handlers::installments::pay_installment),
        )
        .route(
            "/{loan_id}/installments/{sequence}/status",
            put(handlers::installments::set_installment_status),
        )
        .route(
            "/{loan_id}/installments/{sequence}/due-date",
            put(handlers::installments::set_installment_due_date),
        )
        .route(
            "/{loan_id}/installments/{sequence}/missed",
            post(handlers::installments::mark_missed),
        );

    let collection_routes = Router::new()
        .route("/", get(handlers::collections::list_collections))
        .route(
            "/{collection_id}/charges",
            put(handlers::collections::set_collection_charges),
        );

    let ledger_routes = Router::new().route("/summary", get(handlers::ledger::get_summary));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(docs::ApiDoc::openapi()) }),
        )
        .nest("/api/loans", loan_routes)
        .nest("/api/collections", collection_routes)
        .nest("/api/ledger", ledger_routes)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}
