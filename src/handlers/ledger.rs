// src/handlers/ledger.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::{db_utils::get_tenant_connection, error::AppError},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::ledger::{LedgerFilter, LedgerSummary},
};

// GET /api/ledger/summary
#[utoipa::path(
    get,
    path = "/api/ledger/summary",
    tag = "Ledger",
    responses(
        (status = 200, description = "Totais da carteira por status", body = LedgerSummary),
        (status = 400, description = "Período inválido")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja"),
        ("clientId" = Option<Uuid>, Query, description = "ID do Cliente"),
        ("loanDateFrom" = Option<NaiveDate>, Query, description = "Empréstimos a partir de"),
        ("loanDateTo" = Option<NaiveDate>, Query, description = "Empréstimos até")
    )
)]
pub async fn get_summary(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<LedgerFilter>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let summary = app_state
        .ledger_service
        .get_summary(&mut *conn, tenant.0, &filter, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}
