// src/handlers/collections.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{db_utils::get_tenant_connection, error::AppError},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::collection::{CollectionFilter, CollectionRecord},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionChargesPayload {
    /// Juros (%) sobre o valor original; vazio remove
    pub interest_percent: Option<Decimal>,
    /// Multa (%) sobre o valor original; vazio remove
    pub penalty_percent: Option<Decimal>,
}

// GET /api/collections
#[utoipa::path(
    get,
    path = "/api/collections",
    tag = "Collections",
    responses((status = 200, description = "Cobranças com dias de atraso atualizados", body = Vec<CollectionRecord>)),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja"),
        ("status" = Option<String>, Query, description = "Pendente, Paga ou Cancelada"),
        ("clientId" = Option<Uuid>, Query, description = "ID do Cliente"),
        ("overdueOnly" = Option<bool>, Query, description = "Só pendentes vencidas")
    )
)]
pub async fn list_collections(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(filter): Query<CollectionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let collections = app_state
        .collection_service
        .list_collections(&mut *conn, tenant.0, &filter, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(collections)))
}

// PUT /api/collections/{id}/charges
#[utoipa::path(
    put,
    path = "/api/collections/{collection_id}/charges",
    tag = "Collections",
    request_body = CollectionChargesPayload,
    responses(
        (status = 200, description = "Cobrança com valor atual recalculado", body = CollectionRecord),
        (status = 409, description = "Cobrança já baixada")
    ),
    params(
        ("collection_id" = Uuid, Path, description = "ID da Cobrança"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn set_collection_charges(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(collection_id): Path<Uuid>,
    Json(payload): Json<CollectionChargesPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let record = app_state
        .collection_service
        .set_collection_charges(
            &mut *conn,
            tenant.0,
            collection_id,
            payload.interest_percent,
            payload.penalty_percent,
            app_state.clock.today(),
        )
        .await?;

    Ok((StatusCode::OK, Json(record)))
}
