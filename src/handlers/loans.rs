// src/handlers/loans.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{db_utils::get_tenant_connection, error::AppError},
    config::AppState,
    middleware::tenancy::TenantContext,
    models::{
        collection::{Payment, PaymentMethod},
        loan::{Frequency, Installment, Loan, LoanAggregate, LoanStatus, Pricing},
    },
    services::{loan_service::LoanInput, payment_service::PaymentOutcome},
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanPayload {
    pub client_id: Uuid,

    #[schema(example = 1000.0)]
    pub principal: Decimal,

    // calculationMode + o valor fixado do modo
    #[serde(flatten)]
    pub pricing: Pricing,

    #[serde(default = "default_installment_count")]
    #[validate(range(min = 1, max = 360, message = "O número de parcelas deve estar entre 1 e 360."))]
    pub installment_count: u32,

    pub frequency: Option<Frequency>,

    /// Data do empréstimo (padrão: hoje)
    pub loan_date: Option<NaiveDate>,

    /// Primeiro (ou único) vencimento
    pub due_date: NaiveDate,

    pub late_penalty_rate: Option<Decimal>,

    #[validate(length(max = 2000, message = "Observação muito longa."))]
    pub notes: Option<String>,

    /// Status sugerido pelo operador; as parcelas têm a palavra final
    pub status: Option<LoanStatus>,
}

fn default_installment_count() -> u32 {
    1
}

impl LoanPayload {
    pub fn into_input(self, today: NaiveDate) -> Result<LoanInput, AppError> {
        self.validate()?;

        if self.principal <= Decimal::ZERO {
            return Err(AppError::validation("O valor emprestado deve ser maior que zero."));
        }
        let late_penalty_rate = self.late_penalty_rate.unwrap_or_default();
        if late_penalty_rate < Decimal::ZERO {
            return Err(AppError::validation("A multa por atraso não pode ser negativa."));
        }

        let loan_date = self.loan_date.unwrap_or(today);
        if self.due_date < loan_date {
            return Err(AppError::validation(
                "O vencimento não pode ser anterior à data do empréstimo.",
            ));
        }

        Ok(LoanInput {
            client_id: self.client_id,
            principal: self.principal,
            pricing: self.pricing,
            installment_count: self.installment_count,
            frequency: self.frequency.unwrap_or(Frequency::Monthly),
            loan_date,
            first_due_date: self.due_date,
            late_penalty_rate,
            notes: self.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            status: self.status,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLoansQuery {
    pub client_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetLoanStatusPayload {
    pub status: LoanStatus,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPayload {
    pub paid_on: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

// =============================================================================
//  EMPRÉSTIMOS
// =============================================================================

// POST /api/loans
#[utoipa::path(
    post,
    path = "/api/loans",
    tag = "Loans",
    request_body = LoanPayload,
    responses(
        (status = 201, description = "Empréstimo criado com parcelas e cobranças", body = LoanAggregate),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Cliente na lista negra")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID da Loja"))
)]
pub async fn create_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<LoanPayload>,
) -> Result<impl IntoResponse, AppError> {
    let today = app_state.clock.today();
    let input = payload.into_input(today)?;

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let loan = app_state
        .loan_service
        .create_loan(&mut *conn, tenant.0, input, today)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

// GET /api/loans?clientId=
#[utoipa::path(
    get,
    path = "/api/loans",
    tag = "Loans",
    responses((status = 200, description = "Empréstimos do cliente", body = Vec<Loan>)),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja"),
        ("clientId" = Uuid, Query, description = "ID do Cliente")
    )
)]
pub async fn list_loans(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListLoansQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let loans = app_state
        .loan_service
        .list_loans_for_client(&mut *conn, tenant.0, query.client_id, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(loans)))
}

// GET /api/loans/{id}
#[utoipa::path(
    get,
    path = "/api/loans/{loan_id}",
    tag = "Loans",
    responses(
        (status = 200, description = "Empréstimo com parcelas e cobranças", body = LoanAggregate),
        (status = 404, description = "Empréstimo não encontrado")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn get_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let loan = app_state
        .loan_service
        .get_loan(&mut *conn, tenant.0, loan_id, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(loan)))
}

// PUT /api/loans/{id}
#[utoipa::path(
    put,
    path = "/api/loans/{loan_id}",
    tag = "Loans",
    request_body = LoanPayload,
    responses(
        (status = 200, description = "Empréstimo atualizado", body = LoanAggregate),
        (status = 409, description = "Troca de cronograma com pagamentos registrados")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn edit_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
    Json(payload): Json<LoanPayload>,
) -> Result<impl IntoResponse, AppError> {
    let today = app_state.clock.today();
    let input = payload.into_input(today)?;

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let loan = app_state
        .loan_service
        .edit_loan(&mut *conn, tenant.0, loan_id, input, today)
        .await?;

    Ok((StatusCode::OK, Json(loan)))
}

// DELETE /api/loans/{id}
#[utoipa::path(
    delete,
    path = "/api/loans/{loan_id}",
    tag = "Loans",
    responses(
        (status = 204, description = "Empréstimo apagado"),
        (status = 409, description = "Há histórico de pagamento")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn delete_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    app_state
        .loan_service
        .delete_loan(&mut *conn, tenant.0, loan_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/loans/{id}/installments
#[utoipa::path(
    get,
    path = "/api/loans/{loan_id}/installments",
    tag = "Loans",
    responses((status = 200, description = "Parcelas do empréstimo", body = Vec<Installment>)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn list_installments(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let installments = app_state
        .loan_service
        .list_installments(&mut *conn, tenant.0, loan_id, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(installments)))
}

// GET /api/loans/{id}/payments
#[utoipa::path(
    get,
    path = "/api/loans/{loan_id}/payments",
    tag = "Loans",
    responses((status = 200, description = "Histórico de pagamentos", body = Vec<Payment>)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn list_payments(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let payments = app_state
        .collection_service
        .list_payments(&mut *conn, tenant.0, loan_id)
        .await?;

    Ok((StatusCode::OK, Json(payments)))
}

// =============================================================================
//  STATUS E QUITAÇÃO
// =============================================================================

// PUT /api/loans/{id}/status
#[utoipa::path(
    put,
    path = "/api/loans/{loan_id}/status",
    tag = "Loans",
    request_body = SetLoanStatusPayload,
    responses((status = 200, description = "Status alterado manualmente", body = PaymentOutcome)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn set_loan_status(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
    Json(payload): Json<SetLoanStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .set_loan_status(&mut *conn, tenant.0, loan_id, payload.status, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// POST /api/loans/{id}/settlement
#[utoipa::path(
    post,
    path = "/api/loans/{loan_id}/settlement",
    tag = "Loans",
    request_body = SettlementPayload,
    responses(
        (status = 200, description = "Empréstimo quitado", body = PaymentOutcome),
        (status = 409, description = "Empréstimo cancelado ou já quitado")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn settle_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
    payload: Option<Json<SettlementPayload>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let today = app_state.clock.today();

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .apply_full_settlement(
            &mut *conn,
            tenant.0,
            loan_id,
            payload.paid_on.unwrap_or(today),
            payload.method.unwrap_or_default(),
            payload.notes,
            today,
        )
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// POST /api/loans/{id}/rollover
#[utoipa::path(
    post,
    path = "/api/loans/{loan_id}/rollover",
    tag = "Loans",
    request_body = super::installments::PaymentPayload,
    responses(
        (status = 200, description = "Juros pagos, vencimento adiado em 30 dias", body = PaymentOutcome),
        (status = 422, description = "Valor menor que os juros do período")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn roll_over_loan(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
    Json(payload): Json<super::installments::PaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let today = app_state.clock.today();
    let request = payload.into_request(today)?;

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .apply_interest_only_rollover(&mut *conn, tenant.0, loan_id, request, today)
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// POST /api/loans/{id}/overdue
#[utoipa::path(
    post,
    path = "/api/loans/{loan_id}/overdue",
    tag = "Loans",
    responses((status = 200, description = "Empréstimo voltou para Atrasado", body = PaymentOutcome)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn revert_to_overdue(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(loan_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .revert_to_overdue(&mut *conn, tenant.0, loan_id, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn payload(body: serde_json::Value) -> LoanPayload {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn flattened_pricing_and_defaults() {
        let input = payload(json!({
            "clientId": Uuid::from_u128(1),
            "principal": 1000,
            "calculationMode": "valor_final",
            "finalAmount": 1300,
            "installmentCount": 4,
            "dueDate": "2024-02-10",
            "notes": "  ",
        }))
        .into_input(today())
        .unwrap();

        assert_eq!(input.pricing, Pricing::FinalValue { final_amount: dec!(1300) });
        assert_eq!(input.installment_count, 4);
        assert_eq!(input.frequency, Frequency::Monthly);
        assert_eq!(input.loan_date, today());
        assert_eq!(input.late_penalty_rate, Decimal::ZERO);
        assert_eq!(input.notes, None);
        assert_eq!(input.status, None);
    }

    #[test]
    fn status_hint_accepts_any_casing() {
        let input = payload(json!({
            "clientId": Uuid::from_u128(1),
            "principal": 500,
            "calculationMode": "valor_inicial",
            "interestRate": 20,
            "dueDate": "2024-02-10",
            "status": "QUITADO",
        }))
        .into_input(today())
        .unwrap();

        assert_eq!(input.installment_count, 1);
        assert_eq!(input.status, Some(LoanStatus::Settled));
    }

    #[test]
    fn zero_installments_is_rejected_by_the_validator() {
        let err = payload(json!({
            "clientId": Uuid::from_u128(1),
            "principal": 500,
            "calculationMode": "parcela_fixa",
            "installmentAmount": 100,
            "installmentCount": 0,
            "dueDate": "2024-02-10",
        }))
        .into_input(today())
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[test]
    fn due_date_before_loan_date_is_rejected() {
        let err = payload(json!({
            "clientId": Uuid::from_u128(1),
            "principal": 500,
            "calculationMode": "valor_inicial",
            "interestRate": 10,
            "loanDate": "2024-01-10",
            "dueDate": "2024-01-05",
        }))
        .into_input(today())
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn unknown_calculation_mode_does_not_parse() {
        let parsed = serde_json::from_value::<LoanPayload>(json!({
            "clientId": Uuid::from_u128(1),
            "principal": 500,
            "calculationMode": "juros_compostos",
            "dueDate": "2024-02-10",
        }));
        assert!(parsed.is_err());
    }
}
