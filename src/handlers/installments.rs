// src/handlers/installments.rs

use axum::{
    extract::{Path, State},
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
    models::{collection::PaymentMethod, loan::InstallmentStatus},
    services::payment_service::{PaymentOutcome, PaymentRequest},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[schema(example = 366.67)]
    pub amount: Decimal,
    /// Data do pagamento (padrão: hoje)
    pub paid_on: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl PaymentPayload {
    pub fn into_request(self, today: NaiveDate) -> Result<PaymentRequest, AppError> {
        self.validate()?;
        if self.amount <= Decimal::ZERO {
            return Err(AppError::validation("O valor pago deve ser maior que zero."));
        }
        Ok(PaymentRequest {
            amount: self.amount,
            paid_on: self.paid_on.unwrap_or(today),
            method: self.method.unwrap_or_default(),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetInstallmentStatusPayload {
    pub status: InstallmentStatus,
    /// Só para "Paga": valor recebido (padrão: valor da parcela)
    pub amount_paid: Option<Decimal>,
    pub paid_on: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
}

impl SetInstallmentStatusPayload {
    /// O pagamento que acompanha a troca para "Paga", quando o operador informou o valor.
    pub fn payment_request(&self, today: NaiveDate) -> Result<Option<PaymentRequest>, AppError> {
        if self.status != InstallmentStatus::Paid {
            return Ok(None);
        }
        match self.amount_paid {
            None => Ok(None),
            Some(amount) if amount <= Decimal::ZERO => {
                Err(AppError::validation("O valor pago deve ser maior que zero."))
            }
            Some(amount) => Ok(Some(PaymentRequest {
                amount,
                paid_on: self.paid_on.unwrap_or(today),
                method: self.method.unwrap_or_default(),
                notes: None,
            })),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DueDatePayload {
    pub due_date: NaiveDate,
}

// POST /api/loans/{id}/installments/{sequence}/payment
#[utoipa::path(
    post,
    path = "/api/loans/{loan_id}/installments/{sequence}/payment",
    tag = "Installments",
    request_body = PaymentPayload,
    responses(
        (status = 200, description = "Parcela paga", body = PaymentOutcome),
        (status = 409, description = "Parcela já paga ou empréstimo cancelado")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("sequence" = i32, Path, description = "Número da parcela"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn pay_installment(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path((loan_id, sequence)): Path<(Uuid, i32)>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    let today = app_state.clock.today();
    let request = payload.into_request(today)?;

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .apply_installment_payment(&mut *conn, tenant.0, loan_id, sequence, request, today)
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// PUT /api/loans/{id}/installments/{sequence}/status
#[utoipa::path(
    put,
    path = "/api/loans/{loan_id}/installments/{sequence}/status",
    tag = "Installments",
    request_body = SetInstallmentStatusPayload,
    responses((status = 200, description = "Status da parcela alterado", body = PaymentOutcome)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("sequence" = i32, Path, description = "Número da parcela"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn set_installment_status(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path((loan_id, sequence)): Path<(Uuid, i32)>,
    Json(payload): Json<SetInstallmentStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let today = app_state.clock.today();
    let request = payload.payment_request(today)?;

    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .set_installment_status(&mut *conn, tenant.0, loan_id, sequence, payload.status, request, today)
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// PUT /api/loans/{id}/installments/{sequence}/due-date
#[utoipa::path(
    put,
    path = "/api/loans/{loan_id}/installments/{sequence}/due-date",
    tag = "Installments",
    request_body = DueDatePayload,
    responses(
        (status = 200, description = "Vencimento alterado", body = PaymentOutcome),
        (status = 409, description = "Parcela já paga")
    ),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("sequence" = i32, Path, description = "Número da parcela"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn set_installment_due_date(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path((loan_id, sequence)): Path<(Uuid, i32)>,
    Json(payload): Json<DueDatePayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .set_installment_due_date(
            &mut *conn,
            tenant.0,
            loan_id,
            sequence,
            payload.due_date,
            app_state.clock.today(),
        )
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

// POST /api/loans/{id}/installments/{sequence}/missed
#[utoipa::path(
    post,
    path = "/api/loans/{loan_id}/installments/{sequence}/missed",
    tag = "Installments",
    responses((status = 200, description = "Parcela marcada como atrasada", body = PaymentOutcome)),
    params(
        ("loan_id" = Uuid, Path, description = "ID do Empréstimo"),
        ("sequence" = i32, Path, description = "Número da parcela"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Loja")
    )
)]
pub async fn mark_missed(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path((loan_id, sequence)): Path<(Uuid, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_tenant_connection(&app_state, &tenant).await?;
    let outcome = app_state
        .payment_service
        .mark_missed(&mut *conn, tenant.0, loan_id, sequence, app_state.clock.today())
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn payment_defaults_to_cash_today() {
        let payload: PaymentPayload = serde_json::from_value(json!({ "amount": 150.5 })).unwrap();
        let request = payload.into_request(today()).unwrap();

        assert_eq!(request.amount, dec!(150.5));
        assert_eq!(request.paid_on, today());
        assert_eq!(request.method, PaymentMethod::Dinheiro);
    }

    #[test]
    fn payment_method_is_lowercase_on_the_wire() {
        let payload: PaymentPayload =
            serde_json::from_value(json!({ "amount": 10, "method": "pix", "paidOn": "2024-02-28" })).unwrap();
        let request = payload.into_request(today()).unwrap();

        assert_eq!(request.method, PaymentMethod::Pix);
        assert_eq!(request.paid_on, NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let payload: PaymentPayload = serde_json::from_value(json!({ "amount": 0 })).unwrap();
        assert!(matches!(payload.into_request(today()), Err(AppError::Validation(_))));
    }

    #[test]
    fn status_change_carries_payment_only_when_paid() {
        let paid: SetInstallmentStatusPayload =
            serde_json::from_value(json!({ "status": "paga", "amountPaid": 200 })).unwrap();
        let request = paid.payment_request(today()).unwrap().unwrap();
        assert_eq!(request.amount, dec!(200));

        let reopened: SetInstallmentStatusPayload =
            serde_json::from_value(json!({ "status": "Pendente", "amountPaid": 200 })).unwrap();
        assert!(reopened.payment_request(today()).unwrap().is_none());
    }
}
