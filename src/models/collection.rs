// src/models/collection.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::FromRow;
use uuid::Uuid;

use super::labelled_status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "collection_status")]
#[serde(try_from = "String", into = "&'static str")]
pub enum CollectionStatus {
    #[sqlx(rename = "Pendente")]
    Pending,
    #[sqlx(rename = "Paga")]
    Paid,
    #[sqlx(rename = "Cancelada")]
    Cancelled,
}

labelled_status!(CollectionStatus {
    Pending => "Pendente",
    Paid => "Paga",
    Cancelled => "Cancelada",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Dinheiro,
    Pix,
    Cartao,
    Transferencia,
    Boleto,
    Outro,
}

/// Cobrança (conta a receber) pareada com um empréstimo fixo ou com uma parcela.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub loan_id: Uuid,
    pub installment_id: Option<Uuid>,

    // Valores
    pub original_amount: Decimal,
    pub current_amount: Decimal, // original + juros/multa acumulados

    pub due_date: NaiveDate,
    pub days_late: i32,
    pub status: CollectionStatus,

    // Percentuais por registro (legado). Quando presentes, recalculam o valor atual.
    pub interest_percent: Option<Decimal>,
    pub penalty_percent: Option<Decimal>,

    pub paid_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro imutável de dinheiro recebido contra uma cobrança.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub collection_id: Uuid,
    pub loan_id: Uuid,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filtro da listagem de cobranças.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFilter {
    pub status: Option<CollectionStatus>,
    pub client_id: Option<Uuid>,
    pub overdue_only: Option<bool>,
}
