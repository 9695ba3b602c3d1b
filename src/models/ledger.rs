// src/models/ledger.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::loan::LoanStatus;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFilter {
    pub client_id: Option<Uuid>,
    pub loan_date_from: Option<NaiveDate>,
    pub loan_date_to: Option<NaiveDate>,
}

// 1. Totais por status (um card por status no painel)
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub status: LoanStatus,
    pub loan_count: i64,
    pub principal_total: Decimal,
    pub final_total: Decimal,
}

// 2. Resumo da carteira
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub as_of: NaiveDate,
    pub by_status: Vec<StatusTotals>,
    pub loan_count: i64,
    pub outstanding_amount: Decimal,   // soma do valor atual das cobranças pendentes
    pub overdue_amount: Decimal,       // idem, só as vencidas
    pub pending_collections: i64,
    pub clients_in_arrears: i64,       // clientes distintos com ao menos um empréstimo Atrasado
    pub received_total: Decimal,       // soma dos pagamentos registrados
}
