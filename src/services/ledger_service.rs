// src/services/ledger_service.rs

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CollectionRepository, LoanRepository},
    models::{
        collection::CollectionStatus,
        ledger::{LedgerFilter, LedgerSummary, StatusTotals},
        loan::{LoanAggregate, LoanStatus},
    },
    services::{
        collection_sync::{CollectionSyncService, SyncScope},
        status_resolver,
    },
};

/// Projeção da carteira. O status de cada empréstimo vem do mesmo resolvedor usado nas mutações,
/// nunca de uma regra paralela.
pub(crate) fn summarize(
    aggregates: &[LoanAggregate],
    received_total: Decimal,
    today: NaiveDate,
) -> LedgerSummary {
    let mut by_status: Vec<StatusTotals> = LoanStatus::ALL
        .iter()
        .map(|status| StatusTotals {
            status: *status,
            loan_count: 0,
            principal_total: Decimal::ZERO,
            final_total: Decimal::ZERO,
        })
        .collect();

    let mut outstanding_amount = Decimal::ZERO;
    let mut overdue_amount = Decimal::ZERO;
    let mut pending_collections = 0i64;
    let mut clients_in_arrears = HashSet::new();

    for agg in aggregates {
        let status = status_resolver::resolve(&agg.loan, &agg.installments, today);
        if let Some(totals) = by_status.iter_mut().find(|t| t.status == status) {
            totals.loan_count += 1;
            totals.principal_total += agg.loan.principal;
            totals.final_total += agg.loan.final_amount;
        }
        if status == LoanStatus::Overdue {
            clients_in_arrears.insert(agg.loan.client_id);
        }

        for record in agg.collections.iter().filter(|c| c.status == CollectionStatus::Pending) {
            pending_collections += 1;
            outstanding_amount += record.current_amount;
            if record.due_date < today {
                overdue_amount += record.current_amount;
            }
        }
    }

    LedgerSummary {
        as_of: today,
        by_status,
        loan_count: aggregates.len() as i64,
        outstanding_amount,
        overdue_amount,
        pending_collections,
        clients_in_arrears: clients_in_arrears.len() as i64,
        received_total,
    }
}

#[derive(Clone)]
pub struct LedgerService {
    loans: LoanRepository,
    collections: CollectionRepository,
    sync: CollectionSyncService,
}

impl LedgerService {
    pub fn new(loans: LoanRepository, collections: CollectionRepository, sync: CollectionSyncService) -> Self {
        Self { loans, collections, sync }
    }

    pub async fn get_summary(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        filter: &LedgerFilter,
        today: NaiveDate,
    ) -> Result<LedgerSummary, AppError> {
        if let (Some(from), Some(to)) = (filter.loan_date_from, filter.loan_date_to) {
            if from > to {
                return Err(AppError::validation("Período inválido: a data inicial é posterior à final."));
            }
        }

        // 1. A varredura roda antes, para a leitura ver o estado derivado em dia
        let scope = SyncScope { loan_id: None, client_id: filter.client_id };
        self.sync.refresh(conn, tenant_id, scope, today).await?;

        // 2. Leitura num snapshot único (empréstimos e pagamentos do mesmo instante)
        let mut tx = conn.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let aggregates = self.loans.load_aggregates(&mut tx, tenant_id, filter).await?;
        let received_total = self.collections.sum_payments(&mut *tx, tenant_id, filter).await?;

        tx.commit().await?;

        let summary = summarize(&aggregates, received_total, today);
        tracing::debug!(
            "Resumo da loja {}: {} empréstimos, {} em aberto",
            tenant_id, summary.loan_count, summary.outstanding_amount
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        payment_service::{self, PaymentRequest},
        test_support::{build, d, fixed_loan, input, loan_with_schedule},
    };
    use crate::models::collection::PaymentMethod;
    use rust_decimal_macros::dec;

    fn totals(summary: &LedgerSummary, status: LoanStatus) -> &StatusTotals {
        summary.by_status.iter().find(|t| t.status == status).unwrap()
    }

    #[test]
    fn empty_portfolio_lists_every_status_with_zeros() {
        let summary = summarize(&[], Decimal::ZERO, d(2024, 1, 1));
        assert_eq!(summary.by_status.len(), LoanStatus::ALL.len());
        assert!(summary.by_status.iter().all(|t| t.loan_count == 0));
        assert_eq!(summary.outstanding_amount, Decimal::ZERO);
    }

    #[test]
    fn stale_stored_status_is_resolved_before_counting() {
        // Gravado como Ativo, mas já vencido: o resumo conta como Atrasado
        let agg = loan_with_schedule(3, d(2024, 1, 10));
        assert_eq!(agg.loan.status, LoanStatus::Active);

        let summary = summarize(&[agg], Decimal::ZERO, d(2024, 1, 20));
        assert_eq!(totals(&summary, LoanStatus::Overdue).loan_count, 1);
        assert_eq!(totals(&summary, LoanStatus::Active).loan_count, 0);
        assert_eq!(summary.clients_in_arrears, 1);
    }

    #[test]
    fn amounts_and_arrears_are_rolled_up() {
        let today = d(2024, 2, 1);

        let mut paid_one = loan_with_schedule(3, d(2024, 1, 15));
        let request = PaymentRequest {
            amount: dec!(366.67),
            paid_on: today,
            method: PaymentMethod::Pix,
            notes: None,
        };
        payment_service::pay_installment(&mut paid_one, 1, request, today).unwrap();

        let late_fixed = fixed_loan(d(2024, 1, 20));

        let mut other_client = input(1, d(2024, 3, 1));
        other_client.client_id = Uuid::from_u128(0xc2);
        let current_fixed = build(other_client, today);

        let summary = summarize(&[paid_one, late_fixed, current_fixed], dec!(366.67), today);

        assert_eq!(summary.loan_count, 3);
        assert_eq!(totals(&summary, LoanStatus::Active).loan_count, 2);
        assert_eq!(totals(&summary, LoanStatus::Overdue).loan_count, 1);
        assert_eq!(totals(&summary, LoanStatus::Overdue).principal_total, dec!(1000));
        assert_eq!(totals(&summary, LoanStatus::Active).final_total, dec!(2200.00));

        // 2 parcelas abertas + 2 cobranças fixas
        assert_eq!(summary.pending_collections, 4);
        assert_eq!(summary.outstanding_amount, dec!(2933.33));
        assert_eq!(summary.overdue_amount, dec!(1100.00));
        assert_eq!(summary.clients_in_arrears, 1);
        assert_eq!(summary.received_total, dec!(366.67));
    }

    #[test]
    fn fixed_loan_created_as_settled_owes_nothing() {
        let today = d(2024, 3, 1);
        let mut settled = input(1, d(2024, 1, 15));
        settled.status = Some(LoanStatus::Settled);
        let agg = build(settled, today);

        let summary = summarize(&[agg], Decimal::ZERO, today);
        assert_eq!(totals(&summary, LoanStatus::Settled).loan_count, 1);
        assert_eq!(summary.outstanding_amount, Decimal::ZERO);
        assert_eq!(summary.overdue_amount, Decimal::ZERO);
        assert_eq!(summary.pending_collections, 0);
    }

    #[test]
    fn cancelled_loans_owe_nothing() {
        let today = d(2024, 5, 1);
        let mut agg = loan_with_schedule(2, d(2024, 1, 15));
        payment_service::set_loan_status(&mut agg, LoanStatus::Cancelled, today).unwrap();

        let summary = summarize(&[agg], Decimal::ZERO, today);
        assert_eq!(totals(&summary, LoanStatus::Cancelled).loan_count, 1);
        assert_eq!(summary.pending_collections, 0);
        assert_eq!(summary.clients_in_arrears, 0);
    }
}
