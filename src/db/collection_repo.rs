// src/db/collection_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        collection::{CollectionFilter, CollectionRecord, Payment},
        ledger::LedgerFilter,
    },
};

// Cobranças (contas a receber) e o histórico de pagamentos
#[derive(Clone, Default)]
pub struct CollectionRepository;

impl CollectionRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  COBRANÇAS
    // =========================================================================

    pub async fn list_collections<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &CollectionFilter,
        today: NaiveDate,
    ) -> Result<Vec<CollectionRecord>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let records = sqlx::query_as::<_, CollectionRecord>(
            r#"
            SELECT c.* FROM collections c
            JOIN loans l ON l.id = c.loan_id
            WHERE c.tenant_id = $1
              AND ($2::collection_status IS NULL OR c.status = $2)
              AND ($3::uuid IS NULL OR l.client_id = $3)
              AND (NOT $4 OR (c.status = 'Pendente' AND c.due_date < $5))
            ORDER BY c.due_date ASC, c.created_at ASC
            "#,
        )
            .bind(tenant_id)
            .bind(filter.status)
            .bind(filter.client_id)
            .bind(filter.overdue_only.unwrap_or(false))
            .bind(today)
            .fetch_all(executor)
            .await?;

        Ok(records)
    }

    /// A qual empréstimo pertence a cobrança (para travar o empréstimo antes de mexer nela).
    pub async fn find_loan_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        collection_id: Uuid,
    ) -> Result<Option<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let loan_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT loan_id FROM collections WHERE id = $1 AND tenant_id = $2",
        )
            .bind(collection_id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(loan_id)
    }

    pub async fn delete_for_loan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM collections WHERE loan_id = $1 AND tenant_id = $2")
            .bind(loan_id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  PAGAMENTOS (somente inserção)
    // =========================================================================

    pub async fn insert_payment<'e, E>(&self, executor: E, payment: &Payment) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO payments (id, tenant_id, collection_id, loan_id, amount, paid_on, method, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
            .bind(payment.id)
            .bind(payment.tenant_id)
            .bind(payment.collection_id)
            .bind(payment.loan_id)
            .bind(payment.amount)
            .bind(payment.paid_on)
            .bind(payment.method)
            .bind(payment.notes.as_deref())
            .bind(payment.created_at)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn payments_for_loan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<Vec<Payment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE loan_id = $1 AND tenant_id = $2
            ORDER BY paid_on ASC, created_at ASC
            "#,
        )
            .bind(loan_id)
            .bind(tenant_id)
            .fetch_all(executor)
            .await?;

        Ok(payments)
    }

    pub async fn count_payments_for_loan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payments WHERE loan_id = $1 AND tenant_id = $2",
        )
            .bind(loan_id)
            .bind(tenant_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    /// Total recebido nos empréstimos que passam pelo filtro do resumo.
    pub async fn sum_payments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(p.amount), 0)
            FROM payments p
            JOIN loans l ON l.id = p.loan_id
            WHERE p.tenant_id = $1
              AND ($2::uuid IS NULL OR l.client_id = $2)
              AND ($3::date IS NULL OR l.loan_date >= $3)
              AND ($4::date IS NULL OR l.loan_date <= $4)
            "#,
        )
            .bind(tenant_id)
            .bind(filter.client_id)
            .bind(filter.loan_date_from)
            .bind(filter.loan_date_to)
            .fetch_one(executor)
            .await?;

        Ok(total)
    }
}
