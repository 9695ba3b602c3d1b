// src/db/loan_repo.rs

use std::collections::HashMap;

use sqlx::{Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        collection::CollectionRecord,
        ledger::LedgerFilter,
        loan::{Installment, Loan, LoanAggregate},
    },
    services::collection_sync::SyncScope,
};

/// Repositório de empréstimos, parcelas e do agregado completo (empréstimo + parcelas + cobranças).
/// Funções que rodam vários comandos seguidos recebem `&mut PgConnection` para ficarem na mesma transação.
#[derive(Clone, Default)]
pub struct LoanRepository;

/// Distribui parcelas e cobranças carregadas em lote pelos seus empréstimos, na ordem dos empréstimos.
pub(crate) fn group_by_loan(
    loans: Vec<Loan>,
    installments: Vec<Installment>,
    collections: Vec<CollectionRecord>,
) -> Vec<LoanAggregate> {
    let mut installments_by_loan: HashMap<Uuid, Vec<Installment>> = HashMap::new();
    for installment in installments {
        installments_by_loan.entry(installment.loan_id).or_default().push(installment);
    }
    let mut collections_by_loan: HashMap<Uuid, Vec<CollectionRecord>> = HashMap::new();
    for record in collections {
        collections_by_loan.entry(record.loan_id).or_default().push(record);
    }

    loans
        .into_iter()
        .map(|loan| LoanAggregate {
            installments: installments_by_loan.remove(&loan.id).unwrap_or_default(),
            collections: collections_by_loan.remove(&loan.id).unwrap_or_default(),
            loan,
        })
        .collect()
}

impl LoanRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_loan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<Option<Loan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND tenant_id = $2")
            .bind(loan_id)
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(loan)
    }

    pub async fn list_for_client<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Loan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE tenant_id = $1 AND client_id = $2
            ORDER BY loan_date DESC, created_at DESC
            "#,
        )
            .bind(tenant_id)
            .bind(client_id)
            .fetch_all(executor)
            .await?;

        Ok(loans)
    }

    /// Carrega parcelas e cobranças de vários empréstimos com duas consultas.
    async fn attach_children(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loans: Vec<Loan>,
    ) -> Result<Vec<LoanAggregate>, AppError> {
        if loans.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = loans.iter().map(|l| l.id).collect();

        let installments = sqlx::query_as::<_, Installment>(
            r#"
            SELECT * FROM installments
            WHERE tenant_id = $1 AND loan_id = ANY($2)
            ORDER BY loan_id, sequence
            "#,
        )
            .bind(tenant_id)
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?;

        let collections = sqlx::query_as::<_, CollectionRecord>(
            r#"
            SELECT * FROM collections
            WHERE tenant_id = $1 AND loan_id = ANY($2)
            ORDER BY loan_id, due_date, created_at
            "#,
        )
            .bind(tenant_id)
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?;

        let mut aggregates = group_by_loan(loans, installments, collections);
        for agg in aggregates.iter_mut() {
            // Cobranças na ordem das parcelas
            let order: HashMap<Uuid, i32> = agg.installments.iter().map(|i| (i.id, i.sequence)).collect();
            agg.collections
                .sort_by_key(|c| c.installment_id.and_then(|id| order.get(&id).copied()).unwrap_or(0));
        }
        Ok(aggregates)
    }

    /// Leitura sem trava (depois da varredura preguiçosa).
    pub async fn load_aggregate(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<LoanAggregate, AppError> {
        let loan = self
            .find_loan(&mut *conn, tenant_id, loan_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Empréstimo {}", loan_id)))?;

        self.attach_children(conn, tenant_id, vec![loan])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found(format!("Empréstimo {}", loan_id)))
    }

    /// Trava a linha do empréstimo (`FOR UPDATE`) e carrega o agregado.
    /// Deve ser chamada dentro de uma transação: a trava vale até o commit/rollback.
    pub async fn lock_aggregate(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<LoanAggregate, AppError> {
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
            .bind(loan_id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Empréstimo {}", loan_id)))?;

        self.attach_children(conn, tenant_id, vec![loan])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found(format!("Empréstimo {}", loan_id)))
    }

    /// Empréstimos que a varredura pode precisar atualizar, travados com `SKIP LOCKED`:
    /// linhas já travadas por uma escrita ficam de fora.
    pub async fn lock_sweep_candidates(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: SyncScope,
    ) -> Result<Vec<LoanAggregate>, AppError> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT l.* FROM loans l
            WHERE l.tenant_id = $1
              AND ($2::uuid IS NULL OR l.id = $2)
              AND ($3::uuid IS NULL OR l.client_id = $3)
              AND (
                    l.status IN ('Ativo', 'Atrasado')
                    OR EXISTS (
                        SELECT 1 FROM collections c
                        WHERE c.loan_id = l.id AND c.status = 'Pendente'
                    )
              )
            ORDER BY l.id
            FOR UPDATE OF l SKIP LOCKED
            "#,
        )
            .bind(tenant_id)
            .bind(scope.loan_id)
            .bind(scope.client_id)
            .fetch_all(&mut *conn)
            .await?;

        self.attach_children(conn, tenant_id, loans).await
    }

    /// Agregados da carteira para o resumo (sem trava).
    pub async fn load_aggregates(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        filter: &LedgerFilter,
    ) -> Result<Vec<LoanAggregate>, AppError> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::date IS NULL OR loan_date >= $3)
              AND ($4::date IS NULL OR loan_date <= $4)
            ORDER BY loan_date, id
            "#,
        )
            .bind(tenant_id)
            .bind(filter.client_id)
            .bind(filter.loan_date_from)
            .bind(filter.loan_date_to)
            .fetch_all(&mut *conn)
            .await?;

        self.attach_children(conn, tenant_id, loans).await
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    /// Grava o agregado inteiro (upsert por id). Parcelas antes das cobranças, por causa da FK.
    pub async fn save_aggregate(&self, conn: &mut PgConnection, agg: &LoanAggregate) -> Result<(), AppError> {
        let loan = &agg.loan;
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, tenant_id, client_id, principal, interest_rate, late_penalty_rate,
                calculation_mode, installment_count, frequency, installment_amount, final_amount,
                loan_date, due_date, notes, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW())
            ON CONFLICT (id) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                principal = EXCLUDED.principal,
                interest_rate = EXCLUDED.interest_rate,
                late_penalty_rate = EXCLUDED.late_penalty_rate,
                calculation_mode = EXCLUDED.calculation_mode,
                installment_count = EXCLUDED.installment_count,
                frequency = EXCLUDED.frequency,
                installment_amount = EXCLUDED.installment_amount,
                final_amount = EXCLUDED.final_amount,
                loan_date = EXCLUDED.loan_date,
                due_date = EXCLUDED.due_date,
                notes = EXCLUDED.notes,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
            .bind(loan.id)
            .bind(loan.tenant_id)
            .bind(loan.client_id)
            .bind(loan.principal)
            .bind(loan.interest_rate)
            .bind(loan.late_penalty_rate)
            .bind(loan.calculation_mode)
            .bind(loan.installment_count)
            .bind(loan.frequency)
            .bind(loan.installment_amount)
            .bind(loan.final_amount)
            .bind(loan.loan_date)
            .bind(loan.due_date)
            .bind(loan.notes.as_deref())
            .bind(loan.status)
            .bind(loan.created_at)
            .execute(&mut *conn)
            .await?;

        for installment in &agg.installments {
            sqlx::query(
                r#"
                INSERT INTO installments (id, tenant_id, loan_id, sequence, amount, due_date, status, amount_paid, paid_on)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET
                    amount = EXCLUDED.amount,
                    due_date = EXCLUDED.due_date,
                    status = EXCLUDED.status,
                    amount_paid = EXCLUDED.amount_paid,
                    paid_on = EXCLUDED.paid_on
                "#,
            )
                .bind(installment.id)
                .bind(installment.tenant_id)
                .bind(installment.loan_id)
                .bind(installment.sequence)
                .bind(installment.amount)
                .bind(installment.due_date)
                .bind(installment.status)
                .bind(installment.amount_paid)
                .bind(installment.paid_on)
                .execute(&mut *conn)
                .await?;
        }

        for record in &agg.collections {
            sqlx::query(
                r#"
                INSERT INTO collections (
                    id, tenant_id, loan_id, installment_id, original_amount, current_amount,
                    due_date, days_late, status, interest_percent, penalty_percent, paid_on,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW())
                ON CONFLICT (id) DO UPDATE SET
                    original_amount = EXCLUDED.original_amount,
                    current_amount = EXCLUDED.current_amount,
                    due_date = EXCLUDED.due_date,
                    days_late = EXCLUDED.days_late,
                    status = EXCLUDED.status,
                    interest_percent = EXCLUDED.interest_percent,
                    penalty_percent = EXCLUDED.penalty_percent,
                    paid_on = EXCLUDED.paid_on,
                    updated_at = NOW()
                "#,
            )
                .bind(record.id)
                .bind(record.tenant_id)
                .bind(record.loan_id)
                .bind(record.installment_id)
                .bind(record.original_amount)
                .bind(record.current_amount)
                .bind(record.due_date)
                .bind(record.days_late)
                .bind(record.status)
                .bind(record.interest_percent)
                .bind(record.penalty_percent)
                .bind(record.paid_on)
                .bind(record.created_at)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn delete_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM installments WHERE loan_id = $1 AND tenant_id = $2")
            .bind(loan_id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_loan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1 AND tenant_id = $2")
            .bind(loan_id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Empréstimo {}", loan_id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{d, fixed_loan, loan_with_schedule};

    #[test]
    fn group_by_loan_keeps_loan_order_and_children() {
        let a = loan_with_schedule(3, d(2024, 1, 10));
        let b = fixed_loan(d(2024, 2, 1));
        let ids = (a.loan.id, b.loan.id);

        // Filhos embaralhados, como viriam de uma consulta em lote
        let mut installments = a.installments.clone();
        installments.reverse();
        let mut collections = b.collections.clone();
        collections.extend(a.collections.clone());

        let grouped = group_by_loan(vec![b.loan.clone(), a.loan.clone()], installments, collections);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].loan.id, ids.1);
        assert!(grouped[0].installments.is_empty());
        assert_eq!(grouped[0].collections.len(), 1);
        assert_eq!(grouped[1].loan.id, ids.0);
        assert_eq!(grouped[1].installments.len(), 3);
        assert_eq!(grouped[1].collections.len(), 3);
    }

    #[test]
    fn group_by_loan_tolerates_loans_without_rows() {
        let a = loan_with_schedule(2, d(2024, 1, 10));
        let grouped = group_by_loan(vec![a.loan.clone()], Vec::new(), Vec::new());
        assert!(grouped[0].installments.is_empty());
        assert!(grouped[0].collections.is_empty());
    }
}
