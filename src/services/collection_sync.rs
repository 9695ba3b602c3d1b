// src/services/collection_sync.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{calendar, error::AppError, money},
    db::{CollectionRepository, LoanRepository},
    models::{
        collection::{CollectionFilter, CollectionRecord, CollectionStatus, Payment},
        loan::{InstallmentStatus, LoanAggregate, LoanStatus},
    },
    services::status_resolver,
};

/// Quantas linhas uma passada de sincronização alterou.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub installments: usize,
    pub collections: usize,
    pub status_changed: bool,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.installments == 0 && self.collections == 0 && !self.status_changed
    }
}

/// Quais empréstimos a varredura preguiçosa deve revisar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncScope {
    pub loan_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl SyncScope {
    pub fn loan(loan_id: Uuid) -> Self {
        Self { loan_id: Some(loan_id), client_id: None }
    }

    pub fn client(client_id: Uuid) -> Self {
        Self { loan_id: None, client_id: Some(client_id) }
    }
}

/// Valor atualizado pelos percentuais legados do registro. Sem percentuais, não mexe.
fn updated_amount(record: &CollectionRecord) -> Decimal {
    if record.interest_percent.is_none() && record.penalty_percent.is_none() {
        return record.current_amount;
    }
    let rate = record.interest_percent.unwrap_or_default() + record.penalty_percent.unwrap_or_default();
    money::with_rate(record.original_amount, rate)
}

/// Recalcula dias de atraso e valor atual de uma cobrança. Devolve `true` se algo mudou.
pub fn refresh_collection(record: &mut CollectionRecord, today: NaiveDate) -> bool {
    let (days_late, current_amount) = match record.status {
        CollectionStatus::Pending => (calendar::days_late(record.due_date, today), updated_amount(record)),
        CollectionStatus::Paid | CollectionStatus::Cancelled => (0, record.current_amount),
    };

    let changed = days_late != record.days_late || current_amount != record.current_amount;
    record.days_late = days_late;
    record.current_amount = current_amount;
    changed
}

pub(crate) fn mark_collection_paid(record: &mut CollectionRecord, paid_on: NaiveDate) {
    record.status = CollectionStatus::Paid;
    record.paid_on = Some(paid_on);
    record.days_late = 0;
}

/// Empréstimo fixo: a cobrança única acompanha o status gravado no empréstimo.
/// Quitado baixa a cobrança em aberto; sair de Quitado reabre a cobrança baixada
/// (os pagamentos já gravados continuam no histórico). Devolve `true` se reabriu.
pub(crate) fn align_loan_collection(agg: &mut LoanAggregate, previous: LoanStatus, today: NaiveDate) -> bool {
    if !agg.installments.is_empty() {
        return false;
    }
    let status = agg.loan.status;
    let Some(record) = agg.loan_collection_mut() else {
        return false;
    };

    match (record.status, status) {
        (CollectionStatus::Pending, LoanStatus::Settled) => {
            mark_collection_paid(record, today);
            false
        }
        (CollectionStatus::Paid, LoanStatus::Active | LoanStatus::Overdue) if previous == LoanStatus::Settled => {
            record.status = CollectionStatus::Pending;
            record.paid_on = None;
            true
        }
        _ => false,
    }
}

/// Atualiza os campos derivados de parcelas e cobranças, sem tocar no status do empréstimo.
pub fn refresh_derived(agg: &mut LoanAggregate, today: NaiveDate) -> SyncReport {
    let mut report = SyncReport::default();

    if agg.loan.status == LoanStatus::Cancelled {
        for record in agg.collections.iter_mut() {
            if record.status == CollectionStatus::Pending {
                record.status = CollectionStatus::Cancelled;
                report.collections += 1;
            }
        }
    }

    for installment in agg.installments.iter_mut() {
        if installment.status == InstallmentStatus::Pending && installment.due_date < today {
            installment.status = InstallmentStatus::Late;
            report.installments += 1;
        }
    }

    for record in agg.collections.iter_mut() {
        if refresh_collection(record, today) {
            report.collections += 1;
        }
    }

    report
}

/// Passada completa: campos derivados + status recalculado pelo resolvedor.
/// Idempotente: rodar duas vezes seguidas não muda nada na segunda.
pub fn synchronize(agg: &mut LoanAggregate, today: NaiveDate) -> SyncReport {
    let mut report = refresh_derived(agg, today);

    let status = status_resolver::resolve(&agg.loan, &agg.installments, today);
    if status != agg.loan.status {
        agg.loan.status = status;
        report.status_changed = true;
    }
    report
}

#[derive(Clone)]
pub struct CollectionSyncService {
    loans: LoanRepository,
    collections: CollectionRepository,
}

impl CollectionSyncService {
    pub fn new(loans: LoanRepository, collections: CollectionRepository) -> Self {
        Self { loans, collections }
    }

    /// Varredura preguiçosa, chamada antes de servir dados de cobrança.
    /// Empréstimos travados por uma escrita em andamento são pulados: a própria escrita os sincroniza.
    pub async fn refresh(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        scope: SyncScope,
        today: NaiveDate,
    ) -> Result<SyncReport, AppError> {
        let mut tx = conn.begin().await?;

        let aggregates = self.loans.lock_sweep_candidates(&mut tx, tenant_id, scope).await?;

        let mut total = SyncReport::default();
        let mut saved = 0usize;
        for mut agg in aggregates {
            let report = synchronize(&mut agg, today);
            if report.is_noop() {
                continue;
            }
            self.loans.save_aggregate(&mut tx, &agg).await?;
            saved += 1;
            total.installments += report.installments;
            total.collections += report.collections;
            total.status_changed |= report.status_changed;
        }

        tx.commit().await?;

        tracing::debug!(
            "Sincronização da loja {}: {} empréstimos, {} parcelas, {} cobranças atualizadas",
            tenant_id, saved, total.installments, total.collections
        );
        Ok(total)
    }

    pub async fn list_collections(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        filter: &CollectionFilter,
        today: NaiveDate,
    ) -> Result<Vec<CollectionRecord>, AppError> {
        let scope = SyncScope { loan_id: None, client_id: filter.client_id };
        self.refresh(conn, tenant_id, scope, today).await?;
        self.collections.list_collections(&mut *conn, tenant_id, filter, today).await
    }

    /// Preenche os percentuais legados de juros/multa de uma cobrança e recalcula o valor atual.
    pub async fn set_collection_charges<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        collection_id: Uuid,
        interest_percent: Option<Decimal>,
        penalty_percent: Option<Decimal>,
        today: NaiveDate,
    ) -> Result<CollectionRecord, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        for percent in [interest_percent, penalty_percent].into_iter().flatten() {
            if percent < Decimal::ZERO {
                return Err(AppError::validation("Percentuais de juros/multa não podem ser negativos."));
            }
        }

        let mut tx = executor.begin().await?;

        let loan_id = self
            .collections
            .find_loan_id(&mut *tx, tenant_id, collection_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Cobrança {}", collection_id)))?;

        let mut agg = self.loans.lock_aggregate(&mut tx, tenant_id, loan_id).await?;

        let record = agg
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| AppError::not_found(format!("Cobrança {}", collection_id)))?;
        if record.status != CollectionStatus::Pending {
            return Err(AppError::invalid_state("Só cobranças pendentes podem receber juros/multa."));
        }
        record.interest_percent = interest_percent;
        record.penalty_percent = penalty_percent;
        if interest_percent.is_none() && penalty_percent.is_none() {
            record.current_amount = record.original_amount;
        }

        synchronize(&mut agg, today);
        self.loans.save_aggregate(&mut tx, &agg).await?;
        tx.commit().await?;

        tracing::info!("Juros/multa da cobrança {} atualizados", collection_id);

        agg.collections
            .into_iter()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| AppError::not_found(format!("Cobrança {}", collection_id)))
    }

    pub async fn list_payments(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        if self.loans.find_loan(&mut *conn, tenant_id, loan_id).await?.is_none() {
            return Err(AppError::not_found(format!("Empréstimo {}", loan_id)));
        }
        self.collections.payments_for_loan(&mut *conn, tenant_id, loan_id).await
    }
}
