// src/services/payment_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use sqlx::{Acquire, Postgres};
use uuid::Uuid;

use crate::{
    common::{calendar, error::AppError, money},
    db::{CollectionRepository, LoanRepository},
    models::{
        collection::{CollectionRecord, CollectionStatus, Payment, PaymentMethod},
        loan::{InstallmentStatus, LoanAggregate, LoanStatus},
    },
    services::{
        collection_sync::{self, mark_collection_paid},
        status_resolver,
    },
};

/// Prazo concedido por uma renovação (pagamento só dos juros).
pub const ROLLOVER_DAYS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    pub notes: Option<String>,
}

/// Estado do empréstimo após uma operação de pagamento + os pagamentos gravados por ela.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    #[serde(flatten)]
    pub aggregate: LoanAggregate,
    pub payments: Vec<Payment>,
}

fn new_payment(record: &CollectionRecord, amount: Decimal, paid_on: NaiveDate, method: PaymentMethod, notes: Option<String>) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        tenant_id: record.tenant_id,
        collection_id: record.id,
        loan_id: record.loan_id,
        amount,
        paid_on,
        method,
        notes,
        created_at: Utc::now(),
    }
}

fn missing_pair(what: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("{} sem cobrança pareada", what))
}

fn ensure_not_cancelled(agg: &LoanAggregate) -> Result<(), AppError> {
    if agg.loan.status == LoanStatus::Cancelled {
        return Err(AppError::invalid_state("O empréstimo está cancelado."));
    }
    Ok(())
}

/// Paga uma parcela, baixa a cobrança pareada e recalcula o status do empréstimo.
pub(crate) fn pay_installment(
    agg: &mut LoanAggregate,
    sequence: i32,
    request: PaymentRequest,
    today: NaiveDate,
) -> Result<Payment, AppError> {
    ensure_not_cancelled(agg)?;
    if request.amount <= Decimal::ZERO {
        return Err(AppError::validation("O valor pago deve ser maior que zero."));
    }

    let installment = agg
        .installment_mut(sequence)
        .ok_or_else(|| AppError::not_found(format!("Parcela {}", sequence)))?;
    if installment.is_paid() {
        return Err(AppError::invalid_state(format!("A parcela {} já está paga.", sequence)));
    }

    let amount = money::round_money(request.amount);
    installment.status = InstallmentStatus::Paid;
    installment.amount_paid = Some(amount);
    installment.paid_on = Some(request.paid_on);
    let installment_id = installment.id;

    let record = agg
        .collection_for_mut(installment_id)
        .ok_or_else(|| missing_pair(format!("parcela {}", sequence)))?;
    mark_collection_paid(record, request.paid_on);
    let payment = new_payment(record, amount, request.paid_on, request.method, request.notes);

    collection_sync::synchronize(agg, today);
    Ok(payment)
}

/// Quita tudo que estiver em aberto pelo valor agendado (ou pelo parcial já registrado).
pub(crate) fn settle_all(
    agg: &mut LoanAggregate,
    paid_on: NaiveDate,
    method: PaymentMethod,
    notes: Option<String>,
    today: NaiveDate,
) -> Result<Vec<Payment>, AppError> {
    ensure_not_cancelled(agg)?;

    let mut payments = Vec::new();

    if agg.installments.is_empty() {
        let record = agg.loan_collection_mut().ok_or_else(|| missing_pair("empréstimo fixo"))?;
        if record.status == CollectionStatus::Pending {
            let amount = record.original_amount;
            mark_collection_paid(record, paid_on);
            payments.push(new_payment(record, amount, paid_on, method, notes.clone()));
        }
    } else {
        let open: Vec<(Uuid, Decimal)> = agg
            .installments
            .iter_mut()
            .filter(|i| !i.is_paid())
            .map(|installment| {
                let amount = installment
                    .amount_paid
                    .filter(|partial| *partial > Decimal::ZERO)
                    .unwrap_or(installment.amount);
                installment.status = InstallmentStatus::Paid;
                installment.amount_paid = Some(amount);
                installment.paid_on = Some(paid_on);
                (installment.id, amount)
            })
            .collect();

        for (installment_id, amount) in open {
            let record = agg
                .collection_for_mut(installment_id)
                .ok_or_else(|| missing_pair(format!("parcela {}", installment_id)))?;
            mark_collection_paid(record, paid_on);
            payments.push(new_payment(record, amount, paid_on, method, notes.clone()));
        }
    }

    if payments.is_empty() && agg.loan.status == LoanStatus::Settled {
        return Err(AppError::invalid_state("O empréstimo já está quitado."));
    }

    agg.loan.status = LoanStatus::Settled;
    collection_sync::synchronize(agg, today);
    Ok(payments)
}

/// Renovação: o cliente paga só os juros do período e o vencimento anda 30 dias.
///
/// A cobrança volta a dever só o principal (juros não capitalizam)
/// e os encargos acumulados nela são zerados.
pub(crate) fn roll_over_interest(
    agg: &mut LoanAggregate,
    request: PaymentRequest,
    today: NaiveDate,
) -> Result<Payment, AppError> {
    ensure_not_cancelled(agg)?;
    if agg.loan.status == LoanStatus::Settled {
        return Err(AppError::invalid_state("O empréstimo já está quitado."));
    }
    if agg.loan.has_schedule() {
        return Err(AppError::invalid_state(
            "Renovação só de juros vale apenas para empréstimos de vencimento único.",
        ));
    }

    let required = money::percent_of(agg.loan.principal, agg.loan.interest_rate);
    let paid = money::round_money(request.amount);
    if paid <= Decimal::ZERO || paid < required {
        return Err(AppError::InsufficientAmount {
            required,
            paid,
            shortfall: required - paid,
        });
    }

    let new_due_date = calendar::add_days(agg.loan.due_date, ROLLOVER_DAYS)
        .ok_or_else(|| AppError::validation("Data de vencimento fora do calendário."))?;
    let owed = agg.loan.principal;

    let record = agg.loan_collection_mut().ok_or_else(|| missing_pair("empréstimo fixo"))?;
    if record.status != CollectionStatus::Pending {
        return Err(AppError::invalid_state("A cobrança do empréstimo não está em aberto."));
    }
    let payment = new_payment(record, paid, request.paid_on, request.method, request.notes);

    record.original_amount = owed;
    record.current_amount = owed;
    record.interest_percent = None;
    record.penalty_percent = None;
    record.due_date = new_due_date;

    agg.loan.due_date = new_due_date;
    agg.loan.status = LoanStatus::Active;

    collection_sync::synchronize(agg, today);
    Ok(payment)
}

/// Marca manualmente uma parcela como Atrasada, independente da data.
pub(crate) fn mark_missed(agg: &mut LoanAggregate, sequence: i32, today: NaiveDate) -> Result<(), AppError> {
    ensure_not_cancelled(agg)?;
    let installment = agg
        .installment_mut(sequence)
        .ok_or_else(|| AppError::not_found(format!("Parcela {}", sequence)))?;
    if installment.is_paid() {
        return Err(AppError::invalid_state(format!("A parcela {} já está paga.", sequence)));
    }
    installment.status = InstallmentStatus::Late;

    collection_sync::synchronize(agg, today);
    Ok(())
}

/// Volta o empréstimo para Atrasado por decisão do operador.
/// Com parcelas, a primeira em aberto é marcada como Atrasada; sem parcelas, o status fica gravado.
pub(crate) fn revert_to_overdue(agg: &mut LoanAggregate, today: NaiveDate) -> Result<(), AppError> {
    ensure_not_cancelled(agg)?;

    if agg.installments.is_empty() {
        let open = agg
            .loan_collection()
            .is_some_and(|c| c.status == CollectionStatus::Pending);
        if !open {
            return Err(AppError::invalid_state("Não há cobrança em aberto para este empréstimo."));
        }
        agg.loan.status = LoanStatus::Overdue;
        collection_sync::synchronize(agg, today);
        return Ok(());
    }

    let sequence = agg
        .installments
        .iter()
        .filter(|i| !i.is_paid())
        .map(|i| i.sequence)
        .min()
        .ok_or_else(|| AppError::invalid_state("Todas as parcelas já estão pagas."))?;
    mark_missed(agg, sequence, today)
}

/// Troca manual do status de uma parcela.
pub(crate) fn set_installment_status(
    agg: &mut LoanAggregate,
    sequence: i32,
    status: InstallmentStatus,
    request: Option<PaymentRequest>,
    today: NaiveDate,
) -> Result<Option<Payment>, AppError> {
    match status {
        InstallmentStatus::Paid => {
            let scheduled = agg
                .installment(sequence)
                .map(|i| i.amount)
                .ok_or_else(|| AppError::not_found(format!("Parcela {}", sequence)))?;
            let request = request.unwrap_or(PaymentRequest {
                amount: scheduled,
                paid_on: today,
                method: PaymentMethod::default(),
                notes: None,
            });
            pay_installment(agg, sequence, request, today).map(Some)
        }
        InstallmentStatus::Late => mark_missed(agg, sequence, today).map(|_| None),
        InstallmentStatus::Pending => {
            ensure_not_cancelled(agg)?;
            let installment = agg
                .installment_mut(sequence)
                .ok_or_else(|| AppError::not_found(format!("Parcela {}", sequence)))?;

            // Estorno: os pagamentos já gravados continuam no histórico.
            installment.status = InstallmentStatus::Pending;
            installment.amount_paid = None;
            installment.paid_on = None;
            let installment_id = installment.id;

            let record = agg
                .collection_for_mut(installment_id)
                .ok_or_else(|| missing_pair(format!("parcela {}", sequence)))?;
            record.status = CollectionStatus::Pending;
            record.paid_on = None;

            collection_sync::synchronize(agg, today);
            Ok(None)
        }
    }
}

pub(crate) fn set_installment_due_date(
    agg: &mut LoanAggregate,
    sequence: i32,
    due_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), AppError> {
    ensure_not_cancelled(agg)?;
    let installment = agg
        .installment_mut(sequence)
        .ok_or_else(|| AppError::not_found(format!("Parcela {}", sequence)))?;
    if installment.is_paid() {
        return Err(AppError::invalid_state(format!(
            "A parcela {} já está paga; o vencimento não pode mudar.",
            sequence
        )));
    }

    installment.due_date = due_date;
    if installment.status == InstallmentStatus::Late && due_date >= today {
        installment.status = InstallmentStatus::Pending;
    }
    let installment_id = installment.id;

    let record = agg
        .collection_for_mut(installment_id)
        .ok_or_else(|| missing_pair(format!("parcela {}", sequence)))?;
    record.due_date = due_date;

    if sequence == 1 {
        agg.loan.due_date = due_date;
    }

    collection_sync::synchronize(agg, today);
    Ok(())
}

/// Troca manual do status do empréstimo. O valor do operador é gravado como está;
/// a próxima sincronização corrige o que as parcelas contradisserem.
pub(crate) fn set_loan_status(
    agg: &mut LoanAggregate,
    status: LoanStatus,
    today: NaiveDate,
) -> Result<(), AppError> {
    let previous = agg.loan.status;

    if previous == LoanStatus::Cancelled && status != LoanStatus::Cancelled {
        // Descancelar: as cobranças canceladas voltam a valer
        for record in agg.collections.iter_mut() {
            if record.status == CollectionStatus::Cancelled {
                record.status = CollectionStatus::Pending;
            }
        }
    }

    agg.loan.status = status;
    collection_sync::align_loan_collection(agg, previous, today);
    collection_sync::refresh_derived(agg, today);

    // Descancelar não é uma ordem de status: os fatos decidem.
    if previous == LoanStatus::Cancelled && status != LoanStatus::Cancelled {
        agg.loan.status = status_resolver::resolve(&agg.loan, &agg.installments, today);
    }
    Ok(())
}

#[derive(Clone)]
pub struct PaymentService {
    loans: LoanRepository,
    collections: CollectionRepository,
}

impl PaymentService {
    pub fn new(loans: LoanRepository, collections: CollectionRepository) -> Self {
        Self { loans, collections }
    }

    /// Trava o empréstimo, aplica a operação em memória e grava tudo numa única transação.
    /// Duas requisições para o mesmo empréstimo são serializadas pelo `FOR UPDATE`.
    async fn with_locked_loan<'a, A, F>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        operation: F,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
        F: FnOnce(&mut LoanAggregate) -> Result<Vec<Payment>, AppError>,
    {
        let mut tx = executor.begin().await?;

        let mut aggregate = self.loans.lock_aggregate(&mut tx, tenant_id, loan_id).await?;
        let payments = operation(&mut aggregate)?;

        self.loans.save_aggregate(&mut tx, &aggregate).await?;
        for payment in &payments {
            self.collections.insert_payment(&mut *tx, payment).await?;
        }

        tx.commit().await?;
        Ok(PaymentOutcome { aggregate, payments })
    }

    pub async fn apply_installment_payment<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        sequence: i32,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                pay_installment(agg, sequence, request, today).map(|p| vec![p])
            })
            .await
            .inspect_err(|e| {
                tracing::warn!("Pagamento recusado (empréstimo {}, parcela {}): {}", loan_id, sequence, e)
            })?;

        tracing::info!(
            "Parcela {} do empréstimo {} paga; status {}",
            sequence, loan_id, outcome.aggregate.loan.status
        );
        Ok(outcome)
    }

    pub async fn apply_full_settlement<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        paid_on: NaiveDate,
        method: PaymentMethod,
        notes: Option<String>,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                settle_all(agg, paid_on, method, notes, today)
            })
            .await?;

        tracing::info!(
            "Empréstimo {} quitado ({} pagamento(s) registrados)",
            loan_id, outcome.payments.len()
        );
        Ok(outcome)
    }

    pub async fn apply_interest_only_rollover<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        request: PaymentRequest,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                roll_over_interest(agg, request, today).map(|p| vec![p])
            })
            .await
            .inspect_err(|e| tracing::warn!("Renovação recusada (empréstimo {}): {}", loan_id, e))?;

        tracing::info!(
            "Empréstimo {} renovado; novo vencimento {}",
            loan_id, outcome.aggregate.loan.due_date
        );
        Ok(outcome)
    }

    pub async fn mark_missed<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        sequence: i32,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                mark_missed(agg, sequence, today).map(|_| Vec::new())
            })
            .await?;

        tracing::info!("Parcela {} do empréstimo {} marcada como atrasada", sequence, loan_id);
        Ok(outcome)
    }

    pub async fn revert_to_overdue<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                revert_to_overdue(agg, today).map(|_| Vec::new())
            })
            .await?;

        tracing::info!("Empréstimo {} voltou para Atrasado", loan_id);
        Ok(outcome)
    }

    pub async fn set_installment_status<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        sequence: i32,
        status: InstallmentStatus,
        request: Option<PaymentRequest>,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                set_installment_status(agg, sequence, status, request, today)
                    .map(|payment| payment.into_iter().collect())
            })
            .await?;

        tracing::info!("Parcela {} do empréstimo {} agora {}", sequence, loan_id, status);
        Ok(outcome)
    }

    pub async fn set_installment_due_date<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        sequence: i32,
        due_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                set_installment_due_date(agg, sequence, due_date, today).map(|_| Vec::new())
            })
            .await?;

        tracing::info!("Parcela {} do empréstimo {} vence agora em {}", sequence, loan_id, due_date);
        Ok(outcome)
    }

    pub async fn set_loan_status<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        status: LoanStatus,
        today: NaiveDate,
    ) -> Result<PaymentOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let outcome = self
            .with_locked_loan(executor, tenant_id, loan_id, |agg| {
                set_loan_status(agg, status, today).map(|_| Vec::new())
            })
            .await?;

        tracing::info!(
            "Status do empréstimo {} alterado manualmente para {}",
            loan_id, outcome.aggregate.loan.status
        );
        Ok(outcome)
    }
}
