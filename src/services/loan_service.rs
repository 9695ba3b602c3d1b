// src/services/loan_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ClientRepository, CollectionRepository, LoanRepository},
    models::{
        client::ClientStatus,
        collection::{CollectionRecord, CollectionStatus},
        loan::{Frequency, Installment, InstallmentStatus, Loan, LoanAggregate, LoanStatus, Pricing},
    },
    services::{
        collection_sync::{self, CollectionSyncService, SyncScope},
        schedule::{self, Schedule, ScheduleRequest},
        status_resolver,
    },
};

/// Dados de criação/edição de um empréstimo, já validados na borda HTTP.
#[derive(Debug, Clone)]
pub struct LoanInput {
    pub client_id: Uuid,
    pub principal: Decimal,
    pub pricing: Pricing,
    pub installment_count: u32,
    pub frequency: Frequency,
    pub loan_date: NaiveDate,
    pub first_due_date: NaiveDate,
    pub late_penalty_rate: Decimal,
    pub notes: Option<String>,
    /// Status sugerido pelo operador; os fatos das parcelas têm a palavra final.
    pub status: Option<LoanStatus>,
}

impl LoanInput {
    pub fn schedule_request(&self) -> ScheduleRequest {
        ScheduleRequest {
            principal: self.principal,
            pricing: self.pricing,
            installment_count: self.installment_count,
            frequency: self.frequency,
            first_due_date: self.first_due_date,
        }
    }
}

fn new_collection(
    loan: &Loan,
    installment_id: Option<Uuid>,
    amount: Decimal,
    due_date: NaiveDate,
) -> CollectionRecord {
    let now = Utc::now();
    CollectionRecord {
        id: Uuid::new_v4(),
        tenant_id: loan.tenant_id,
        loan_id: loan.id,
        installment_id,
        original_amount: amount,
        current_amount: amount,
        due_date,
        days_late: 0,
        status: CollectionStatus::Pending,
        interest_percent: None,
        penalty_percent: None,
        paid_on: None,
        created_at: now,
        updated_at: now,
    }
}

/// Parcelas + cobranças pareadas a partir do cronograma (ou a cobrança única do empréstimo fixo).
fn build_rows(loan: &Loan, schedule: &Schedule) -> (Vec<Installment>, Vec<CollectionRecord>) {
    if schedule.installments.is_empty() {
        let collection = new_collection(loan, None, loan.final_amount, loan.due_date);
        return (Vec::new(), vec![collection]);
    }

    let mut installments = Vec::with_capacity(schedule.installments.len());
    let mut collections = Vec::with_capacity(schedule.installments.len());
    for item in &schedule.installments {
        let installment = Installment {
            id: Uuid::new_v4(),
            tenant_id: loan.tenant_id,
            loan_id: loan.id,
            sequence: item.sequence,
            amount: item.amount,
            due_date: item.due_date,
            status: InstallmentStatus::Pending,
            amount_paid: None,
            paid_on: None,
        };
        collections.push(new_collection(loan, Some(installment.id), item.amount, item.due_date));
        installments.push(installment);
    }
    (installments, collections)
}

fn apply_terms(loan: &mut Loan, input: &LoanInput, schedule: &Schedule) {
    loan.client_id = input.client_id;
    loan.principal = schedule.terms.principal;
    loan.interest_rate = schedule.terms.interest_rate;
    loan.late_penalty_rate = input.late_penalty_rate;
    loan.calculation_mode = input.pricing.mode();
    loan.installment_count = input.installment_count as i32;
    loan.frequency = input.frequency;
    loan.installment_amount = schedule.terms.installment_amount;
    loan.final_amount = schedule.terms.final_amount;
    loan.loan_date = input.loan_date;
    loan.due_date = input.first_due_date;
    loan.notes = input.notes.clone();
    loan.updated_at = Utc::now();
}

/// Monta um empréstimo novo com parcelas e cobranças, já sincronizado com `today`.
pub(crate) fn new_aggregate(
    tenant_id: Uuid,
    input: &LoanInput,
    schedule: &Schedule,
    today: NaiveDate,
) -> LoanAggregate {
    let now = Utc::now();
    let mut loan = Loan {
        id: Uuid::new_v4(),
        tenant_id,
        client_id: input.client_id,
        principal: Decimal::ZERO,
        interest_rate: Decimal::ZERO,
        late_penalty_rate: Decimal::ZERO,
        calculation_mode: input.pricing.mode(),
        installment_count: 1,
        frequency: input.frequency,
        installment_amount: Decimal::ZERO,
        final_amount: Decimal::ZERO,
        loan_date: input.loan_date,
        due_date: input.first_due_date,
        notes: None,
        status: LoanStatus::Active,
        created_at: now,
        updated_at: now,
    };
    apply_terms(&mut loan, input, schedule);

    let (installments, collections) = build_rows(&loan, schedule);
    let mut agg = LoanAggregate { loan, installments, collections };

    let previous = agg.loan.status;
    agg.loan.status = status_resolver::resolve_with_hint(&agg.loan, input.status, &agg.installments, today);
    collection_sync::align_loan_collection(&mut agg, previous, today);
    collection_sync::synchronize(&mut agg, today);
    agg
}

/// Resultado de uma edição: se o cronograma foi trocado, as linhas antigas precisam ser apagadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOutcome {
    pub schedule_replaced: bool,
}

fn has_payment_history(agg: &LoanAggregate, payment_count: i64) -> bool {
    payment_count > 0
        || agg.installments.iter().any(|i| i.is_paid())
        || agg.collections.iter().any(|c| c.status == CollectionStatus::Paid)
}

/// Leva valor final e vencimento do empréstimo fixo para a cobrança única, se ela não estiver paga.
fn update_loan_collection(agg: &mut LoanAggregate) -> Result<(), AppError> {
    let (final_amount, due_date) = (agg.loan.final_amount, agg.loan.due_date);
    let record = agg.loan_collection_mut().ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!("empréstimo fixo sem cobrança pareada"))
    })?;
    // Cobrança já baixada guarda o valor e a data em que foi paga
    if record.status != CollectionStatus::Paid {
        record.original_amount = final_amount;
        record.current_amount = final_amount;
        record.due_date = due_date;
    }
    Ok(())
}

/// Recalcula valores e datas de um empréstimo existente.
///
/// Se o número de parcelas mudou, o cronograma é regenerado a partir do (novo) primeiro vencimento;
/// senão as parcelas são atualizadas no lugar (parcelas pagas mantêm a data de vencimento).
pub(crate) fn apply_edit(
    agg: &mut LoanAggregate,
    input: &LoanInput,
    schedule: &Schedule,
    payment_count: i64,
    today: NaiveDate,
) -> Result<EditOutcome, AppError> {
    let count_changed = agg.loan.installment_count != input.installment_count as i32;

    if count_changed && has_payment_history(agg, payment_count) {
        return Err(AppError::conflict(
            "Não é possível alterar o número de parcelas de um empréstimo com pagamentos registrados.",
        ));
    }

    apply_terms(&mut agg.loan, input, schedule);

    if count_changed {
        let (installments, mut collections) = build_rows(&agg.loan, schedule);
        if agg.loan.status == LoanStatus::Cancelled {
            for record in collections.iter_mut() {
                record.status = CollectionStatus::Cancelled;
            }
        }
        agg.installments = installments;
        agg.collections = collections;
    } else if schedule.installments.is_empty() {
        update_loan_collection(agg)?;
    } else {
        for item in &schedule.installments {
            let installment = agg.installment_mut(item.sequence).ok_or_else(|| {
                AppError::InternalServerError(anyhow::anyhow!("parcela {} ausente", item.sequence))
            })?;
            installment.amount = item.amount;
            if !installment.is_paid() {
                // Só desfaz o atraso que veio da data; a marcação manual do operador fica
                let late_by_date = installment.due_date < today;
                if installment.status == InstallmentStatus::Late && late_by_date && item.due_date >= today {
                    installment.status = InstallmentStatus::Pending;
                }
                installment.due_date = item.due_date;
            }
            let (installment_id, amount, due_date) = (installment.id, installment.amount, installment.due_date);

            let record = agg.collection_for_mut(installment_id).ok_or_else(|| {
                AppError::InternalServerError(anyhow::anyhow!("parcela {} sem cobrança pareada", item.sequence))
            })?;
            // Cobrança já baixada guarda o valor e a data em que foi paga
            if record.status != CollectionStatus::Paid {
                record.original_amount = amount;
                record.current_amount = amount;
                record.due_date = due_date;
            }
        }
    }

    let previous = agg.loan.status;
    agg.loan.status = status_resolver::resolve_with_hint(&agg.loan, input.status, &agg.installments, today);
    if collection_sync::align_loan_collection(agg, previous, today) {
        update_loan_collection(agg)?;
    }
    collection_sync::refresh_derived(agg, today);

    Ok(EditOutcome { schedule_replaced: count_changed })
}

/// Apagar só é permitido sem histórico de pagamento.
pub(crate) fn ensure_deletable(agg: &LoanAggregate, payment_count: i64) -> Result<(), AppError> {
    if has_payment_history(agg, payment_count) {
        return Err(AppError::conflict(
            "O empréstimo possui pagamentos registrados e não pode ser apagado.",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LoanService {
    loans: LoanRepository,
    collections: CollectionRepository,
    clients: ClientRepository,
    sync: CollectionSyncService,
}

impl LoanService {
    pub fn new(
        loans: LoanRepository,
        collections: CollectionRepository,
        clients: ClientRepository,
        sync: CollectionSyncService,
    ) -> Self {
        Self { loans, collections, clients, sync }
    }

    async fn ensure_client_can_borrow<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        client_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let client = self
            .clients
            .get_client(executor, tenant_id, client_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Cliente {}", client_id)))?;

        if client.status == ClientStatus::Blacklisted {
            return Err(AppError::invalid_state(format!(
                "O cliente '{}' está na lista negra.",
                client.name
            )));
        }
        Ok(())
    }

    pub async fn create_loan<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        input: LoanInput,
        today: NaiveDate,
    ) -> Result<LoanAggregate, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let schedule = schedule::generate(&input.schedule_request())?;

        let mut tx = executor.begin().await?;

        self.ensure_client_can_borrow(&mut *tx, tenant_id, input.client_id).await?;

        let agg = new_aggregate(tenant_id, &input, &schedule, today);
        self.loans.save_aggregate(&mut tx, &agg).await?;

        tx.commit().await?;

        tracing::info!(
            "Empréstimo {} criado: {} parcela(s), valor final {}",
            agg.loan.id, agg.loan.installment_count, agg.loan.final_amount
        );
        Ok(agg)
    }

    pub async fn edit_loan<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
        input: LoanInput,
        today: NaiveDate,
    ) -> Result<LoanAggregate, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let schedule = schedule::generate(&input.schedule_request())?;

        let mut tx = executor.begin().await?;

        let mut agg = self.loans.lock_aggregate(&mut tx, tenant_id, loan_id).await?;

        if agg.loan.client_id != input.client_id {
            self.ensure_client_can_borrow(&mut *tx, tenant_id, input.client_id).await?;
        }

        let payment_count = self.collections.count_payments_for_loan(&mut *tx, tenant_id, loan_id).await?;
        let outcome = apply_edit(&mut agg, &input, &schedule, payment_count, today)?;

        if outcome.schedule_replaced {
            self.collections.delete_for_loan(&mut *tx, tenant_id, loan_id).await?;
            self.loans.delete_installments(&mut *tx, tenant_id, loan_id).await?;
        }
        self.loans.save_aggregate(&mut tx, &agg).await?;

        tx.commit().await?;

        tracing::info!(
            "Empréstimo {} editado (cronograma regenerado: {}), status {}",
            loan_id, outcome.schedule_replaced, agg.loan.status
        );
        Ok(agg)
    }

    /// Leitura com atualização preguiçosa dos campos derivados.
    pub async fn get_loan(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loan_id: Uuid,
        today: NaiveDate,
    ) -> Result<LoanAggregate, AppError> {
        self.sync.refresh(conn, tenant_id, SyncScope::loan(loan_id), today).await?;
        self.loans.load_aggregate(conn, tenant_id, loan_id).await
    }

    pub async fn list_loans_for_client(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        client_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Loan>, AppError> {
        if self.clients.get_client(&mut *conn, tenant_id, client_id).await?.is_none() {
            return Err(AppError::not_found(format!("Cliente {}", client_id)));
        }
        self.sync.refresh(conn, tenant_id, SyncScope::client(client_id), today).await?;
        self.loans.list_for_client(&mut *conn, tenant_id, client_id).await
    }

    pub async fn list_installments(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        loan_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Installment>, AppError> {
        let agg = self.get_loan(conn, tenant_id, loan_id, today).await?;
        Ok(agg.installments)
    }

    pub async fn delete_loan<'a, A>(
        &self,
        executor: A,
        tenant_id: Uuid,
        loan_id: Uuid,
    ) -> Result<(), AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let agg = self.loans.lock_aggregate(&mut tx, tenant_id, loan_id).await?;
        let payment_count = self.collections.count_payments_for_loan(&mut *tx, tenant_id, loan_id).await?;
        ensure_deletable(&agg, payment_count)?;

        self.collections.delete_for_loan(&mut *tx, tenant_id, loan_id).await?;
        self.loans.delete_installments(&mut *tx, tenant_id, loan_id).await?;
        self.loans.delete_loan(&mut *tx, tenant_id, loan_id).await?;

        tx.commit().await?;

        tracing::info!("Empréstimo {} apagado", loan_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{collection::CollectionFilter, ledger::LedgerFilter};
    use crate::services::{
        ledger_service::LedgerService,
        payment_service,
        test_support::{build, d, input, loan_with_schedule},
    };
    use rust_decimal_macros::dec;

    fn regenerate(agg: &mut LoanAggregate, input: &LoanInput, today: NaiveDate) -> Result<EditOutcome, AppError> {
        let schedule = schedule::generate(&input.schedule_request()).unwrap();
        apply_edit(agg, input, &schedule, 0, today)
    }

    #[test]
    fn new_loan_pairs_every_installment_with_a_collection() {
        let agg = loan_with_schedule(3, d(2024, 1, 15));

        assert_eq!(agg.loan.final_amount, dec!(1100.00));
        assert_eq!(agg.loan.installment_amount, dec!(366.67));
        assert_eq!(agg.installments.len(), 3);
        assert_eq!(agg.collections.len(), 3);
        for (installment, record) in agg.installments.iter().zip(&agg.collections) {
            assert_eq!(record.installment_id, Some(installment.id));
            assert_eq!(record.original_amount, installment.amount);
            assert_eq!(record.due_date, installment.due_date);
            assert_eq!(record.loan_id, agg.loan.id);
        }
        assert_eq!(agg.loan.status, LoanStatus::Active);
    }

    #[test]
    fn fixed_loan_gets_a_single_collection_against_the_loan() {
        let agg = build(input(1, d(2024, 1, 15)), d(2024, 1, 1));
        assert!(agg.installments.is_empty());
        assert_eq!(agg.collections.len(), 1);

        let record = &agg.collections[0];
        assert_eq!(record.installment_id, None);
        assert_eq!(record.original_amount, dec!(1100.00));
        assert_eq!(record.due_date, d(2024, 1, 15));
    }

    #[test]
    fn loan_created_in_the_past_is_already_overdue() {
        let agg = build(input(3, d(2024, 1, 15)), d(2024, 2, 1));
        assert_eq!(agg.loan.status, LoanStatus::Overdue);
        assert_eq!(agg.installments[0].status, InstallmentStatus::Late);
        assert_eq!(agg.collections[0].days_late, 17);
    }

    #[test]
    fn edit_with_same_count_updates_in_place() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        let ids: Vec<_> = agg.installments.iter().map(|i| i.id).collect();

        let mut changed = input(3, d(2024, 1, 20));
        changed.pricing = Pricing::InitialValue { interest_rate: dec!(20) };
        let outcome = regenerate(&mut agg, &changed, d(2024, 1, 10)).unwrap();

        assert!(!outcome.schedule_replaced);
        assert_eq!(agg.installments.iter().map(|i| i.id).collect::<Vec<_>>(), ids);
        assert_eq!(agg.loan.final_amount, dec!(1200.00));
        let amounts: Vec<_> = agg.installments.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![dec!(400.00), dec!(400.00), dec!(400.00)]);
        assert_eq!(agg.installments[2].due_date, d(2024, 3, 20));
        assert_eq!(agg.collections[2].original_amount, dec!(400.00));
        assert_eq!(agg.collections[2].due_date, d(2024, 3, 20));
    }

    #[test]
    fn edit_with_new_count_regenerates_schedule() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        let old_ids: Vec<_> = agg.installments.iter().map(|i| i.id).collect();

        let outcome = regenerate(&mut agg, &input(5, d(2024, 2, 1)), d(2024, 1, 10)).unwrap();

        assert!(outcome.schedule_replaced);
        assert_eq!(agg.installments.len(), 5);
        assert_eq!(agg.collections.len(), 5);
        assert!(agg.installments.iter().all(|i| !old_ids.contains(&i.id)));
        assert_eq!(agg.installments[0].due_date, d(2024, 2, 1));
        assert_eq!(agg.loan.installment_count, 5);
        let total: Decimal = agg.installments.iter().map(|i| i.amount).sum();
        assert_eq!(total, agg.loan.final_amount);
    }

    #[test]
    fn edit_from_installments_to_fixed_drops_the_schedule() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        regenerate(&mut agg, &input(1, d(2024, 3, 1)), d(2024, 1, 10)).unwrap();

        assert!(agg.installments.is_empty());
        assert_eq!(agg.collections.len(), 1);
        assert_eq!(agg.collections[0].installment_id, None);
        assert_eq!(agg.collections[0].due_date, d(2024, 3, 1));
    }

    #[test]
    fn changing_count_with_paid_history_is_a_conflict() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        agg.installments[0].status = InstallmentStatus::Paid;

        let err = regenerate(&mut agg, &input(4, d(2024, 1, 15)), d(2024, 1, 10)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(agg.installments.len(), 3);
    }

    #[test]
    fn edit_keeps_paid_installment_due_dates() {
        let mut agg = loan_with_schedule(2, d(2024, 1, 15));
        agg.installments[0].status = InstallmentStatus::Paid;

        regenerate(&mut agg, &input(2, d(2024, 1, 25)), d(2024, 1, 10)).unwrap();
        assert_eq!(agg.installments[0].due_date, d(2024, 1, 15));
        assert_eq!(agg.installments[1].due_date, d(2024, 2, 25));
    }

    #[test]
    fn edit_never_lifts_a_cancellation() {
        let mut agg = loan_with_schedule(2, d(2024, 1, 15));
        agg.loan.status = LoanStatus::Cancelled;

        let mut changed = input(2, d(2024, 1, 15));
        changed.status = Some(LoanStatus::Active);
        regenerate(&mut agg, &changed, d(2024, 1, 10)).unwrap();
        assert_eq!(agg.loan.status, LoanStatus::Cancelled);
    }

    #[test]
    fn settled_fixed_loan_survives_an_edit() {
        let mut agg = build(input(1, d(2024, 1, 15)), d(2024, 1, 1));
        agg.loan.status = LoanStatus::Settled;

        regenerate(&mut agg, &input(1, d(2024, 1, 15)), d(2024, 2, 1)).unwrap();
        assert_eq!(agg.loan.status, LoanStatus::Settled);
    }

    #[test]
    fn settled_hint_on_new_fixed_loan_closes_its_collection() {
        let mut settled = input(1, d(2024, 1, 15));
        settled.status = Some(LoanStatus::Settled);
        let today = d(2024, 3, 1);
        let agg = build(settled, today);

        assert_eq!(agg.loan.status, LoanStatus::Settled);
        let record = agg.loan_collection().unwrap();
        assert_eq!(record.status, CollectionStatus::Paid);
        assert_eq!(record.paid_on, Some(today));
        assert_eq!(record.days_late, 0);
    }

    #[test]
    fn settled_hint_on_edit_closes_fixed_collection() {
        let mut agg = build(input(1, d(2024, 1, 15)), d(2024, 1, 1));

        let mut settled = input(1, d(2024, 1, 15));
        settled.status = Some(LoanStatus::Settled);
        let today = d(2024, 3, 1);
        regenerate(&mut agg, &settled, today).unwrap();

        assert_eq!(agg.loan.status, LoanStatus::Settled);
        let record = agg.loan_collection().unwrap();
        assert_eq!(record.status, CollectionStatus::Paid);
        assert_eq!(record.days_late, 0);
    }

    #[test]
    fn active_hint_reopens_settled_fixed_loan_with_new_terms() {
        let mut settled = input(1, d(2024, 1, 15));
        settled.status = Some(LoanStatus::Settled);
        let mut agg = build(settled, d(2024, 1, 10));

        let mut reopened = input(1, d(2024, 2, 15));
        reopened.pricing = Pricing::InitialValue { interest_rate: dec!(20) };
        reopened.status = Some(LoanStatus::Active);
        regenerate(&mut agg, &reopened, d(2024, 2, 1)).unwrap();

        assert_eq!(agg.loan.status, LoanStatus::Active);
        let record = agg.loan_collection().unwrap();
        assert_eq!(record.status, CollectionStatus::Pending);
        assert_eq!(record.paid_on, None);
        assert_eq!(record.original_amount, dec!(1200.00));
        assert_eq!(record.due_date, d(2024, 2, 15));
    }

    #[test]
    fn manual_missed_mark_survives_an_in_place_edit() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        let today = d(2024, 1, 10);
        payment_service::mark_missed(&mut agg, 2, today).unwrap();
        assert_eq!(agg.loan.status, LoanStatus::Overdue);

        regenerate(&mut agg, &input(3, d(2024, 1, 15)), today).unwrap();

        assert_eq!(agg.installments[1].status, InstallmentStatus::Late);
        assert_eq!(agg.loan.status, LoanStatus::Overdue);
    }

    #[test]
    fn moving_date_late_installment_forward_clears_arrears() {
        let mut agg = loan_with_schedule(2, d(2024, 1, 15));
        let today = d(2024, 1, 20);
        collection_sync::synchronize(&mut agg, today);
        assert_eq!(agg.installments[0].status, InstallmentStatus::Late);

        regenerate(&mut agg, &input(2, d(2024, 1, 25)), today).unwrap();

        assert_eq!(agg.installments[0].status, InstallmentStatus::Pending);
        assert_eq!(agg.collections[0].days_late, 0);
        assert_eq!(agg.loan.status, LoanStatus::Active);
    }

    // Os handlers do axum exigem futures `Send`; basta compilar.
    #[allow(dead_code)]
    fn read_paths_are_send(
        loans: &LoanService,
        sync: &CollectionSyncService,
        ledger: &LedgerService,
        conn: &mut PgConnection,
    ) {
        fn is_send<T: Send>(_: T) {}

        let (id, today) = (Uuid::nil(), d(2024, 1, 1));
        let (collections, summary) = (CollectionFilter::default(), LedgerFilter::default());

        is_send(loans.get_loan(&mut *conn, id, id, today));
        is_send(loans.list_loans_for_client(&mut *conn, id, id, today));
        is_send(loans.list_installments(&mut *conn, id, id, today));
        is_send(sync.refresh(&mut *conn, id, SyncScope::loan(id), today));
        is_send(sync.list_collections(&mut *conn, id, &collections, today));
        is_send(sync.list_payments(&mut *conn, id, id));
        is_send(ledger.get_summary(&mut *conn, id, &summary, today));
    }

    #[test]
    fn delete_is_blocked_by_payment_history() {
        let mut agg = loan_with_schedule(2, d(2024, 1, 15));
        assert!(ensure_deletable(&agg, 0).is_ok());
        assert!(matches!(ensure_deletable(&agg, 1), Err(AppError::Conflict(_))));

        agg.installments[1].status = InstallmentStatus::Paid;
        assert!(matches!(ensure_deletable(&agg, 0), Err(AppError::Conflict(_))));
    }
}
