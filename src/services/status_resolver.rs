// src/services/status_resolver.rs

use chrono::NaiveDate;

use crate::models::loan::{Installment, InstallmentStatus, Loan, LoanStatus};

/// Status canônico de um empréstimo, derivado das parcelas e da data de hoje.
///
/// Função pura e idempotente: quem chama é responsável por gravar o resultado.
/// Painéis, listagens e mutações usam todos esta mesma função.
pub fn resolve(loan: &Loan, installments: &[Installment], today: NaiveDate) -> LoanStatus {
    resolve_from(loan.status, loan.due_date, installments, today)
}

/// Igual a [`resolve`], usando o status informado pelo operador numa edição como ponto de partida.
/// Cancelado só sai por um "descancelar" explícito, nunca por edição.
pub fn resolve_with_hint(
    loan: &Loan,
    hint: Option<LoanStatus>,
    installments: &[Installment],
    today: NaiveDate,
) -> LoanStatus {
    if loan.status == LoanStatus::Cancelled {
        return LoanStatus::Cancelled;
    }
    let starting_point = hint.unwrap_or(loan.status);
    resolve_from(starting_point, loan.due_date, installments, today)
}

fn resolve_from(
    current: LoanStatus,
    due_date: NaiveDate,
    installments: &[Installment],
    today: NaiveDate,
) -> LoanStatus {
    if current == LoanStatus::Cancelled {
        return LoanStatus::Cancelled;
    }

    // Empréstimo fixo (vencimento único)
    if installments.is_empty() {
        return match current {
            LoanStatus::Settled => LoanStatus::Settled,
            LoanStatus::Overdue => LoanStatus::Overdue,
            _ if due_date < today => LoanStatus::Overdue,
            _ => LoanStatus::Active,
        };
    }

    let total = installments.len();
    let paid = installments.iter().filter(|i| i.is_paid()).count();
    let late = installments.iter().filter(|i| is_late(i, today)).count();

    if paid == total {
        LoanStatus::Settled
    } else if late > 0 {
        LoanStatus::Overdue
    } else {
        LoanStatus::Active
    }
}

/// Parcela em atraso: não paga e vencida, ou marcada manualmente como Atrasada.
pub fn is_late(installment: &Installment, today: NaiveDate) -> bool {
    match installment.status {
        InstallmentStatus::Paid => false,
        InstallmentStatus::Late => true,
        InstallmentStatus::Pending => installment.due_date < today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{d, fixed_loan, loan_with_schedule};

    #[test]
    fn fixed_loan_follows_due_date() {
        let agg = fixed_loan(d(2024, 3, 10));
        assert_eq!(resolve(&agg.loan, &[], d(2024, 3, 10)), LoanStatus::Active);
        assert_eq!(resolve(&agg.loan, &[], d(2024, 3, 11)), LoanStatus::Overdue);
    }

    #[test]
    fn fixed_loan_keeps_operator_settlement() {
        let mut agg = fixed_loan(d(2024, 3, 10));
        agg.loan.status = LoanStatus::Settled;
        assert_eq!(resolve(&agg.loan, &[], d(2025, 1, 1)), LoanStatus::Settled);
    }

    #[test]
    fn past_due_pending_installment_means_overdue() {
        let agg = loan_with_schedule(3, d(2024, 1, 15));
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 1, 15)), LoanStatus::Active);
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 1, 16)), LoanStatus::Overdue);
    }

    #[test]
    fn paying_the_late_installment_clears_arrears() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        let today = d(2024, 1, 20);
        agg.installments[0].status = InstallmentStatus::Paid;
        assert_eq!(resolve(&agg.loan, &agg.installments, today), LoanStatus::Active);

        for installment in agg.installments.iter_mut() {
            installment.status = InstallmentStatus::Paid;
        }
        assert_eq!(resolve(&agg.loan, &agg.installments, today), LoanStatus::Settled);
    }

    #[test]
    fn settled_only_when_every_installment_is_paid() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        agg.loan.status = LoanStatus::Settled;
        agg.installments[0].status = InstallmentStatus::Paid;
        agg.installments[1].status = InstallmentStatus::Paid;

        // Quitado gravado por engano é rebaixado
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 1, 1)), LoanStatus::Active);
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 4, 1)), LoanStatus::Overdue);
    }

    #[test]
    fn manually_late_installment_counts_before_due_date() {
        let mut agg = loan_with_schedule(2, d(2024, 5, 1));
        agg.installments[1].status = InstallmentStatus::Late;
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 4, 1)), LoanStatus::Overdue);
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut agg = loan_with_schedule(2, d(2024, 1, 1));
        agg.loan.status = LoanStatus::Cancelled;
        for installment in agg.installments.iter_mut() {
            installment.status = InstallmentStatus::Paid;
        }
        assert_eq!(resolve(&agg.loan, &agg.installments, d(2024, 6, 1)), LoanStatus::Cancelled);
        assert_eq!(
            resolve_with_hint(&agg.loan, Some(LoanStatus::Active), &agg.installments, d(2024, 6, 1)),
            LoanStatus::Cancelled
        );
    }

    #[test]
    fn hint_is_overridden_by_installment_facts() {
        let agg = loan_with_schedule(2, d(2024, 1, 1));
        let today = d(2024, 1, 10);
        assert_eq!(
            resolve_with_hint(&agg.loan, Some(LoanStatus::Settled), &agg.installments, today),
            LoanStatus::Overdue
        );
        assert_eq!(
            resolve_with_hint(&agg.loan, Some(LoanStatus::Cancelled), &agg.installments, today),
            LoanStatus::Cancelled
        );
    }

    #[test]
    fn hint_settles_a_fixed_loan() {
        let agg = fixed_loan(d(2024, 1, 1));
        assert_eq!(
            resolve_with_hint(&agg.loan, Some(LoanStatus::Settled), &[], d(2024, 2, 1)),
            LoanStatus::Settled
        );
    }

    #[test]
    fn resolving_twice_gives_the_same_answer() {
        let mut agg = loan_with_schedule(3, d(2024, 1, 15));
        let today = d(2024, 2, 20);
        let first = resolve(&agg.loan, &agg.installments, today);
        agg.loan.status = first;
        assert_eq!(resolve(&agg.loan, &agg.installments, today), first);
    }
}
