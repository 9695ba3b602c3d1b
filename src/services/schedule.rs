// src/services/schedule.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    common::{calendar, error::AppError, money},
    models::loan::{Frequency, Pricing},
};

#[derive(Debug, Clone, Copy)]
pub struct ScheduleRequest {
    pub principal: Decimal,
    pub pricing: Pricing,
    pub installment_count: u32,
    pub frequency: Frequency,
    pub first_due_date: NaiveDate,
}

/// Valores derivados do modo de cálculo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    pub principal: Decimal,
    pub interest_rate: Decimal,
    pub installment_amount: Decimal,
    pub final_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledInstallment {
    pub sequence: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub terms: LoanTerms,
    /// Vazio para empréstimo fixo (N = 1): a cobrança é feita direto contra o empréstimo.
    pub installments: Vec<ScheduledInstallment>,
}

/// Calcula valor final, valor da parcela e taxa (efetiva) a partir do valor fixado.
pub fn compute_terms(
    principal: Decimal,
    pricing: Pricing,
    installment_count: u32,
) -> Result<LoanTerms, AppError> {
    if principal <= Decimal::ZERO {
        return Err(AppError::validation("O valor emprestado deve ser maior que zero."));
    }
    if installment_count == 0 {
        return Err(AppError::validation("O número de parcelas deve ser ao menos 1."));
    }

    let principal = money::round_money(principal);
    let count = Decimal::from(installment_count);

    let terms = match pricing {
        Pricing::InitialValue { interest_rate } => {
            if interest_rate < Decimal::ZERO {
                return Err(AppError::validation("A taxa de juros não pode ser negativa."));
            }
            let final_amount = if interest_rate > Decimal::ZERO {
                money::with_rate(principal, interest_rate)
            } else {
                principal
            };
            LoanTerms {
                principal,
                interest_rate,
                installment_amount: money::round_money(final_amount / count),
                final_amount,
            }
        }
        Pricing::FinalValue { final_amount } => {
            if final_amount <= Decimal::ZERO {
                return Err(AppError::validation("O valor final deve ser maior que zero."));
            }
            let final_amount = money::round_money(final_amount);
            LoanTerms {
                principal,
                interest_rate: money::effective_rate(principal, final_amount),
                installment_amount: money::round_money(final_amount / count),
                final_amount,
            }
        }
        Pricing::FixedInstallment { installment_amount } => {
            if installment_amount <= Decimal::ZERO {
                return Err(AppError::validation("O valor da parcela deve ser maior que zero."));
            }
            let installment_amount = money::round_money(installment_amount);
            let final_amount = installment_amount * count;
            LoanTerms {
                principal,
                interest_rate: money::effective_rate(principal, final_amount),
                installment_amount,
                final_amount,
            }
        }
    };

    Ok(terms)
}

/// Gera o cronograma de parcelas. A soma das parcelas é exatamente o valor final:
/// o resto do arredondamento vai para a última.
pub fn generate(request: &ScheduleRequest) -> Result<Schedule, AppError> {
    let terms = compute_terms(request.principal, request.pricing, request.installment_count)?;

    if request.installment_count == 1 {
        return Ok(Schedule {
            terms,
            installments: Vec::new(),
        });
    }

    let amounts = money::split_with_remainder_last(terms.final_amount, request.installment_count)
        .ok_or_else(|| {
            AppError::validation(format!(
                "O valor final {} é pequeno demais para {} parcelas.",
                terms.final_amount, request.installment_count
            ))
        })?;

    let installments = amounts
        .into_iter()
        .enumerate()
        .map(|(index, amount)| {
            let steps = index as u32;
            let due_date = calendar::advance(request.first_due_date, request.frequency, steps)
                .ok_or_else(|| AppError::validation("Data de vencimento fora do calendário."))?;
            Ok(ScheduledInstallment {
                sequence: steps as i32 + 1,
                amount,
                due_date,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Schedule { terms, installments })
}
