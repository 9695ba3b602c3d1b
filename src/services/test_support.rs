// Construtores compartilhados pelos testes do motor.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::{
    models::loan::{Frequency, LoanAggregate, Pricing},
    services::{loan_service::{new_aggregate, LoanInput}, schedule},
};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn tenant() -> Uuid {
    Uuid::from_u128(0x7e57)
}

pub fn input(installment_count: u32, first_due_date: NaiveDate) -> LoanInput {
    LoanInput {
        client_id: Uuid::from_u128(0xc1),
        principal: dec!(1000),
        pricing: Pricing::InitialValue { interest_rate: dec!(10) },
        installment_count,
        frequency: Frequency::Monthly,
        loan_date: first_due_date,
        first_due_date,
        late_penalty_rate: dec!(2),
        notes: None,
        status: None,
    }
}

/// Empréstimo de 1000 a 10% em `count` parcelas mensais, criado no dia do primeiro vencimento.
pub fn loan_with_schedule(count: u32, first_due_date: NaiveDate) -> LoanAggregate {
    build(input(count, first_due_date), first_due_date)
}

/// Empréstimo fixo de 1000 a 10% (uma cobrança de 1100).
pub fn fixed_loan(due_date: NaiveDate) -> LoanAggregate {
    build(input(1, due_date), due_date)
}

pub fn build(input: LoanInput, today: NaiveDate) -> LoanAggregate {
    let schedule = schedule::generate(&input.schedule_request()).unwrap();
    new_aggregate(tenant(), &input, &schedule, today)
}
