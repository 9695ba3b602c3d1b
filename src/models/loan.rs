// src/models/loan.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use sqlx::FromRow;
use uuid::Uuid;

use super::collection::CollectionRecord;
use super::labelled_status;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_status")]
#[serde(try_from = "String", into = "&'static str")]
pub enum LoanStatus {
    #[sqlx(rename = "Ativo")]
    Active,
    #[sqlx(rename = "Atrasado")]
    Overdue,
    #[sqlx(rename = "Quitado")]
    Settled,
    #[sqlx(rename = "Cancelado")]
    Cancelled,
}

labelled_status!(LoanStatus {
    Active => "Ativo",
    Overdue => "Atrasado",
    Settled => "Quitado",
    Cancelled => "Cancelado",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "installment_status")]
#[serde(try_from = "String", into = "&'static str")]
pub enum InstallmentStatus {
    #[sqlx(rename = "Pendente")]
    Pending,
    #[sqlx(rename = "Paga")]
    Paid,
    #[sqlx(rename = "Atrasada")]
    Late,
}

labelled_status!(InstallmentStatus {
    Pending => "Pendente",
    Paid => "Paga",
    Late => "Atrasada",
});

/// Qual dos valores (principal, final, parcela) foi informado pelo operador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "calculation_mode")]
pub enum CalculationMode {
    #[sqlx(rename = "valor_inicial")]
    #[serde(rename = "valor_inicial")]
    InitialValue,
    #[sqlx(rename = "valor_final")]
    #[serde(rename = "valor_final")]
    FinalValue,
    #[sqlx(rename = "parcela_fixa")]
    #[serde(rename = "parcela_fixa")]
    FixedInstallment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

/// O valor "fixado" de cada modo de cálculo. Os outros dois são sempre derivados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "calculationMode")]
pub enum Pricing {
    /// Juros sobre o principal: final = principal * (1 + taxa/100)
    #[serde(rename = "valor_inicial")]
    InitialValue {
        #[serde(rename = "interestRate")]
        interest_rate: Decimal,
    },
    /// Valor final combinado com o cliente
    #[serde(rename = "valor_final")]
    FinalValue {
        #[serde(rename = "finalAmount")]
        final_amount: Decimal,
    },
    /// Valor da parcela combinado com o cliente
    #[serde(rename = "parcela_fixa")]
    FixedInstallment {
        #[serde(rename = "installmentAmount")]
        installment_amount: Decimal,
    },
}

impl Pricing {
    pub fn mode(&self) -> CalculationMode {
        match self {
            Pricing::InitialValue { .. } => CalculationMode::InitialValue,
            Pricing::FinalValue { .. } => CalculationMode::FinalValue,
            Pricing::FixedInstallment { .. } => CalculationMode::FixedInstallment,
        }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,

    // Valores
    pub principal: Decimal,
    pub interest_rate: Decimal, // % ao mês (derivada nos modos valor_final / parcela_fixa)
    pub late_penalty_rate: Decimal,
    pub calculation_mode: CalculationMode,
    pub installment_count: i32,
    pub frequency: Frequency,
    pub installment_amount: Decimal,
    pub final_amount: Decimal,

    // Datas
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate, // primeiro (ou único) vencimento

    pub notes: Option<String>,
    pub status: LoanStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Empréstimo com parcelas (N > 1). Com N = 1 é um empréstimo "fixo", com uma única cobrança.
    pub fn has_schedule(&self) -> bool {
        self.installment_count > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub loan_id: Uuid,
    pub sequence: i32, // 1..=N
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub amount_paid: Option<Decimal>,
    pub paid_on: Option<NaiveDate>,
}

impl Installment {
    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }
}

/// Um empréstimo com tudo que depende dele. É a unidade de travamento e de gravação.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanAggregate {
    pub loan: Loan,
    pub installments: Vec<Installment>,
    pub collections: Vec<CollectionRecord>,
}

impl LoanAggregate {
    pub fn installment(&self, sequence: i32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.sequence == sequence)
    }

    pub fn installment_mut(&mut self, sequence: i32) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.sequence == sequence)
    }

    /// Cobrança pareada com a parcela.
    pub fn collection_for_mut(&mut self, installment_id: Uuid) -> Option<&mut CollectionRecord> {
        self.collections
            .iter_mut()
            .find(|c| c.installment_id == Some(installment_id))
    }

    /// Cobrança única de um empréstimo fixo.
    pub fn loan_collection_mut(&mut self) -> Option<&mut CollectionRecord> {
        self.collections.iter_mut().find(|c| c.installment_id.is_none())
    }

    pub fn loan_collection(&self) -> Option<&CollectionRecord> {
        self.collections.iter().find(|c| c.installment_id.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn installment_goes_out_in_camel_case_with_labels() {
        let installment = Installment {
            id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            loan_id: Uuid::nil(),
            sequence: 2,
            amount: dec!(366.67),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            status: InstallmentStatus::Paid,
            amount_paid: Some(dec!(366.67)),
            paid_on: NaiveDate::from_ymd_opt(2024, 2, 10),
        };
        assert!(installment.is_paid());

        let json = serde_json::to_value(&installment).unwrap();
        assert_eq!(json["status"], "Paga");
        assert_eq!(json["sequence"], 2);
        assert_eq!(json["dueDate"], "2024-02-15");
        assert_eq!(json["paidOn"], "2024-02-10");
        assert!(json.get("amountPaid").is_some());
        assert!(json.get("loanId").is_some());
    }

    #[test]
    fn status_labels_are_read_in_any_case() {
        let late: InstallmentStatus = serde_json::from_value(serde_json::json!("ATRASADA")).unwrap();
        assert_eq!(late, InstallmentStatus::Late);

        let settled: LoanStatus = serde_json::from_value(serde_json::json!("quitado")).unwrap();
        assert_eq!(settled, LoanStatus::Settled);
        assert!(serde_json::from_value::<LoanStatus>(serde_json::json!("Vencido")).is_err());
    }
}
