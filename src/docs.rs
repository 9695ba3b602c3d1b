// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Empréstimos ---
        handlers::loans::create_loan,
        handlers::loans::list_loans,
        handlers::loans::get_loan,
        handlers::loans::edit_loan,
        handlers::loans::delete_loan,
        handlers::loans::list_installments,
        handlers::loans::list_payments,
        handlers::loans::set_loan_status,
        handlers::loans::settle_loan,
        handlers::loans::roll_over_loan,
        handlers::loans::revert_to_overdue,

        // --- Parcelas ---
        handlers::installments::pay_installment,
        handlers::installments::set_installment_status,
        handlers::installments::set_installment_due_date,
        handlers::installments::mark_missed,

        // --- Cobranças ---
        handlers::collections::list_collections,
        handlers::collections::set_collection_charges,

        // --- Carteira ---
        handlers::ledger::get_summary,
    ),
    components(
        schemas(
            models::loan::LoanStatus,
            models::loan::InstallmentStatus,
            models::loan::CalculationMode,
            models::loan::Frequency,
            models::loan::Pricing,
            models::loan::Loan,
            models::loan::Installment,
            models::loan::LoanAggregate,
            models::collection::CollectionStatus,
            models::collection::PaymentMethod,
            models::collection::CollectionRecord,
            models::collection::Payment,
            models::ledger::StatusTotals,
            models::ledger::LedgerSummary,
            services::payment_service::PaymentOutcome,

            // --- Payloads ---
            handlers::loans::LoanPayload,
            handlers::loans::SetLoanStatusPayload,
            handlers::loans::SettlementPayload,
            handlers::installments::PaymentPayload,
            handlers::installments::SetInstallmentStatusPayload,
            handlers::installments::DueDatePayload,
            handlers::collections::CollectionChargesPayload,
        )
    ),
    tags(
        (name = "Loans", description = "Empréstimos, quitação e renovação"),
        (name = "Installments", description = "Pagamento e ajustes de parcelas"),
        (name = "Collections", description = "Contas a receber"),
        (name = "Ledger", description = "Resumo da carteira")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/loans",
            "/api/loans/{loan_id}",
            "/api/loans/{loan_id}/settlement",
            "/api/loans/{loan_id}/installments/{sequence}/payment",
            "/api/collections/{collection_id}/charges",
            "/api/ledger/summary",
        ] {
            assert!(doc.paths.paths.contains_key(path), "rota sem documentação: {}", path);
        }
    }
}
