pub mod collections;
pub mod installments;
pub mod ledger;
pub mod loans;
