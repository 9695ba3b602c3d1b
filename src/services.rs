pub mod collection_sync;
pub mod ledger_service;
pub mod loan_service;
pub mod payment_service;
pub mod schedule;
pub mod status_resolver;

#[cfg(test)]
pub(crate) mod test_support;
