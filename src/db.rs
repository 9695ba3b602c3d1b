pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod collection_repo;
pub use collection_repo::CollectionRepository;
pub mod loan_repo;
pub use loan_repo::LoanRepository;
