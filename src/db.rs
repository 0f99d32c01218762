pub mod contract_store;
pub use contract_store::ContractStore;
pub mod contract_repo;
pub use contract_repo::PgContractRepository;
pub mod memory_store;
pub use memory_store::InMemoryContractStore;
