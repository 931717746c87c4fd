pub mod store;
pub use store::{ContractPatch, ContractStore, SignatureWrite};
pub mod contract_repo;
pub use contract_repo::ContractRepository;
pub mod memory_store;
pub use memory_store::InMemoryContractStore;
pub mod object_store;
pub use object_store::{LocalObjectStore, ObjectStore};
