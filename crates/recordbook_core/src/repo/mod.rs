//! Accessor contracts and their SQLite implementation.
//!
//! # Responsibility
//! - Define the ledger and containment access seams services are generic over.
//! - Isolate SQLite query details from the revision services.
//!
//! # Invariants
//! - Accessors never open a transaction of their own for reads; services
//!   scope one transaction per public operation through `Transactional`.
//! - Accessors return semantic errors (`InvalidArgument`, `InvalidData`) in
//!   addition to store faults.

pub mod containment_repo;
pub mod filter;
pub mod ledger_repo;
pub mod store;
