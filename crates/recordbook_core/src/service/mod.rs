//! Revision services over the accessor seams.
//!
//! # Responsibility
//! - Turn accessor calls into the public ledger operations: queries,
//!   deletion recovery, restoration, retention and lifecycle scans.
//! - Scope exactly one transaction per public operation.
//!
//! # Invariants
//! - Services are generic over `LedgerAccessor`/`ContainmentAccessor` plus
//!   `Transactional`, so any store honoring those contracts can back them.

pub mod deletion_recovery;
pub mod lifecycle;
pub mod restoration;
pub mod retention;
pub mod revision_query;
