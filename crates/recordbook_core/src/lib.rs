//! Revision ledger core for the record book.
//!
//! Answers historical questions over per-entity revision history, finds
//! restorable deleted items, repairs history after a folder restore, prunes
//! old revisions and locates lifecycle boundaries.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod settings;

pub use db::{open_db, open_db_in_memory, open_db_with_settings, BootstrapError, BootstrapResult};
pub use error::{LedgerError, LedgerResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::containment::ContainmentEdge;
pub use model::entity::{Entity, EntityId, EntityType, UserId};
pub use model::page::Page;
pub use model::revision::{
    EntityChange, Revision, RevisionKey, RevisionNumber, RevisionType, Snapshot,
};
pub use repo::containment_repo::{ContainmentAccessor, DeletedEdgeQuery, DeletedItemOrder};
pub use repo::filter::{RevisionFilter, RevisionPredicate};
pub use repo::ledger_repo::{
    LedgerAccessor, RawUpdate, RevisionOrder, RevisionQuery, SnapshotTable,
};
pub use repo::store::{SqliteStore, Transactional, TxMode};
pub use service::deletion_recovery::{
    DeletedItem, DeletedItemsQuery, DeletionRecoveryFinder, PermissionOracle,
};
pub use service::lifecycle::{LifecycleScanner, FINDABLE_STATE};
pub use service::restoration::RestorationMutator;
pub use service::retention::{CompactionReport, RetentionCompactor};
pub use service::revision_query::RevisionQueryEngine;
pub use settings::LedgerSettings;

