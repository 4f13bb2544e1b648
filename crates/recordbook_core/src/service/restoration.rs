//! Restoration mutator.
//!
//! # Responsibility
//! - Correct historical `deleted` flags of a folder after its deletion was
//!   undone, so point-in-time reads stop reporting a stale deletion.
//!
//! # Invariants
//! - Only the snapshot `deleted` flag changes; revision type, number and every
//!   other snapshot field stay as recorded.
//! - All corrections for one folder commit together or not at all.

use crate::error::LedgerResult;
use crate::model::entity::{EntityId, EntityType};
use crate::model::revision::RevisionType;
use crate::repo::filter::RevisionPredicate;
use crate::repo::ledger_repo::{LedgerAccessor, RawUpdate, RevisionQuery};
use crate::repo::store::{Transactional, TxMode};
use log::info;

/// Mutator over a ledger accessor.
pub struct RestorationMutator<S: LedgerAccessor + Transactional> {
    store: S,
}

impl<S: LedgerAccessor + Transactional> RestorationMutator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Clears the `deleted` flag on every folder revision that recorded the
    /// reversed deletion and returns the number of corrected revisions.
    ///
    /// Targets `Modified` and `Deleted` revisions whose snapshot says
    /// `deleted = true`; `Created` revisions are never touched.
    pub fn restore_folder(&self, folder_id: EntityId) -> LedgerResult<usize> {
        let stale = RevisionQuery::for_entity(EntityType::Folder, folder_id).matching(
            RevisionPredicate {
                revision_types: vec![RevisionType::Modified, RevisionType::Deleted],
                snapshot_deleted: Some(true),
                ..RevisionPredicate::default()
            },
        );

        let updated = self.store.in_transaction(TxMode::Write, || {
            let mut updated = 0;
            for revision in self.store.query(&stale)?.items {
                updated += self
                    .store
                    .raw_update(&RawUpdate::ClearDeletedFlag(revision.key()))?;
            }
            Ok(updated)
        })?;

        info!(
            "event=folder_restored module=restoration status=ok folder_id={} updated={}",
            folder_id, updated
        );
        Ok(updated)
    }
}
