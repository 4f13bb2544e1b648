//! Lifecycle boundary scanner.
//!
//! Finds where an entity's current, uninterrupted run of states satisfying a
//! predicate began, e.g. since when an identifier has been continuously
//! findable.

use crate::error::LedgerResult;
use crate::model::entity::{EntityId, EntityType};
use crate::model::revision::Revision;
use crate::repo::ledger_repo::LedgerAccessor;
use crate::repo::store::{Transactional, TxMode};
use crate::service::revision_query::history;

/// Identifier state meaning "publicly resolvable".
pub const FINDABLE_STATE: &str = "findable";

/// Backward scanner over a ledger accessor.
pub struct LifecycleScanner<S: LedgerAccessor + Transactional> {
    store: S,
}

impl<S: LedgerAccessor + Transactional> LifecycleScanner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the oldest revision of the unbroken run of revisions that
    /// satisfy `predicate` and end at the latest revision.
    ///
    /// `None` when the latest revision fails `predicate` or the entity has
    /// no revisions.
    pub fn last_revision_satisfying<P>(
        &self,
        entity_type: EntityType,
        id: EntityId,
        predicate: P,
    ) -> LedgerResult<Option<Revision>>
    where
        P: Fn(&Revision) -> bool,
    {
        let revisions = self
            .store
            .in_transaction(TxMode::Read, || history(&self.store, entity_type, id))?;
        Ok(scan_back(revisions, predicate))
    }

    /// Returns the revision since which an identifier has been findable.
    pub fn findable_since(&self, identifier_id: EntityId) -> LedgerResult<Option<Revision>> {
        self.last_revision_satisfying(EntityType::Identifier, identifier_id, |revision| {
            revision.snapshot.state.as_deref() == Some(FINDABLE_STATE)
        })
    }
}

/// Walks `ascending` from newest to oldest and stops at the first failure.
fn scan_back<P>(ascending: Vec<Revision>, predicate: P) -> Option<Revision>
where
    P: Fn(&Revision) -> bool,
{
    let mut boundary = None;
    for revision in ascending.into_iter().rev() {
        if !predicate(&revision) {
            break;
        }
        boundary = Some(revision);
    }
    boundary
}
