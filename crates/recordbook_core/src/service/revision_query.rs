//! Revision query engine.
//!
//! # Responsibility
//! - Answer latest / exact / windowed / point-in-time revision queries for
//!   one entity.
//! - Degrade malformed caller filters to an empty page.
//!
//! # Invariants
//! - Default ordering is revision number descending.
//! - `windowed` computes its count and its page from one compiled filter
//!   inside one read transaction.
//! - Absent revisions are `None`, never an error.

use crate::error::{LedgerError, LedgerResult};
use crate::model::entity::{EntityId, EntityType};
use crate::model::page::Page;
use crate::model::revision::{Revision, RevisionNumber};
use crate::repo::filter::{RevisionFilter, RevisionPredicate};
use crate::repo::ledger_repo::{LedgerAccessor, RevisionOrder, RevisionQuery};
use crate::repo::store::{Transactional, TxMode};
use log::{info, warn};

/// Query facade over a ledger accessor.
pub struct RevisionQueryEngine<S: LedgerAccessor + Transactional> {
    store: S,
}

impl<S: LedgerAccessor + Transactional> RevisionQueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the revision with the highest number for one entity.
    ///
    /// An entity id without revisions is a caller-side logic error; it is
    /// logged and reported as `None`.
    pub fn latest(&self, entity_type: EntityType, id: EntityId) -> LedgerResult<Option<Revision>> {
        self.store
            .in_transaction(TxMode::Read, || latest_revision(&self.store, entity_type, id))
    }

    /// Returns the revision with exactly this number, if it still exists.
    pub fn at(
        &self,
        entity_type: EntityType,
        id: EntityId,
        number: RevisionNumber,
    ) -> LedgerResult<Option<Revision>> {
        let query = RevisionQuery::for_entity(entity_type, id)
            .matching(RevisionPredicate {
                number: Some(number),
                ..RevisionPredicate::default()
            })
            .window(0, Some(1));
        let page = self
            .store
            .in_transaction(TxMode::Read, || self.store.query(&query))?;
        Ok(page.items.into_iter().next())
    }

    /// Returns the most recent revision recorded at or before `timestamp_ms`.
    pub fn as_of(
        &self,
        entity_type: EntityType,
        id: EntityId,
        timestamp_ms: i64,
    ) -> LedgerResult<Option<Revision>> {
        let query = RevisionQuery::for_entity(entity_type, id)
            .matching(RevisionPredicate {
                to_ms: Some(timestamp_ms),
                ..RevisionPredicate::default()
            })
            .window(0, Some(1));
        let page = self
            .store
            .in_transaction(TxMode::Read, || self.store.query(&query))?;
        Ok(page.items.into_iter().next())
    }

    /// Returns one filtered window of revisions, newest first, with the
    /// total number of revisions matching the same filter.
    ///
    /// A malformed filter is logged and yields an empty page. A `limit` of
    /// zero returns no items, only the total.
    pub fn windowed(
        &self,
        entity_type: EntityType,
        id: EntityId,
        filter: &RevisionFilter,
        offset: u32,
        limit: u32,
    ) -> LedgerResult<Page<Revision>> {
        let predicate = match filter.to_predicate() {
            Ok(predicate) => predicate,
            Err(err @ LedgerError::MalformedFilter { .. }) => {
                warn!(
                    "event=filter_rejected module=revision_query status=skip entity_type={} entity_id={} error_code={}",
                    entity_type.as_str(),
                    id,
                    err.code()
                );
                return Ok(Page::empty());
            }
            Err(err) => return Err(err),
        };

        let query = RevisionQuery::for_entity(entity_type, id)
            .matching(predicate)
            .window(offset, Some(limit));
        let page = self
            .store
            .in_transaction(TxMode::Read, || self.store.query(&query))?;

        info!(
            "event=revision_window module=revision_query status=ok entity_type={} entity_id={} offset={} limit={} returned={} total={}",
            entity_type.as_str(),
            id,
            offset,
            limit,
            page.items.len(),
            page.total_count
        );
        Ok(page)
    }

    /// Returns every revision of one entity, oldest first.
    pub fn history(&self, entity_type: EntityType, id: EntityId) -> LedgerResult<Vec<Revision>> {
        self.store
            .in_transaction(TxMode::Read, || history(&self.store, entity_type, id))
    }

    /// Returns the number of recorded revisions of one entity.
    pub fn count(&self, entity_type: EntityType, id: EntityId) -> LedgerResult<i64> {
        let query = RevisionQuery::for_entity(entity_type, id).window(0, Some(0));
        let page = self
            .store
            .in_transaction(TxMode::Read, || self.store.query(&query))?;
        Ok(page.total_count)
    }
}

/// Loads the newest revision of one entity without opening a transaction.
pub(crate) fn latest_revision<L: LedgerAccessor>(
    ledger: &L,
    entity_type: EntityType,
    id: EntityId,
) -> LedgerResult<Option<Revision>> {
    let query = RevisionQuery::for_entity(entity_type, id).window(0, Some(1));
    let latest = ledger.query(&query)?.items.into_iter().next();
    if latest.is_none() {
        warn!(
            "event=latest_missing module=revision_query status=skip entity_type={} entity_id={}",
            entity_type.as_str(),
            id
        );
    }
    Ok(latest)
}

/// Loads every revision of one entity, oldest first.
pub(crate) fn history<L: LedgerAccessor>(
    ledger: &L,
    entity_type: EntityType,
    id: EntityId,
) -> LedgerResult<Vec<Revision>> {
    let query = RevisionQuery::for_entity(entity_type, id).ordered(RevisionOrder::Ascending);
    Ok(ledger.query(&query)?.items)
}
