//! Retention compactor.
//!
//! # Responsibility
//! - Bound per-entity history to the `max_to_keep` most recent revisions.
//!
//! # Invariants
//! - After compaction an entity that had more than `max_to_keep` revisions
//!   has exactly `max_to_keep` left, and they are the newest ones.
//! - Child-snapshot rows are deleted with their header, in the same
//!   transaction, before the header rows.
//! - Each entity is compacted in its own committed transaction, so a rerun
//!   after a crash only redoes unfinished entities.

use crate::error::{LedgerError, LedgerResult};
use crate::model::entity::{EntityId, EntityType};
use crate::model::revision::RevisionNumber;
use crate::repo::ledger_repo::{LedgerAccessor, RawUpdate, RevisionQuery, SnapshotTable};
use crate::repo::store::{Transactional, TxMode};
use log::{debug, info};
use std::time::Instant;

/// Outcome of one compaction run over an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionReport {
    /// Ids with at least one recorded revision.
    pub ids_scanned: usize,
    /// Ids that had more than `max_to_keep` revisions.
    pub ids_compacted: usize,
    /// Revision header rows deleted.
    pub deleted_count: usize,
    /// Child-snapshot rows deleted.
    pub child_rows_deleted: usize,
}

/// Offline history pruning over a ledger accessor.
pub struct RetentionCompactor<S: LedgerAccessor + Transactional> {
    store: S,
}

impl<S: LedgerAccessor + Transactional> RetentionCompactor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Deletes all but the `max_to_keep` newest revisions of every entity of
    /// `entity_type`. Irreversible.
    ///
    /// # Errors
    /// - `InvalidArgument` when `max_to_keep` is zero.
    /// - Any store failure aborts the run; entities already compacted stay
    ///   compacted.
    pub fn compact(
        &self,
        entity_type: EntityType,
        max_to_keep: usize,
    ) -> LedgerResult<CompactionReport> {
        if max_to_keep == 0 {
            return Err(LedgerError::InvalidArgument(
                "max_to_keep must be at least 1".to_string(),
            ));
        }
        let keep = u32::try_from(max_to_keep).map_err(|_| {
            LedgerError::InvalidArgument(format!("max_to_keep {max_to_keep} is too large"))
        })?;

        let started_at = Instant::now();
        let ids = self.store.entity_ids(entity_type)?;
        let mut report = CompactionReport {
            ids_scanned: ids.len(),
            ..CompactionReport::default()
        };

        for id in ids {
            let Some((headers, children)) = self.compact_entity(entity_type, id, keep)? else {
                continue;
            };
            report.ids_compacted += 1;
            report.deleted_count += headers;
            report.child_rows_deleted += children;
        }

        info!(
            "event=compaction module=retention status=ok entity_type={} max_to_keep={} ids_scanned={} ids_compacted={} deleted={} child_rows_deleted={} duration_ms={}",
            entity_type.as_str(),
            max_to_keep,
            report.ids_scanned,
            report.ids_compacted,
            report.deleted_count,
            report.child_rows_deleted,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Compacts one entity; `None` when it is already within bounds.
    fn compact_entity(
        &self,
        entity_type: EntityType,
        id: EntityId,
        keep: u32,
    ) -> LedgerResult<Option<(usize, usize)>> {
        self.store.in_transaction(TxMode::Write, || {
            let Some(boundary) = self.boundary(entity_type, id, keep)? else {
                return Ok(None);
            };

            let mut children = 0;
            for table in SnapshotTable::CHILDREN {
                children += self.store.raw_update(&RawUpdate::DeleteThrough {
                    table,
                    entity_type,
                    entity_id: id,
                    boundary,
                })?;
            }
            let headers = self.store.raw_update(&RawUpdate::DeleteThrough {
                table: SnapshotTable::Revisions,
                entity_type,
                entity_id: id,
                boundary,
            })?;

            debug!(
                "event=compaction_entity module=retention status=ok entity_type={} entity_id={} boundary={} deleted={} child_rows_deleted={}",
                entity_type.as_str(),
                id,
                boundary,
                headers,
                children
            );
            Ok(Some((headers, children)))
        })
    }

    /// Number of the newest revision that falls outside the kept window.
    fn boundary(
        &self,
        entity_type: EntityType,
        id: EntityId,
        keep: u32,
    ) -> LedgerResult<Option<RevisionNumber>> {
        let query = RevisionQuery::for_entity(entity_type, id).window(keep, Some(1));
        let page = self.store.query(&query)?;
        Ok(page.items.first().map(|revision| revision.number))
    }
}
