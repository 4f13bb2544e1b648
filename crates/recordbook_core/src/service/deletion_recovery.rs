//! Deletion recovery finder.
//!
//! # Responsibility
//! - List the restorable, top-level deleted items of one user.
//! - Pair each item's latest revision with the date it left its folder.
//!
//! # Invariants
//! - Children of a deleted folder owned by the user are never listed; only
//!   the folder is. The exclusion is one level deep and ends once the
//!   folder's deletion revisions have been corrected by a restore.
//! - `total_count` is the count of matching edges and is not reduced when a
//!   page item fails to resolve.
//! - A failure resolving one item skips that item; it never fails the page.
//!   A failure counting or listing edges fails the whole call.

use crate::error::{LedgerError, LedgerResult};
use crate::model::containment::ContainmentEdge;
use crate::model::entity::{EntityId, EntityType, UserId};
use crate::model::page::Page;
use crate::model::revision::Revision;
use crate::repo::containment_repo::{ContainmentAccessor, DeletedEdgeQuery, DeletedItemOrder};
use crate::repo::ledger_repo::LedgerAccessor;
use crate::repo::store::{Transactional, TxMode};
use crate::service::revision_query::latest_revision;
use crate::settings::LedgerSettings;
use log::{info, warn};

/// Request for one page of deleted items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedItemsQuery {
    pub user: UserId,
    /// Case-insensitive name substring; blank matches all.
    pub name_filter: String,
    /// `name` or `deletedDate`; `None` sorts by deletion date.
    pub order_by: Option<String>,
    /// Sort ascending; the default is descending (most recent deletions first).
    pub ascending: bool,
    pub offset: u32,
    /// `None` or `0` selects the configured default page size.
    pub limit: Option<u32>,
}

/// One restorable item: its point-in-time view plus the deletion date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedItem {
    pub revision: Revision,
    pub parent_folder_id: EntityId,
    pub deleted_date: Option<i64>,
}

impl DeletedItem {
    pub fn entity_type(&self) -> EntityType {
        self.revision.entity_type
    }

    pub fn entity_id(&self) -> EntityId {
        self.revision.entity_id
    }

    pub fn name(&self) -> &str {
        &self.revision.snapshot.name
    }
}

/// Read-permission check supplied by callers.
///
/// This layer restricts by ownership only; callers apply broader visibility
/// rules with [`Page::retain_readable`].
pub trait PermissionOracle {
    fn can_read(&self, user: &str, item: &DeletedItem) -> bool;
}

impl Page<DeletedItem> {
    /// Drops items `user` may not read. `total_count` is left unchanged.
    pub fn retain_readable<P: PermissionOracle>(&mut self, oracle: &P, user: &str) {
        self.items.retain(|item| oracle.can_read(user, item));
    }
}

/// Finder over a store providing ledger and containment access.
pub struct DeletionRecoveryFinder<S>
where
    S: LedgerAccessor + ContainmentAccessor + Transactional,
{
    store: S,
    settings: LedgerSettings,
}

impl<S> DeletionRecoveryFinder<S>
where
    S: LedgerAccessor + ContainmentAccessor + Transactional,
{
    pub fn new(store: S) -> Self {
        Self::with_settings(store, LedgerSettings::default())
    }

    pub fn with_settings(store: S, settings: LedgerSettings) -> Self {
        Self {
            store,
            settings: settings.validated(),
        }
    }

    /// Returns one page of restorable deleted items for `query.user`.
    ///
    /// # Errors
    /// - Store failures while counting or listing edges are returned.
    /// - An unknown `order_by` is logged and yields an empty page.
    pub fn find_deleted_items(&self, query: &DeletedItemsQuery) -> LedgerResult<Page<DeletedItem>> {
        let order = match parse_order(query.order_by.as_deref()) {
            Ok(order) => order,
            Err(err) => {
                warn!(
                    "event=filter_rejected module=deletion_recovery status=skip user={} error_code={}",
                    query.user,
                    err.code()
                );
                return Ok(Page::empty());
            }
        };
        let limit = self.settings.normalize_limit(query.limit);

        self.store.in_transaction(TxMode::Read, || {
            let edges = self.store.query_deleted_edges(&DeletedEdgeQuery {
                owner: query.user.clone(),
                name_filter: query.name_filter.clone(),
                exclude_deleted_folder_children: true,
                order,
                descending: !query.ascending,
                offset: query.offset,
                limit,
            })?;

            let total_count = edges.total_count;
            let items = edges
                .items
                .into_iter()
                .map(|edge| self.resolve(edge))
                .filter_map(|resolved| match resolved {
                    Ok(item) => Some(item),
                    Err((edge, err)) => {
                        warn!(
                            "event=deleted_item_skipped module=deletion_recovery status=skip entity_type={} entity_id={} error_code={} error={}",
                            edge.child_type.as_str(),
                            edge.child_id,
                            err.code(),
                            err
                        );
                        None
                    }
                })
                .collect::<Vec<_>>();

            info!(
                "event=deleted_items module=deletion_recovery status=ok user={} offset={} limit={} returned={} total={}",
                query.user,
                query.offset,
                limit,
                items.len(),
                total_count
            );
            Ok(Page::new(items, total_count))
        })
    }

    fn resolve(
        &self,
        edge: ContainmentEdge,
    ) -> Result<DeletedItem, (ContainmentEdge, LedgerError)> {
        match latest_revision(&self.store, edge.child_type, edge.child_id) {
            Ok(Some(revision)) => Ok(DeletedItem {
                revision,
                parent_folder_id: edge.parent_folder_id,
                deleted_date: edge.deleted_date,
            }),
            Ok(None) => {
                let err = LedgerError::NotFound {
                    entity_type: edge.child_type,
                    entity_id: edge.child_id,
                    revision: None,
                };
                Err((edge, err))
            }
            Err(err) => Err((edge, err)),
        }
    }
}

fn parse_order(order_by: Option<&str>) -> LedgerResult<DeletedItemOrder> {
    match order_by.map(str::trim) {
        None | Some("") => Ok(DeletedItemOrder::default()),
        Some(value) => DeletedItemOrder::parse(value)
            .ok_or_else(|| LedgerError::malformed(value, "unknown sort key")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_order;
    use crate::repo::containment_repo::DeletedItemOrder;

    #[test]
    fn parse_order_defaults_to_deleted_date() {
        assert_eq!(parse_order(None).unwrap(), DeletedItemOrder::DeletedDate);
        assert_eq!(parse_order(Some(" ")).unwrap(), DeletedItemOrder::DeletedDate);
        assert_eq!(parse_order(Some("name")).unwrap(), DeletedItemOrder::Name);
        assert!(parse_order(Some("size; DROP TABLE")).is_err());
    }
}
