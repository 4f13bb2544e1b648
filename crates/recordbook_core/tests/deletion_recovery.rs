mod common;

use common::{append, create, delete_folder, delete_from, DAY_ONE_MS, HOUR_MS};
use recordbook_core::{
    open_db_in_memory, ContainmentAccessor, ContainmentEdge, DeletedEdgeQuery, DeletedItem,
    DeletedItemsQuery, DeletionRecoveryFinder, EntityChange, EntityId, EntityType,
    LedgerAccessor, LedgerError, LedgerResult, LedgerSettings, Page, PermissionOracle, RawUpdate,
    RestorationMutator, Revision, RevisionPredicate, RevisionQuery, RevisionType, SqliteStore,
    Transactional, TxMode,
};

fn query_for(user: &str) -> DeletedItemsQuery {
    DeletedItemsQuery {
        user: user.to_string(),
        ..DeletedItemsQuery::default()
    }
}

fn ids(page: &Page<DeletedItem>) -> Vec<EntityId> {
    page.items.iter().map(DeletedItem::entity_id).collect()
}

#[test]
fn deleted_folder_is_listed_but_its_children_are_not() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let root = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut folder = create(&store, EntityType::Folder, "Projects", "alice", Some(root.id), DAY_ONE_MS);
    let record = create(&store, EntityType::Record, "Plan", "alice", Some(folder.id), DAY_ONE_MS);
    let mut loose = create(&store, EntityType::Record, "Loose", "alice", Some(root.id), DAY_ONE_MS);

    delete_from(&store, &mut loose, root.id, DAY_ONE_MS + HOUR_MS);
    let deletion = delete_folder(&store, &mut folder, Some(root.id), DAY_ONE_MS + 2 * HOUR_MS);

    let finder = DeletionRecoveryFinder::new(store);
    let page = finder.find_deleted_items(&query_for("alice")).unwrap();

    assert_eq!(ids(&page), vec![folder.id, loose.id]);
    assert_eq!(page.total_count, 2);
    assert!(!ids(&page).contains(&record.id));

    let listed_folder = &page.items[0];
    assert_eq!(listed_folder.revision.number, deletion.number);
    assert_eq!(listed_folder.parent_folder_id, root.id);
    assert_eq!(listed_folder.deleted_date, Some(DAY_ONE_MS + 2 * HOUR_MS));
    assert!(listed_folder.revision.snapshot.deleted);
}

#[test]
fn exclusion_is_one_level_deep() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let root = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut outer = create(&store, EntityType::Folder, "Outer", "alice", Some(root.id), DAY_ONE_MS);
    let inner = create(&store, EntityType::Folder, "Inner", "alice", Some(outer.id), DAY_ONE_MS);
    let mut nested = create(&store, EntityType::Record, "Nested", "alice", Some(inner.id), DAY_ONE_MS);

    // Deleted on its own before the outer folder went away.
    delete_from(&store, &mut nested, inner.id, DAY_ONE_MS + HOUR_MS);
    delete_folder(&store, &mut outer, Some(root.id), DAY_ONE_MS + 2 * HOUR_MS);

    let page = DeletionRecoveryFinder::new(store)
        .find_deleted_items(&query_for("alice"))
        .unwrap();

    // `inner` is a direct child of a deleted folder; `nested` is two levels down.
    let listed = ids(&page);
    assert!(listed.contains(&outer.id));
    assert!(listed.contains(&nested.id));
    assert!(!listed.contains(&inner.id));
}

#[test]
fn listing_is_scoped_to_owner_and_name_filter() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut report = create(&store, EntityType::Record, "Quarterly Report", "alice", Some(home.id), DAY_ONE_MS);
    let mut notes = create(&store, EntityType::Record, "notes 100%", "alice", Some(home.id), DAY_ONE_MS);
    let mut foreign = create(&store, EntityType::Record, "Report by bob", "bob", Some(home.id), DAY_ONE_MS);
    delete_from(&store, &mut report, home.id, DAY_ONE_MS + HOUR_MS);
    delete_from(&store, &mut notes, home.id, DAY_ONE_MS + 2 * HOUR_MS);
    delete_from(&store, &mut foreign, home.id, DAY_ONE_MS + 3 * HOUR_MS);

    let finder = DeletionRecoveryFinder::new(store);

    let reports = finder
        .find_deleted_items(&DeletedItemsQuery {
            name_filter: "report".to_string(),
            ..query_for("alice")
        })
        .unwrap();
    assert_eq!(ids(&reports), vec![report.id]);
    assert_eq!(reports.total_count, 1);

    let literal_percent = finder
        .find_deleted_items(&DeletedItemsQuery {
            name_filter: "0%".to_string(),
            ..query_for("alice")
        })
        .unwrap();
    assert_eq!(ids(&literal_percent), vec![notes.id]);

    let bobs = finder.find_deleted_items(&query_for("bob")).unwrap();
    assert_eq!(ids(&bobs), vec![foreign.id]);
}

#[test]
fn ordering_and_paging() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut deleted = Vec::new();
    for (step, name) in ["charlie", "Alpha", "bravo"].into_iter().enumerate() {
        let mut record = create(&store, EntityType::Record, name, "alice", Some(home.id), DAY_ONE_MS);
        delete_from(&store, &mut record, home.id, DAY_ONE_MS + (step as i64 + 1) * HOUR_MS);
        deleted.push(record.id);
    }

    let finder = DeletionRecoveryFinder::with_settings(
        store,
        LedgerSettings {
            page_default_limit: 2,
            page_max_limit: 2,
            ..LedgerSettings::default()
        },
    );

    let newest_first = finder.find_deleted_items(&query_for("alice")).unwrap();
    assert_eq!(ids(&newest_first), vec![deleted[2], deleted[1]]);
    assert_eq!(newest_first.total_count, 3);

    let second_page = finder
        .find_deleted_items(&DeletedItemsQuery {
            offset: 2,
            limit: Some(50),
            ..query_for("alice")
        })
        .unwrap();
    assert_eq!(ids(&second_page), vec![deleted[0]]);

    let by_name = finder
        .find_deleted_items(&DeletedItemsQuery {
            order_by: Some("name".to_string()),
            ascending: true,
            limit: Some(3),
            ..query_for("alice")
        })
        .unwrap();
    let names = by_name.items.iter().map(DeletedItem::name).collect::<Vec<_>>();
    assert_eq!(names, vec!["Alpha", "bravo"]);

    let unknown_key = finder
        .find_deleted_items(&DeletedItemsQuery {
            order_by: Some("size".to_string()),
            ..query_for("alice")
        })
        .unwrap();
    assert!(unknown_key.is_empty());
    assert_eq!(unknown_key.total_count, 0);
}

/// Where [`FlakyStore`] reports a locked database.
#[derive(Clone, Copy)]
enum Fault {
    /// Ledger reads for one entity.
    ItemRead(EntityId),
    /// The deleted-edge count and page.
    EdgeQuery,
}

/// Store wrapper injecting transient faults.
struct FlakyStore<'conn> {
    inner: SqliteStore<'conn>,
    fault: Fault,
}

fn locked() -> LedgerError {
    LedgerError::TransientAccess("database is locked".to_string())
}

impl LedgerAccessor for FlakyStore<'_> {
    fn append(&self, change: &EntityChange) -> LedgerResult<Revision> {
        self.inner.append(change)
    }

    fn query(&self, query: &RevisionQuery) -> LedgerResult<Page<Revision>> {
        if let Fault::ItemRead(id) = self.fault {
            if query.entity_id == Some(id) {
                return Err(locked());
            }
        }
        self.inner.query(query)
    }

    fn raw_update(&self, update: &RawUpdate) -> LedgerResult<usize> {
        self.inner.raw_update(update)
    }

    fn entity_ids(&self, entity_type: EntityType) -> LedgerResult<Vec<EntityId>> {
        self.inner.entity_ids(entity_type)
    }
}

impl ContainmentAccessor for FlakyStore<'_> {
    fn add_edge(&self, parent: EntityId, child_type: EntityType, child: EntityId) -> LedgerResult<()> {
        self.inner.add_edge(parent, child_type, child)
    }

    fn mark_child_deleted(&self, parent: EntityId, child: EntityId, at_ms: i64) -> LedgerResult<usize> {
        self.inner.mark_child_deleted(parent, child, at_ms)
    }

    fn mark_folder_deleted(&self, folder: EntityId, at_ms: i64) -> LedgerResult<usize> {
        self.inner.mark_folder_deleted(folder, at_ms)
    }

    fn restore_edges(&self, folder: EntityId) -> LedgerResult<usize> {
        self.inner.restore_edges(folder)
    }

    fn query_deleted_edges(&self, query: &DeletedEdgeQuery) -> LedgerResult<Page<ContainmentEdge>> {
        if let Fault::EdgeQuery = self.fault {
            return Err(locked());
        }
        self.inner.query_deleted_edges(query)
    }
}

impl Transactional for FlakyStore<'_> {
    fn in_transaction<T, F>(&self, mode: TxMode, work: F) -> LedgerResult<T>
    where
        F: FnOnce() -> LedgerResult<T>,
    {
        self.inner.in_transaction(mode, work)
    }
}

#[test]
fn unresolvable_item_is_skipped_without_failing_the_page() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut healthy = create(&store, EntityType::Record, "Healthy", "alice", Some(home.id), DAY_ONE_MS);
    let mut broken = create(&store, EntityType::Record, "Broken", "alice", Some(home.id), DAY_ONE_MS);
    delete_from(&store, &mut healthy, home.id, DAY_ONE_MS + HOUR_MS);
    delete_from(&store, &mut broken, home.id, DAY_ONE_MS + 2 * HOUR_MS);

    let finder = DeletionRecoveryFinder::new(FlakyStore {
        inner: store,
        fault: Fault::ItemRead(broken.id),
    });
    let page = finder.find_deleted_items(&query_for("alice")).unwrap();

    assert_eq!(ids(&page), vec![healthy.id]);
    // The count reflects matching edges, not resolved items.
    assert_eq!(page.total_count, 2);
}

#[test]
fn edge_query_failure_fails_the_page() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut record = create(&store, EntityType::Record, "Memo", "alice", Some(home.id), DAY_ONE_MS);
    delete_from(&store, &mut record, home.id, DAY_ONE_MS + HOUR_MS);

    let finder = DeletionRecoveryFinder::new(FlakyStore {
        inner: store,
        fault: Fault::EdgeQuery,
    });
    let err = finder.find_deleted_items(&query_for("alice")).unwrap_err();

    assert!(matches!(err, LedgerError::TransientAccess(_)));
}

struct OnlyRecords;

impl PermissionOracle for OnlyRecords {
    fn can_read(&self, _user: &str, item: &DeletedItem) -> bool {
        item.entity_type() == EntityType::Record
    }
}

#[test]
fn retain_readable_drops_items_but_keeps_total() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut folder = create(&store, EntityType::Folder, "Archive", "alice", Some(home.id), DAY_ONE_MS);
    let mut record = create(&store, EntityType::Record, "Memo", "alice", Some(home.id), DAY_ONE_MS);
    delete_from(&store, &mut record, home.id, DAY_ONE_MS + HOUR_MS);
    delete_folder(&store, &mut folder, Some(home.id), DAY_ONE_MS + 2 * HOUR_MS);

    let mut page = DeletionRecoveryFinder::new(store)
        .find_deleted_items(&query_for("alice"))
        .unwrap();
    page.retain_readable(&OnlyRecords, "alice");

    assert_eq!(ids(&page), vec![record.id]);
    assert_eq!(page.total_count, 2);
}

fn flagged_edges(store: &SqliteStore<'_>, owner: &str) -> i64 {
    store
        .query_deleted_edges(&DeletedEdgeQuery {
            owner: owner.to_string(),
            name_filter: String::new(),
            exclude_deleted_folder_children: false,
            order: Default::default(),
            descending: true,
            offset: 0,
            limit: 0,
        })
        .unwrap()
        .total_count
}

#[test]
fn restored_edges_leave_the_listing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut record = create(&store, EntityType::Record, "Back again", "alice", Some(home.id), DAY_ONE_MS);
    delete_from(&store, &mut record, home.id, DAY_ONE_MS + HOUR_MS);

    assert_eq!(flagged_edges(&store, "alice"), 1);
    assert_eq!(store.restore_edges(home.id).unwrap(), 1);
    assert_eq!(flagged_edges(&store, "alice"), 0);

    let page = DeletionRecoveryFinder::new(store)
        .find_deleted_items(&query_for("alice"))
        .unwrap();
    assert!(page.is_empty());
}

#[test]
fn record_deleted_from_a_restored_folder_is_listed() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut projects = create(&store, EntityType::Folder, "Projects", "alice", Some(home.id), DAY_ONE_MS);
    let mut plan = create(&store, EntityType::Record, "Plan", "alice", Some(projects.id), DAY_ONE_MS);
    delete_folder(&store, &mut projects, Some(home.id), DAY_ONE_MS + HOUR_MS);

    // Undo the folder deletion the way the producer side does.
    assert_eq!(RestorationMutator::new(store).restore_folder(projects.id).unwrap(), 1);
    assert_eq!(store.restore_edges(projects.id).unwrap(), 1);
    store.add_edge(home.id, EntityType::Folder, projects.id).unwrap();
    projects.deleted = false;
    append(&store, &projects, RevisionType::Modified, "alice", DAY_ONE_MS + 2 * HOUR_MS);

    let still_deleted = store
        .query(&RevisionQuery::for_type(EntityType::Folder).matching(RevisionPredicate {
            revision_types: vec![RevisionType::Deleted],
            owner: Some("alice".to_string()),
            snapshot_deleted: Some(true),
            ..RevisionPredicate::default()
        }))
        .unwrap();
    assert_eq!(still_deleted.total_count, 0);

    delete_from(&store, &mut plan, projects.id, DAY_ONE_MS + 3 * HOUR_MS);

    let page = DeletionRecoveryFinder::new(store)
        .find_deleted_items(&query_for("alice"))
        .unwrap();
    assert_eq!(ids(&page), vec![plan.id]);
    assert_eq!(page.items[0].parent_folder_id, projects.id);
    assert_eq!(page.total_count, 1);
}

#[test]
fn folder_with_more_children_than_sqlite_bind_slots_is_listed_alone() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();

    let home = create(&store, EntityType::Folder, "Home", "alice", None, DAY_ONE_MS);
    let mut crowded = create(&store, EntityType::Folder, "Crowded", "alice", Some(home.id), DAY_ONE_MS);
    // Above SQLite's default limit of 32766 host parameters.
    let children = 33_000;
    store
        .in_transaction(TxMode::Write, || {
            for n in 0..children {
                let name = format!("Child {n}");
                create(&store, EntityType::Record, &name, "alice", Some(crowded.id), DAY_ONE_MS);
            }
            Ok(())
        })
        .unwrap();
    delete_folder(&store, &mut crowded, Some(home.id), DAY_ONE_MS + HOUR_MS);
    assert_eq!(flagged_edges(&store, "alice"), children + 1);

    let page = DeletionRecoveryFinder::new(store)
        .find_deleted_items(&query_for("alice"))
        .unwrap();
    assert_eq!(ids(&page), vec![crowded.id]);
    assert_eq!(page.total_count, 1);
}

#[test]
fn folder_cannot_contain_itself() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteStore::try_new(&conn).unwrap();
    let folder = create(&store, EntityType::Folder, "Loop", "alice", None, DAY_ONE_MS);

    let err = store
        .add_edge(folder.id, EntityType::Folder, folder.id)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgument(_)));
}
