#![allow(dead_code)]

use recordbook_core::{
    ContainmentAccessor, Entity, EntityChange, EntityId, EntityType, LedgerAccessor, Revision,
    RevisionType, SqliteStore,
};

/// 2024-03-01T00:00:00Z
pub const DAY_ONE_MS: i64 = 1_709_251_200_000;
pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

pub fn append(
    store: &SqliteStore<'_>,
    entity: &Entity,
    revision_type: RevisionType,
    modified_by: &str,
    at_ms: i64,
) -> Revision {
    store
        .append(&EntityChange::new(entity.clone(), revision_type, modified_by).at(at_ms))
        .unwrap()
}

/// Creates an entity and files it under `parent`, if any.
pub fn create(
    store: &SqliteStore<'_>,
    entity_type: EntityType,
    name: &str,
    owner: &str,
    parent: Option<EntityId>,
    at_ms: i64,
) -> Entity {
    let entity = Entity::new(entity_type, name, owner);
    append(store, &entity, RevisionType::Created, owner, at_ms);
    if let Some(parent) = parent {
        store.add_edge(parent, entity_type, entity.id).unwrap();
    }
    entity
}

/// Deletes a folder the way the producer side does: tombstone revision,
/// its own edge flagged in `parent`, and its direct child edges flagged.
pub fn delete_folder(
    store: &SqliteStore<'_>,
    folder: &mut Entity,
    parent: Option<EntityId>,
    at_ms: i64,
) -> Revision {
    folder.deleted = true;
    let owner = folder.owner.clone();
    let revision = append(store, folder, RevisionType::Deleted, &owner, at_ms);
    if let Some(parent) = parent {
        store.mark_child_deleted(parent, folder.id, at_ms).unwrap();
    }
    store.mark_folder_deleted(folder.id, at_ms).unwrap();
    revision
}

/// Deletes a non-folder entity from one folder.
pub fn delete_from(store: &SqliteStore<'_>, entity: &mut Entity, parent: EntityId, at_ms: i64) {
    entity.deleted = true;
    let owner = entity.owner.clone();
    append(store, entity, RevisionType::Deleted, &owner, at_ms);
    store.mark_child_deleted(parent, entity.id, at_ms).unwrap();
}

pub fn count_rows(conn: &rusqlite::Connection, table: &str, entity_id: EntityId) -> i64 {
    conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE entity_id = ?1;"),
            [entity_id.to_string()],
            |row| row.get(0),
        )
        .unwrap()
}
