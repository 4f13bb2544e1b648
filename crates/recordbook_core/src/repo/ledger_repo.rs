//! Ledger accessor contract and SQLite implementation.
//!
//! # Responsibility
//! - Append revisions for live-entity mutations (producer side).
//! - Serve filtered, ordered, paged revision queries with a matching count.
//! - Apply the two sanctioned raw mutations: deleted-flag correction and
//!   retention deletes.
//!
//! # Invariants
//! - Revision numbers come from `revision_info` AUTOINCREMENT, so they are
//!   globally ordered and strictly increasing per entity.
//! - Count and page statements of one query share one compiled predicate.
//! - A `Deleted` revision is only appended for a tombstoned entity.

use crate::error::{LedgerError, LedgerResult};
use crate::model::entity::{EntityId, EntityType};
use crate::model::page::Page;
use crate::model::revision::{
    EntityChange, Revision, RevisionKey, RevisionNumber, RevisionType, Snapshot,
};
use crate::repo::filter::{compile_predicate, RevisionPredicate};
use crate::repo::store::{
    bool_to_int, int_to_bool, parse_uuid, SqliteStore, Transactional, TxMode,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;

const REVISION_SELECT_SQL: &str = "SELECT
    r.entity_type AS entity_type,
    r.entity_id AS entity_id,
    r.rev AS rev,
    r.rev_type AS rev_type,
    r.name AS name,
    r.owner AS owner,
    r.state AS state,
    r.is_deleted AS is_deleted,
    r.changed_fields AS changed_fields,
    i.timestamp_ms AS timestamp_ms,
    i.modified_by AS modified_by
FROM revisions r
INNER JOIN revision_info i ON i.rev = r.rev";

const REVISION_COUNT_SQL: &str = "SELECT COUNT(*)
FROM revisions r
INNER JOIN revision_info i ON i.rev = r.rev";

/// Ordering of a revision query by revision number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevisionOrder {
    Ascending,
    #[default]
    Descending,
}

/// One ledger query: entity scope, predicate, order and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionQuery {
    pub entity_type: EntityType,
    /// `None` queries across every id of `entity_type`.
    pub entity_id: Option<EntityId>,
    pub predicate: RevisionPredicate,
    pub order: RevisionOrder,
    pub offset: u32,
    /// `None` returns every row after `offset`; `Some(0)` computes the count only.
    pub limit: Option<u32>,
}

impl RevisionQuery {
    /// Newest-first query over all revisions of one entity.
    pub fn for_entity(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type,
            entity_id: Some(entity_id),
            predicate: RevisionPredicate::default(),
            order: RevisionOrder::Descending,
            offset: 0,
            limit: None,
        }
    }

    /// Newest-first query across every id of one entity type.
    pub fn for_type(entity_type: EntityType) -> Self {
        Self {
            entity_id: None,
            ..Self::for_entity(entity_type, EntityId::nil())
        }
    }

    pub fn matching(mut self, predicate: RevisionPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn ordered(mut self, order: RevisionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn window(mut self, offset: u32, limit: Option<u32>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// Tables holding snapshot rows keyed by `(entity_type, entity_id, rev)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTable {
    /// Revision header rows.
    Revisions,
    /// One row per snapshot field.
    Fields,
    /// One row per snapshot attachment.
    Attachments,
}

impl SnapshotTable {
    /// Dependent tables, deleted before their header rows.
    pub const CHILDREN: [SnapshotTable; 2] = [Self::Fields, Self::Attachments];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Revisions => "revisions",
            Self::Fields => "revision_fields",
            Self::Attachments => "revision_attachments",
        }
    }
}

/// Direct snapshot mutations that bypass append-only semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawUpdate {
    /// Sets `is_deleted = 0` on one revision header; nothing else changes.
    ClearDeletedFlag(RevisionKey),
    /// Deletes rows of `table` for one entity with `rev <= boundary`.
    DeleteThrough {
        table: SnapshotTable,
        entity_type: EntityType,
        entity_id: EntityId,
        boundary: RevisionNumber,
    },
}

/// Ledger access contract consumed by the revision services.
pub trait LedgerAccessor {
    /// Records one mutation of a live entity and returns the new revision.
    fn append(&self, change: &EntityChange) -> LedgerResult<Revision>;
    /// Returns the matching count and the requested window of revisions.
    fn query(&self, query: &RevisionQuery) -> LedgerResult<Page<Revision>>;
    /// Applies one raw snapshot mutation and returns the affected row count.
    fn raw_update(&self, update: &RawUpdate) -> LedgerResult<usize>;
    /// Lists every id of `entity_type` with at least one recorded revision.
    fn entity_ids(&self, entity_type: EntityType) -> LedgerResult<Vec<EntityId>>;
}

impl LedgerAccessor for SqliteStore<'_> {
    fn append(&self, change: &EntityChange) -> LedgerResult<Revision> {
        validate_change(change)?;
        self.in_transaction(TxMode::Write, || append_in_tx(self.conn, change))
    }

    fn query(&self, query: &RevisionQuery) -> LedgerResult<Page<Revision>> {
        let compiled = compile_predicate(query.entity_type, query.entity_id, &query.predicate);

        let total_count: i64 = self.conn.query_row(
            &format!("{REVISION_COUNT_SQL}{}", compiled.where_sql),
            params_from_iter(compiled.binds.iter()),
            |row| row.get(0),
        )?;

        if query.limit == Some(0) {
            return Ok(Page::new(Vec::new(), total_count));
        }

        let direction = match query.order {
            RevisionOrder::Ascending => "ASC",
            RevisionOrder::Descending => "DESC",
        };
        let mut sql = format!(
            "{REVISION_SELECT_SQL}{} ORDER BY r.rev {direction} LIMIT ? OFFSET ?",
            compiled.where_sql
        );
        sql.push(';');

        let mut binds = compiled.binds;
        binds.push(Value::Integer(query.limit.map_or(-1, i64::from)));
        binds.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut revisions = Vec::new();
        while let Some(row) = rows.next()? {
            revisions.push(parse_revision_row(self.conn, row)?);
        }

        Ok(Page::new(revisions, total_count))
    }

    fn raw_update(&self, update: &RawUpdate) -> LedgerResult<usize> {
        let affected = match *update {
            RawUpdate::ClearDeletedFlag(key) => self.conn.execute(
                "UPDATE revisions
                 SET is_deleted = 0
                 WHERE entity_type = ?1
                   AND entity_id = ?2
                   AND rev = ?3;",
                params![
                    key.entity_type.as_str(),
                    key.entity_id.to_string(),
                    key.number
                ],
            )?,
            RawUpdate::DeleteThrough {
                table,
                entity_type,
                entity_id,
                boundary,
            } => self.conn.execute(
                &format!(
                    "DELETE FROM {}
                     WHERE entity_type = ?1
                       AND entity_id = ?2
                       AND rev <= ?3;",
                    table.table_name()
                ),
                params![entity_type.as_str(), entity_id.to_string(), boundary],
            )?,
        };
        Ok(affected)
    }

    fn entity_ids(&self, entity_type: EntityType) -> LedgerResult<Vec<EntityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT entity_id
             FROM revisions
             WHERE entity_type = ?1
             ORDER BY entity_id ASC;",
        )?;
        let mut rows = stmt.query([entity_type.as_str()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "revisions.entity_id")?);
        }
        Ok(ids)
    }
}

fn validate_change(change: &EntityChange) -> LedgerResult<()> {
    if change.entity.name.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(
            "entity name must not be blank".to_string(),
        ));
    }
    if change.modified_by.trim().is_empty() {
        return Err(LedgerError::InvalidArgument(
            "modified_by must not be blank".to_string(),
        ));
    }
    if change.revision_type == RevisionType::Deleted && !change.entity.deleted {
        return Err(LedgerError::InvalidArgument(format!(
            "deleted revision requires a tombstoned {} {}",
            change.entity.entity_type.as_str(),
            change.entity.id
        )));
    }
    Ok(())
}

fn append_in_tx(conn: &Connection, change: &EntityChange) -> LedgerResult<Revision> {
    let entity = &change.entity;
    let entity_type = entity.entity_type.as_str();
    let entity_id = entity.id.to_string();

    conn.execute(
        "INSERT INTO revision_info (timestamp_ms, modified_by) VALUES (?1, ?2);",
        params![change.timestamp_ms, change.modified_by.as_str()],
    )?;
    let number = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO entities (entity_type, entity_id, name, owner, state, is_deleted, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(entity_type, entity_id) DO UPDATE SET
            name = excluded.name,
            owner = excluded.owner,
            state = excluded.state,
            is_deleted = excluded.is_deleted,
            updated_at = excluded.updated_at;",
        params![
            entity_type,
            entity_id.as_str(),
            entity.name.as_str(),
            entity.owner.as_str(),
            entity.state.as_deref(),
            bool_to_int(entity.deleted),
            change.timestamp_ms,
        ],
    )?;

    let changed_fields = serde_json::to_string(&change.changed_fields)
        .map_err(|err| LedgerError::InvalidData(format!("changed fields: {err}")))?;
    conn.execute(
        "INSERT INTO revisions (
            entity_type,
            entity_id,
            rev,
            rev_type,
            name,
            owner,
            state,
            is_deleted,
            changed_fields
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            entity_type,
            entity_id.as_str(),
            number,
            change.revision_type.as_str(),
            entity.name.as_str(),
            entity.owner.as_str(),
            entity.state.as_deref(),
            bool_to_int(entity.deleted),
            changed_fields,
        ],
    )?;

    for (field_name, field_value) in &entity.fields {
        conn.execute(
            "INSERT INTO revision_fields (entity_type, entity_id, rev, field_name, field_value)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![entity_type, entity_id.as_str(), number, field_name, field_value],
        )?;
    }
    for (position, file_name) in entity.attachments.iter().enumerate() {
        conn.execute(
            "INSERT INTO revision_attachments (entity_type, entity_id, rev, position, file_name)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![entity_type, entity_id.as_str(), number, position as i64, file_name],
        )?;
    }

    Ok(Revision {
        entity_type: entity.entity_type,
        entity_id: entity.id,
        number,
        revision_type: change.revision_type,
        timestamp_ms: change.timestamp_ms,
        modified_by: change.modified_by.clone(),
        snapshot: Snapshot::from(entity),
        changed_fields: change.changed_fields.clone(),
    })
}

fn parse_revision_row(conn: &Connection, row: &Row<'_>) -> LedgerResult<Revision> {
    let type_text: String = row.get("entity_type")?;
    let entity_type = EntityType::parse(&type_text).ok_or_else(|| {
        LedgerError::InvalidData(format!(
            "invalid entity type `{type_text}` in revisions.entity_type"
        ))
    })?;

    let id_text: String = row.get("entity_id")?;
    let entity_id = parse_uuid(&id_text, "revisions.entity_id")?;

    let rev_type_text: String = row.get("rev_type")?;
    let revision_type = RevisionType::parse(&rev_type_text).ok_or_else(|| {
        LedgerError::InvalidData(format!(
            "invalid revision type `{rev_type_text}` in revisions.rev_type"
        ))
    })?;

    let changed_text: String = row.get("changed_fields")?;
    let changed_fields: Vec<String> = serde_json::from_str(&changed_text).map_err(|err| {
        LedgerError::InvalidData(format!(
            "invalid changed field summary `{changed_text}` in revisions.changed_fields: {err}"
        ))
    })?;

    let number: RevisionNumber = row.get("rev")?;
    let fields = load_snapshot_fields(conn, entity_type, &id_text, number)?;
    let attachments = load_snapshot_attachments(conn, entity_type, &id_text, number)?;

    Ok(Revision {
        entity_type,
        entity_id,
        number,
        revision_type,
        timestamp_ms: row.get("timestamp_ms")?,
        modified_by: row.get("modified_by")?,
        snapshot: Snapshot {
            name: row.get("name")?,
            owner: row.get("owner")?,
            deleted: int_to_bool(row.get("is_deleted")?, "revisions.is_deleted")?,
            state: row.get("state")?,
            fields,
            attachments,
        },
        changed_fields,
    })
}

fn load_snapshot_fields(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &str,
    number: RevisionNumber,
) -> LedgerResult<BTreeMap<String, String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT field_name, field_value
         FROM revision_fields
         WHERE entity_type = ?1
           AND entity_id = ?2
           AND rev = ?3;",
    )?;
    let mut rows = stmt.query(params![entity_type.as_str(), entity_id, number])?;
    let mut fields = BTreeMap::new();
    while let Some(row) = rows.next()? {
        fields.insert(row.get(0)?, row.get(1)?);
    }
    Ok(fields)
}

fn load_snapshot_attachments(
    conn: &Connection,
    entity_type: EntityType,
    entity_id: &str,
    number: RevisionNumber,
) -> LedgerResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT file_name
         FROM revision_attachments
         WHERE entity_type = ?1
           AND entity_id = ?2
           AND rev = ?3
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query(params![entity_type.as_str(), entity_id, number])?;
    let mut attachments = Vec::new();
    while let Some(row) = rows.next()? {
        attachments.push(row.get(0)?);
    }
    Ok(attachments)
}
