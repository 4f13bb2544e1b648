//! Containment accessor contract and SQLite implementation.
//!
//! # Responsibility
//! - Maintain folder membership edges and their `deleted_in_folder` flag.
//! - Serve the paged deleted-edge query used by deletion recovery.
//!
//! # Invariants
//! - Deleting a folder flags its direct child edges only; grandchildren keep
//!   their edges untouched.
//! - The deleted-edge count and page share one `WHERE` clause.
//! - Children of deleted folders are excluded inside that clause, so the
//!   number of bound parameters does not grow with the number of deleted
//!   folders or children.

use crate::error::{LedgerError, LedgerResult};
use crate::model::containment::ContainmentEdge;
use crate::model::entity::{EntityId, EntityType, UserId};
use crate::model::page::Page;
use crate::repo::filter::escape_like;
use crate::repo::store::{int_to_bool, parse_uuid, SqliteStore};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

/// Sort key for deleted-item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedItemOrder {
    Name,
    #[default]
    DeletedDate,
}

impl DeletedItemOrder {
    /// Parses a request sort key (`name` or `deletedDate`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "name" => Some(Self::Name),
            "deletedDate" | "deleted_date" => Some(Self::DeletedDate),
            _ => None,
        }
    }
}

/// Paged query over edges flagged `deleted_in_folder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEdgeQuery {
    /// Owner of the child entity.
    pub owner: UserId,
    /// Case-insensitive substring of the child name; blank matches all.
    pub name_filter: String,
    /// Skip edges whose child sits, flagged, in a folder the owner deleted
    /// and has not restored.
    pub exclude_deleted_folder_children: bool,
    pub order: DeletedItemOrder,
    pub descending: bool,
    pub offset: u32,
    pub limit: u32,
}

/// Containment access contract consumed by deletion recovery.
pub trait ContainmentAccessor {
    /// Adds (or re-activates) membership of one child in one folder.
    fn add_edge(
        &self,
        parent_folder_id: EntityId,
        child_type: EntityType,
        child_id: EntityId,
    ) -> LedgerResult<()>;
    /// Flags one child edge as deleted in its folder.
    fn mark_child_deleted(
        &self,
        parent_folder_id: EntityId,
        child_id: EntityId,
        deleted_at_ms: i64,
    ) -> LedgerResult<usize>;
    /// Flags every direct child edge of a deleted folder.
    fn mark_folder_deleted(&self, folder_id: EntityId, deleted_at_ms: i64) -> LedgerResult<usize>;
    /// Clears the deleted flag on every direct child edge of a folder.
    fn restore_edges(&self, folder_id: EntityId) -> LedgerResult<usize>;
    /// Returns the matching count and the requested window of deleted edges.
    fn query_deleted_edges(&self, query: &DeletedEdgeQuery) -> LedgerResult<Page<ContainmentEdge>>;
}

impl ContainmentAccessor for SqliteStore<'_> {
    fn add_edge(
        &self,
        parent_folder_id: EntityId,
        child_type: EntityType,
        child_id: EntityId,
    ) -> LedgerResult<()> {
        if parent_folder_id == child_id {
            return Err(LedgerError::InvalidArgument(format!(
                "folder {parent_folder_id} cannot contain itself"
            )));
        }
        self.conn.execute(
            "INSERT INTO containment_edges (
                parent_folder_id,
                child_type,
                child_id,
                deleted_in_folder,
                deleted_date
            ) VALUES (?1, ?2, ?3, 0, NULL)
            ON CONFLICT(parent_folder_id, child_type, child_id) DO UPDATE SET
                deleted_in_folder = 0,
                deleted_date = NULL;",
            params![
                parent_folder_id.to_string(),
                child_type.as_str(),
                child_id.to_string()
            ],
        )?;
        Ok(())
    }

    fn mark_child_deleted(
        &self,
        parent_folder_id: EntityId,
        child_id: EntityId,
        deleted_at_ms: i64,
    ) -> LedgerResult<usize> {
        let changed = self.conn.execute(
            "UPDATE containment_edges
             SET deleted_in_folder = 1,
                 deleted_date = ?3
             WHERE parent_folder_id = ?1
               AND child_id = ?2
               AND deleted_in_folder = 0;",
            params![parent_folder_id.to_string(), child_id.to_string(), deleted_at_ms],
        )?;
        Ok(changed)
    }

    fn mark_folder_deleted(&self, folder_id: EntityId, deleted_at_ms: i64) -> LedgerResult<usize> {
        let changed = self.conn.execute(
            "UPDATE containment_edges
             SET deleted_in_folder = 1,
                 deleted_date = ?2
             WHERE parent_folder_id = ?1
               AND deleted_in_folder = 0;",
            params![folder_id.to_string(), deleted_at_ms],
        )?;
        Ok(changed)
    }

    fn restore_edges(&self, folder_id: EntityId) -> LedgerResult<usize> {
        let changed = self.conn.execute(
            "UPDATE containment_edges
             SET deleted_in_folder = 0,
                 deleted_date = NULL
             WHERE parent_folder_id = ?1
               AND deleted_in_folder = 1;",
            [folder_id.to_string()],
        )?;
        Ok(changed)
    }

    fn query_deleted_edges(&self, query: &DeletedEdgeQuery) -> LedgerResult<Page<ContainmentEdge>> {
        let mut where_sql = String::from(
            " WHERE c.deleted_in_folder = 1
                AND e.owner = ?",
        );
        let mut binds = vec![Value::Text(query.owner.clone())];

        let name_filter = query.name_filter.trim();
        if !name_filter.is_empty() {
            where_sql.push_str(" AND e.name LIKE ? ESCAPE '\\'");
            binds.push(Value::Text(format!("%{}%", escape_like(name_filter))));
        }

        if query.exclude_deleted_folder_children {
            // One level: the child's own flagged edge under a folder whose
            // deletion revision still reads deleted.
            where_sql.push_str(
                " AND NOT EXISTS (
                    SELECT 1
                    FROM containment_edges x
                    INNER JOIN revisions fr
                       ON fr.entity_type = 'folder'
                      AND fr.entity_id = x.parent_folder_id
                    WHERE x.child_type = c.child_type
                      AND x.child_id = c.child_id
                      AND x.deleted_in_folder = 1
                      AND fr.rev_type = 'deleted'
                      AND fr.is_deleted = 1
                      AND fr.owner = ?
                )",
            );
            binds.push(Value::Text(query.owner.clone()));
        }

        let from_sql = "FROM containment_edges c
             INNER JOIN entities e
                ON e.entity_type = c.child_type
               AND e.entity_id = c.child_id";

        let total_count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {from_sql}{where_sql};"),
            params_from_iter(binds.iter()),
            |row| row.get(0),
        )?;

        if query.limit == 0 {
            return Ok(Page::new(Vec::new(), total_count));
        }

        let direction = if query.descending { "DESC" } else { "ASC" };
        let order_sql = match query.order {
            DeletedItemOrder::Name => format!("e.name COLLATE NOCASE {direction}"),
            DeletedItemOrder::DeletedDate => format!("c.deleted_date {direction}"),
        };
        let sql = format!(
            "SELECT
                c.parent_folder_id AS parent_folder_id,
                c.child_type AS child_type,
                c.child_id AS child_id,
                c.deleted_in_folder AS deleted_in_folder,
                c.deleted_date AS deleted_date
             {from_sql}{where_sql}
             ORDER BY {order_sql}, c.child_id ASC, c.parent_folder_id ASC
             LIMIT ? OFFSET ?;"
        );
        binds.push(Value::Integer(i64::from(query.limit)));
        binds.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }
        Ok(Page::new(edges, total_count))
    }
}

fn parse_edge_row(row: &Row<'_>) -> LedgerResult<ContainmentEdge> {
    let parent_text: String = row.get("parent_folder_id")?;
    let child_text: String = row.get("child_id")?;
    let type_text: String = row.get("child_type")?;
    let child_type = EntityType::parse(&type_text).ok_or_else(|| {
        LedgerError::InvalidData(format!(
            "invalid entity type `{type_text}` in containment_edges.child_type"
        ))
    })?;

    Ok(ContainmentEdge {
        parent_folder_id: parse_uuid(&parent_text, "containment_edges.parent_folder_id")?,
        child_type,
        child_id: parse_uuid(&child_text, "containment_edges.child_id")?,
        deleted_in_folder: int_to_bool(
            row.get("deleted_in_folder")?,
            "containment_edges.deleted_in_folder",
        )?,
        deleted_date: row.get("deleted_date")?,
    })
}
