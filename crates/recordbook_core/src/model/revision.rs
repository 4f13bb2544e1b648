//! Revision snapshot model.
//!
//! # Invariants
//! - `number` is drawn from one global sequence and strictly increases per
//!   entity.
//! - A `Deleted` revision is only recorded for an entity whose live row is
//!   tombstoned.

use crate::model::entity::{Entity, EntityId, EntityType, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Globally ordered revision sequence number.
pub type RevisionNumber = i64;

/// Kind of mutation a revision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionType {
    Created,
    Modified,
    Deleted,
}

impl RevisionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "modified" => Some(Self::Modified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Full field values of an entity as of one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub owner: UserId,
    pub deleted: bool,
    pub state: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub attachments: Vec<String>,
}

impl From<&Entity> for Snapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            name: entity.name.clone(),
            owner: entity.owner.clone(),
            deleted: entity.deleted,
            state: entity.state.clone(),
            fields: entity.fields.clone(),
            attachments: entity.attachments.clone(),
        }
    }
}

/// Address of one revision row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub number: RevisionNumber,
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub number: RevisionNumber,
    pub revision_type: RevisionType,
    /// Unix epoch milliseconds of the mutation.
    pub timestamp_ms: i64,
    pub modified_by: UserId,
    pub snapshot: Snapshot,
    /// Names of the fields this revision changed.
    pub changed_fields: Vec<String>,
}

impl Revision {
    pub fn key(&self) -> RevisionKey {
        RevisionKey {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            number: self.number,
        }
    }
}

/// Producer-side request to record one mutation of a live entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityChange {
    pub entity: Entity,
    pub revision_type: RevisionType,
    pub modified_by: UserId,
    pub changed_fields: Vec<String>,
    pub timestamp_ms: i64,
}

impl EntityChange {
    /// Records `entity` as changed now by `modified_by`.
    pub fn new(entity: Entity, revision_type: RevisionType, modified_by: impl Into<String>) -> Self {
        Self {
            entity,
            revision_type,
            modified_by: modified_by.into(),
            changed_fields: Vec::new(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn changed(mut self, fields: &[&str]) -> Self {
        self.changed_fields = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}
