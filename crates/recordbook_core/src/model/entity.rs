//! Live entity model.
//!
//! # Invariants
//! - `(entity_type, id)` identifies an entity; ids are never reused.
//! - `deleted` is the soft-delete tombstone of the live row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable entity identifier.
pub type EntityId = Uuid;

/// Username of the owning/modifying user.
pub type UserId = String;

/// Kinds of entity whose history is kept in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Container of records and other folders.
    Folder,
    /// Structured document held in folders.
    Record,
    /// Externally-registered identifier (DOI-like) with a publication state.
    Identifier,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [Self::Folder, Self::Record, Self::Identifier];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Record => "record",
            Self::Identifier => "identifier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "folder" => Some(Self::Folder),
            "record" => Some(Self::Record),
            "identifier" => Some(Self::Identifier),
            _ => None,
        }
    }
}

/// Mutable live entity as seen by the producer side of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: EntityId,
    pub name: String,
    pub owner: UserId,
    pub deleted: bool,
    /// Lifecycle state, meaningful for identifiers (`draft`, `findable`, ...).
    pub state: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub attachments: Vec<String>,
}

impl Entity {
    /// Creates a live entity with a generated id.
    pub fn new(entity_type: EntityType, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), entity_type, name, owner)
    }

    /// Creates a live entity with a caller-provided id.
    pub fn with_id(
        id: EntityId,
        entity_type: EntityType,
        name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            id,
            name: name.into(),
            owner: owner.into(),
            deleted: false,
            state: None,
            fields: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}
