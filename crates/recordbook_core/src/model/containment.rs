//! Folder containment edge model.

use crate::model::entity::{EntityId, EntityType};

/// Current membership of one child entity in one parent folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainmentEdge {
    pub parent_folder_id: EntityId,
    pub child_type: EntityType,
    pub child_id: EntityId,
    /// Set when the child was removed from this folder (or the folder itself
    /// was deleted), independent of the child's own `deleted` flag.
    pub deleted_in_folder: bool,
    /// Epoch ms of the removal, when flagged.
    pub deleted_date: Option<i64>,
}
