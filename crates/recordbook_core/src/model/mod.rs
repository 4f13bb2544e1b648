//! Value types shared by the ledger accessors and services.
//!
//! # Responsibility
//! - Define live entity, revision snapshot, and containment edge shapes.
//! - Keep storage encodings (`as_str`/`parse`) next to the types they encode.
//!
//! # Invariants
//! - Revisions are immutable values; the only sanctioned mutation of persisted
//!   history is the deleted-flag correction done by folder restoration.
//! - Containment edges describe current membership, independent of the
//!   child entity's own `deleted` flag.

pub mod containment;
pub mod entity;
pub mod page;
pub mod revision;
