//! Runtime settings for the ledger layer.
//!
//! # Responsibility
//! - Carry page-size limits, default retention depth and store timeouts.
//! - Deserialize from any serde format; missing keys fall back to defaults.
//!
//! # Invariants
//! - `page_max_limit >= page_default_limit > 0` after [`LedgerSettings::validated`].
//! - `retention_max_to_keep > 0`.

use serde::Deserialize;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 50;
const DEFAULT_RETENTION_MAX_TO_KEEP: usize = 20;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Ledger layer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Page size used when a caller passes no limit (or zero).
    pub page_default_limit: u32,
    /// Upper clamp applied to caller-supplied page limits.
    pub page_max_limit: u32,
    /// Revisions kept per entity when compaction runs without an explicit depth.
    pub retention_max_to_keep: usize,
    /// SQLite busy timeout applied on open.
    pub busy_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            page_default_limit: DEFAULT_PAGE_LIMIT,
            page_max_limit: MAX_PAGE_LIMIT,
            retention_max_to_keep: DEFAULT_RETENTION_MAX_TO_KEEP,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl LedgerSettings {
    /// Returns a copy with out-of-range values replaced by defaults.
    pub fn validated(mut self) -> Self {
        if self.page_default_limit == 0 {
            self.page_default_limit = DEFAULT_PAGE_LIMIT;
        }
        if self.page_max_limit < self.page_default_limit {
            self.page_max_limit = self.page_default_limit;
        }
        if self.retention_max_to_keep == 0 {
            self.retention_max_to_keep = DEFAULT_RETENTION_MAX_TO_KEEP;
        }
        self
    }

    /// Normalizes a caller page limit: `None`/`0` selects the default,
    /// anything above the maximum is clamped.
    pub fn normalize_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            None | Some(0) => self.page_default_limit,
            Some(value) => value.min(self.page_max_limit),
        }
    }
}
