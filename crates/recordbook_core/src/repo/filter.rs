//! Revision filter parsing and SQL predicate compilation.
//!
//! # Responsibility
//! - Parse caller-facing filter text (`RevisionFilter`) into a typed
//!   `RevisionPredicate`.
//! - Compile one predicate into one `WHERE` clause with bind values.
//!
//! # Invariants
//! - A query compiles its predicate exactly once; the count statement and the
//!   page statement reuse the same clause, so they can never disagree.
//! - User text reaches SQL only as bind values; `LIKE` wildcards in user
//!   text are escaped.

use crate::error::{LedgerError, LedgerResult};
use crate::model::entity::{EntityId, EntityType, UserId};
use crate::model::revision::{RevisionNumber, RevisionType};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

static FIELD_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid field term regex"));

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Caller-facing revision filter, as received from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionFilter {
    /// Exact username of the modifying user.
    pub modified_by: Option<String>,
    /// `from,to` as `YYYY-MM-DD`; either side may be blank. Both ends inclusive.
    pub date_range: Option<String>,
    /// Matches revisions whose changed-field summary contains any term.
    pub field_name_contains_any: Vec<String>,
    pub revision_type: Option<RevisionType>,
}

impl RevisionFilter {
    /// Parses this filter into a typed predicate.
    ///
    /// # Errors
    /// - `MalformedFilter` for an unparsable date range, an inverted range or
    ///   a field term with characters outside `[A-Za-z0-9_.-]`.
    pub fn to_predicate(&self) -> LedgerResult<RevisionPredicate> {
        let (from_ms, to_ms) = match self.date_range.as_deref().map(str::trim) {
            None | Some("") => (None, None),
            Some(raw) => parse_date_range(raw)?,
        };

        let mut terms = Vec::new();
        for term in &self.field_name_contains_any {
            let trimmed = term.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !FIELD_TERM_RE.is_match(trimmed) {
                return Err(LedgerError::malformed(
                    trimmed,
                    "field terms may only contain letters, digits, `_`, `.` or `-`",
                ));
            }
            terms.push(trimmed.to_string());
        }

        Ok(RevisionPredicate {
            revision_types: self.revision_type.into_iter().collect(),
            modified_by: self
                .modified_by
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            from_ms,
            to_ms,
            field_name_contains_any: terms,
            ..RevisionPredicate::default()
        })
    }
}

/// Typed predicate over revision metadata and snapshot headers.
///
/// Every populated member narrows the match; an empty predicate matches all
/// revisions of the queried entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionPredicate {
    pub number: Option<RevisionNumber>,
    /// Matches any of the listed kinds; empty means all kinds.
    pub revision_types: Vec<RevisionType>,
    pub modified_by: Option<UserId>,
    /// Inclusive lower bound on the revision timestamp (epoch ms).
    pub from_ms: Option<i64>,
    /// Inclusive upper bound on the revision timestamp (epoch ms).
    pub to_ms: Option<i64>,
    pub field_name_contains_any: Vec<String>,
    /// Owner recorded in the snapshot.
    pub owner: Option<UserId>,
    /// Deleted flag recorded in the snapshot.
    pub snapshot_deleted: Option<bool>,
}

/// Compiled `WHERE` clause over `revisions r JOIN revision_info i`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledPredicate {
    pub where_sql: String,
    pub binds: Vec<Value>,
}

pub(crate) fn compile_predicate(
    entity_type: EntityType,
    entity_id: Option<EntityId>,
    predicate: &RevisionPredicate,
) -> CompiledPredicate {
    let mut where_sql = String::from(" WHERE r.entity_type = ?");
    let mut binds = vec![Value::Text(entity_type.as_str().to_string())];

    if let Some(entity_id) = entity_id {
        where_sql.push_str(" AND r.entity_id = ?");
        binds.push(Value::Text(entity_id.to_string()));
    }

    if let Some(number) = predicate.number {
        where_sql.push_str(" AND r.rev = ?");
        binds.push(Value::Integer(number));
    }

    if !predicate.revision_types.is_empty() {
        let placeholders = vec!["?"; predicate.revision_types.len()].join(", ");
        where_sql.push_str(&format!(" AND r.rev_type IN ({placeholders})"));
        for kind in &predicate.revision_types {
            binds.push(Value::Text(kind.as_str().to_string()));
        }
    }

    if let Some(modified_by) = predicate.modified_by.as_ref() {
        where_sql.push_str(" AND i.modified_by = ?");
        binds.push(Value::Text(modified_by.clone()));
    }

    if let Some(from_ms) = predicate.from_ms {
        where_sql.push_str(" AND i.timestamp_ms >= ?");
        binds.push(Value::Integer(from_ms));
    }

    if let Some(to_ms) = predicate.to_ms {
        where_sql.push_str(" AND i.timestamp_ms <= ?");
        binds.push(Value::Integer(to_ms));
    }

    if !predicate.field_name_contains_any.is_empty() {
        let clauses = vec!["r.changed_fields LIKE ? ESCAPE '\\'"; predicate.field_name_contains_any.len()]
            .join(" OR ");
        where_sql.push_str(&format!(" AND ({clauses})"));
        for term in &predicate.field_name_contains_any {
            binds.push(Value::Text(format!("%{}%", escape_like(term))));
        }
    }

    if let Some(owner) = predicate.owner.as_ref() {
        where_sql.push_str(" AND r.owner = ?");
        binds.push(Value::Text(owner.clone()));
    }

    if let Some(deleted) = predicate.snapshot_deleted {
        where_sql.push_str(" AND r.is_deleted = ?");
        binds.push(Value::Integer(i64::from(deleted)));
    }

    CompiledPredicate { where_sql, binds }
}

/// Escapes `LIKE` wildcards so user text matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_date_range(raw: &str) -> LedgerResult<(Option<i64>, Option<i64>)> {
    let (from, to) = raw
        .split_once(',')
        .ok_or_else(|| LedgerError::malformed(raw, "expected `from,to`"))?;

    let from_ms = match parse_day(from.trim(), raw)? {
        Some(day) => Some(start_of_day_ms(day, raw)?),
        None => None,
    };
    let to_ms = match parse_day(to.trim(), raw)? {
        Some(day) => {
            let next = day
                .succ_opt()
                .ok_or_else(|| LedgerError::malformed(raw, "date out of range"))?;
            Some(start_of_day_ms(next, raw)? - 1)
        }
        None => None,
    };

    if let (Some(from_ms), Some(to_ms)) = (from_ms, to_ms) {
        if from_ms > to_ms {
            return Err(LedgerError::malformed(raw, "range start is after range end"));
        }
    }
    Ok((from_ms, to_ms))
}

fn parse_day(value: &str, raw: &str) -> LedgerResult<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|err| LedgerError::malformed(raw, format!("invalid date `{value}`: {err}")))
}

fn start_of_day_ms(day: NaiveDate, raw: &str) -> LedgerResult<i64> {
    day.and_hms_opt(0, 0, 0)
        .map(|start| start.and_utc().timestamp_millis())
        .ok_or_else(|| LedgerError::malformed(raw, "date out of range"))
}

#[cfg(test)]
mod tests {
    use super::{compile_predicate, escape_like, RevisionFilter, RevisionPredicate};
    use crate::error::LedgerError;
    use crate::model::entity::EntityType;
    use crate::model::revision::RevisionType;

    #[test]
    fn date_range_is_inclusive_on_both_days() {
        let filter = RevisionFilter {
            date_range: Some("2024-03-01,2024-03-02".to_string()),
            ..RevisionFilter::default()
        };
        let predicate = filter.to_predicate().unwrap();
        assert_eq!(predicate.from_ms, Some(1_709_251_200_000));
        assert_eq!(predicate.to_ms, Some(1_709_424_000_000 - 1));
    }

    #[test]
    fn open_ended_date_range_keeps_one_bound() {
        let filter = RevisionFilter {
            date_range: Some(",2024-03-01".to_string()),
            ..RevisionFilter::default()
        };
        let predicate = filter.to_predicate().unwrap();
        assert_eq!(predicate.from_ms, None);
        assert!(predicate.to_ms.is_some());
    }

    #[test]
    fn malformed_date_ranges_are_rejected() {
        for raw in ["yesterday", "2024-13-01,", "2024-03-05,2024-03-01"] {
            let filter = RevisionFilter {
                date_range: Some(raw.to_string()),
                ..RevisionFilter::default()
            };
            let err = filter.to_predicate().unwrap_err();
            assert!(matches!(err, LedgerError::MalformedFilter { .. }), "{raw}");
        }
    }

    #[test]
    fn field_terms_reject_sql_fragments() {
        let filter = RevisionFilter {
            field_name_contains_any: vec!["title".to_string(), "x' OR 1=1".to_string()],
            ..RevisionFilter::default()
        };
        assert!(matches!(
            filter.to_predicate().unwrap_err(),
            LedgerError::MalformedFilter { .. }
        ));
    }

    #[test]
    fn blank_values_are_ignored() {
        let filter = RevisionFilter {
            modified_by: Some("  ".to_string()),
            date_range: Some(" ".to_string()),
            field_name_contains_any: vec![" ".to_string()],
            revision_type: None,
        };
        assert_eq!(filter.to_predicate().unwrap(), RevisionPredicate::default());
    }

    #[test]
    fn compiled_clause_binds_every_placeholder() {
        let predicate = RevisionPredicate {
            revision_types: vec![RevisionType::Modified, RevisionType::Deleted],
            modified_by: Some("alice".to_string()),
            from_ms: Some(1),
            to_ms: Some(2),
            field_name_contains_any: vec!["name".to_string(), "state".to_string()],
            owner: Some("alice".to_string()),
            snapshot_deleted: Some(true),
            number: Some(7),
        };
        let compiled = compile_predicate(EntityType::Folder, None, &predicate);
        assert_eq!(
            compiled.where_sql.matches('?').count(),
            compiled.binds.len()
        );
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
