//! Continuation tokens and scroll predicates.
//!
//! A continuation is an opaque, comparable resumption point in a
//! (date, id)-ordered stream. The id tie-break makes the walk
//! deterministic and gap-free even when many records share a timestamp,
//! which is common within one block.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::store::query::{Field, Predicate, Value};

/// Requested stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Oldest records first.
    EarliestFirst,
    /// Newest records first.
    LatestFirst,
}

/// A decoded continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    /// Timestamp of the last record of the previous page.
    pub after_date: DateTime<Utc>,
    /// Id of the last record of the previous page; tie-break key.
    pub after_id: String,
}

impl Continuation {
    /// Creates a continuation from a page's last record.
    #[must_use]
    pub fn new(after_date: DateTime<Utc>, after_id: impl Into<String>) -> Self {
        Self {
            after_date,
            after_id: after_id.into(),
        }
    }

    /// Encodes the continuation as an opaque token.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}_{}", self.after_date.timestamp_millis(), self.after_id)
    }

    /// Decodes a token produced by [`Continuation::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidContinuation`] on malformed input.
    /// A malformed token is a client error, never silently ignored.
    pub fn decode(token: &str) -> Result<Self, CoreError> {
        let (millis, id) = token
            .split_once('_')
            .ok_or_else(|| CoreError::InvalidContinuation(token.to_string()))?;
        if id.is_empty() {
            return Err(CoreError::InvalidContinuation(token.to_string()));
        }
        let millis: i64 = millis
            .parse()
            .map_err(|_| CoreError::InvalidContinuation(token.to_string()))?;
        let after_date = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| CoreError::InvalidContinuation(token.to_string()))?;
        Ok(Self {
            after_date,
            after_id: id.to_string(),
        })
    }
}

/// Builds the scroll predicate for resuming after a continuation.
///
/// LatestFirst: `date < after OR (date == after AND id < after_id)`;
/// EarliestFirst mirrors with `>`. An absent continuation means the
/// start of the stream in the requested direction, so no predicate.
#[must_use]
pub fn scroll_predicate(
    direction: SortDirection,
    continuation: Option<&Continuation>,
) -> Option<Predicate> {
    let c = continuation?;
    let date = Value::Date(c.after_date);
    let id = Value::Id(c.after_id.clone());
    let (primary, tie_break) = match direction {
        SortDirection::LatestFirst => (
            Predicate::Lt(Field::Date, date.clone()),
            Predicate::Lt(Field::Id, id),
        ),
        SortDirection::EarliestFirst => (
            Predicate::Gt(Field::Date, date.clone()),
            Predicate::Gt(Field::Id, id),
        ),
    };
    Some(Predicate::Or(vec![
        primary,
        Predicate::And(vec![Predicate::Eq(Field::Date, date), tie_break]),
    ]))
}
