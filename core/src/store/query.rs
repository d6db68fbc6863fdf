//! Declarative history queries.
//!
//! The filter compiler produces a [`HistoryQuery`] — predicate, sort
//! direction, and index hint — which store bindings interpret: the
//! memory store evaluates the predicate directly, the Postgres store
//! renders it to SQL. The predicate language is deliberately closed so
//! the compiled table stays auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::continuation::SortDirection;
use crate::model::{ActivityKind, ActivityRecord, Address, LogStatus, TokenId};

/// Queryable fields of an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Stored activity kind.
    Kind,
    /// Confirmation status.
    Status,
    /// Collection contract.
    Token,
    /// Token id.
    TokenId,
    /// Sending side.
    From,
    /// Receiving side.
    Owner,
    /// Event timestamp.
    Date,
    /// Record id.
    Id,
}

impl Field {
    /// Column name used by SQL bindings.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Kind => "kind",
            Self::Status => "status",
            Self::Token => "token",
            Self::TokenId => "token_id",
            Self::From => "from_address",
            Self::Owner => "owner_address",
            Self::Date => "date",
            Self::Id => "id",
        }
    }
}

/// A typed comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Activity kind discriminant.
    Kind(ActivityKind),
    /// Status discriminant.
    Status(LogStatus),
    /// Address value.
    Addr(Address),
    /// Token id value.
    TokenId(TokenId),
    /// Timestamp value.
    Date(DateTime<Utc>),
    /// Record id value.
    Id(String),
}

impl Value {
    /// Ordering against another value of the same variant.
    fn cmp_same(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Id(a), Self::Id(b)) => Some(a.cmp(b)),
            (Self::TokenId(a), Self::TokenId(b)) => Some(a.cmp(b)),
            (Self::Addr(a), Self::Addr(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// A closed predicate tree over activity records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// All children hold.
    And(Vec<Predicate>),
    /// Any child holds.
    Or(Vec<Predicate>),
    /// Field equals value.
    Eq(Field, Value),
    /// Field differs from value.
    Ne(Field, Value),
    /// Field is one of the values.
    In(Field, Vec<Value>),
    /// Field is strictly less than value.
    Lt(Field, Value),
    /// Field is strictly greater than value.
    Gt(Field, Value),
}

impl Predicate {
    /// Evaluates the predicate against a record.
    ///
    /// This is the reference semantics; SQL renderings must agree with
    /// it.
    #[must_use]
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        match self {
            Self::And(children) => children.iter().all(|p| p.matches(record)),
            Self::Or(children) => children.iter().any(|p| p.matches(record)),
            Self::Eq(field, value) => &field_value(record, *field) == value,
            Self::Ne(field, value) => &field_value(record, *field) != value,
            Self::In(field, values) => values.contains(&field_value(record, *field)),
            Self::Lt(field, value) => {
                field_value(record, *field).cmp_same(value) == Some(std::cmp::Ordering::Less)
            }
            Self::Gt(field, value) => {
                field_value(record, *field).cmp_same(value) == Some(std::cmp::Ordering::Greater)
            }
        }
    }

    /// Conjoins this predicate with another.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }
}

/// Extracts the typed value of a field from a record.
fn field_value(record: &ActivityRecord, field: Field) -> Value {
    match field {
        Field::Kind => Value::Kind(record.kind),
        Field::Status => Value::Status(record.status),
        Field::Token => Value::Addr(record.token),
        Field::TokenId => Value::TokenId(record.token_id),
        Field::From => Value::Addr(record.from),
        Field::Owner => Value::Addr(record.owner),
        Field::Date => Value::Date(record.date),
        Field::Id => Value::Id(record.id.clone()),
    }
}

/// Index selection hint attached to every compiled query.
///
/// Wrong-index selection is a latency-fatal bug, so the hint is always
/// explicit and unit-tested per (scope, type) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexHint {
    /// (kind, status, date, id) — unscoped type queries.
    KindDate,
    /// (kind, status, from, date, id) — sender-scoped queries.
    FromDate,
    /// (kind, status, owner, date, id) — owner-scoped queries.
    OwnerDate,
    /// (kind, status, token, date, id) — collection-scoped queries.
    CollectionDate,
    /// (kind, status, token, token_id, date, id) — item-scoped queries.
    ItemDate,
}

impl IndexHint {
    /// Stable index name used by `ensure_indexes`.
    #[must_use]
    pub const fn index_name(&self) -> &'static str {
        match self {
            Self::KindDate => "activity_kind_date",
            Self::FromDate => "activity_from_date",
            Self::OwnerDate => "activity_owner_date",
            Self::CollectionDate => "activity_collection_date",
            Self::ItemDate => "activity_item_date",
        }
    }

    /// Indexed columns in order.
    #[must_use]
    pub const fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::KindDate => &["kind", "status", "date", "id"],
            Self::FromDate => &["kind", "status", "from_address", "date", "id"],
            Self::OwnerDate => &["kind", "status", "owner_address", "date", "id"],
            Self::CollectionDate => &["kind", "status", "token", "date", "id"],
            Self::ItemDate => &["kind", "status", "token", "token_id", "date", "id"],
        }
    }

    /// All hints, for index provisioning.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::KindDate,
            Self::FromDate,
            Self::OwnerDate,
            Self::CollectionDate,
            Self::ItemDate,
        ]
    }
}

/// A fully shaped history query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Filter predicate.
    pub predicate: Predicate,
    /// Sort direction over (date, id).
    pub direction: SortDirection,
    /// Index hint.
    pub hint: IndexHint,
    /// Maximum rows returned.
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::BlockOrdering;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn record(id: &str, millis: i64) -> ActivityRecord {
        ActivityRecord {
            id: id.to_string(),
            kind: ActivityKind::Transfer,
            token: addr(9),
            token_id: TokenId(1),
            from: addr(1),
            owner: addr(2),
            value: 1,
            date: Utc.timestamp_millis_opt(millis).single().expect("ts"),
            status: LogStatus::Confirmed,
            tx_hash: "0xtx".to_string(),
            block: BlockOrdering {
                block_number: 1,
                log_index: 0,
                minor_log_index: 0,
            },
            order_hash: None,
        }
    }

    #[test]
    fn test_eq_ne() {
        let r = record("a", 100);
        assert!(Predicate::Eq(Field::Kind, Value::Kind(ActivityKind::Transfer)).matches(&r));
        assert!(!Predicate::Eq(Field::Kind, Value::Kind(ActivityKind::List)).matches(&r));
        assert!(Predicate::Ne(Field::From, Value::Addr(Address::ZERO)).matches(&r));
    }

    #[test]
    fn test_in() {
        let r = record("a", 100);
        let p = Predicate::In(
            Field::Owner,
            vec![Value::Addr(addr(2)), Value::Addr(addr(3))],
        );
        assert!(p.matches(&r));
        let p = Predicate::In(Field::Owner, vec![Value::Addr(addr(3))]);
        assert!(!p.matches(&r));
    }

    #[test]
    fn test_lt_gt_on_date_and_id() {
        let r = record("b", 100);
        let ts = |m| Utc.timestamp_millis_opt(m).single().expect("ts");
        assert!(Predicate::Lt(Field::Date, Value::Date(ts(101))).matches(&r));
        assert!(!Predicate::Lt(Field::Date, Value::Date(ts(100))).matches(&r));
        assert!(Predicate::Gt(Field::Id, Value::Id("a".to_string())).matches(&r));
        assert!(!Predicate::Gt(Field::Id, Value::Id("b".to_string())).matches(&r));
    }

    #[test]
    fn test_mismatched_value_types_never_match_ranges() {
        let r = record("a", 100);
        // Lt over incomparable variants is false, not a panic.
        assert!(!Predicate::Lt(Field::Date, Value::Id("x".to_string())).matches(&r));
    }

    #[test]
    fn test_and_or() {
        let r = record("a", 100);
        let yes = Predicate::Eq(Field::Status, Value::Status(LogStatus::Confirmed));
        let no = Predicate::Eq(Field::Status, Value::Status(LogStatus::Reverted));
        assert!(Predicate::And(vec![yes.clone(), yes.clone()]).matches(&r));
        assert!(!Predicate::And(vec![yes.clone(), no.clone()]).matches(&r));
        assert!(Predicate::Or(vec![no.clone(), yes.clone()]).matches(&r));
        assert!(!Predicate::Or(vec![no.clone(), no]).matches(&r));
    }

    #[test]
    fn test_and_combinator_flattens() {
        let a = Predicate::Eq(Field::Status, Value::Status(LogStatus::Confirmed));
        let b = Predicate::Eq(Field::Kind, Value::Kind(ActivityKind::Transfer));
        let c = Predicate::Ne(Field::From, Value::Addr(Address::ZERO));
        match a.and(b).and(c) {
            Predicate::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_index_hint_names_unique() {
        let mut names: Vec<_> = IndexHint::all().iter().map(|h| h.index_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), IndexHint::all().len());
    }
}
