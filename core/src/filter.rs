//! Activity filter compilation.
//!
//! A declarative filter — scope × requested types × direction ×
//! continuation — compiles through a single static table into one
//! predicate + index hint per requested type. Requested types become
//! independent sub-queries and are never merged into one server-side
//! predicate; the query service unions result rows afterwards.

use serde::{Deserialize, Serialize};

use crate::continuation::{scroll_predicate, Continuation, SortDirection};
use crate::error::CoreError;
use crate::model::{ActivityKind, Address, LogStatus, TokenId};
use crate::store::query::{Field, HistoryQuery, IndexHint, Predicate, Value};

/// Requested activity type.
///
/// Mint, burn and transfer are all transfer-shaped records partitioned
/// by the zero-address sentinel; the remaining types map one-to-one to
/// stored kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// Transfer from the zero address.
    Mint,
    /// Transfer to the zero address.
    Burn,
    /// Transfer between two non-zero addresses.
    Transfer,
    /// Sell order listed.
    List,
    /// Bid placed.
    Bid,
    /// Orders matched.
    Match,
    /// Order cancelled.
    Cancel,
}

/// Query scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityScope {
    /// Whole stream.
    All,
    /// Activity of the given users.
    ByUser(Vec<Address>),
    /// Activity of one collection.
    ByCollection(Address),
    /// Activity of one item.
    ByItem(Address, TokenId),
}

/// A declarative activity filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilter {
    /// Query scope.
    pub scope: ActivityScope,
    /// Requested types; each compiles to its own sub-query.
    pub types: Vec<ActivityType>,
    /// Stream direction.
    pub direction: SortDirection,
    /// Opaque continuation token from a previous page.
    pub continuation: Option<String>,
}

/// One compiled sub-query, tagged with the type it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Requested type this sub-query serves.
    pub ty: ActivityType,
    /// Filter predicate, continuation scroll included.
    pub predicate: Predicate,
    /// Sort direction over (date, id).
    pub direction: SortDirection,
    /// Explicit index hint.
    pub hint: IndexHint,
}

impl CompiledQuery {
    /// Shapes the sub-query for a store with the given page limit.
    #[must_use]
    pub fn into_query(self, limit: usize) -> HistoryQuery {
        HistoryQuery {
            predicate: self.predicate,
            direction: self.direction,
            hint: self.hint,
            limit,
        }
    }
}

impl ActivityFilter {
    /// Compiles the filter into one sub-query per requested type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidContinuation`] when the continuation
    /// token cannot be decoded.
    pub fn compile(&self) -> Result<Vec<CompiledQuery>, CoreError> {
        let continuation = match &self.continuation {
            Some(token) => Some(Continuation::decode(token)?),
            None => None,
        };
        Ok(self
            .types
            .iter()
            .map(|ty| {
                let (base, hint) = compile_cell(&self.scope, *ty);
                let predicate = match scroll_predicate(self.direction, continuation.as_ref()) {
                    Some(scroll) => base.and(scroll),
                    None => base,
                };
                CompiledQuery {
                    ty: *ty,
                    predicate,
                    direction: self.direction,
                    hint,
                }
            })
            .collect())
    }
}

/// The static (scope, type) → (predicate, index hint) table.
///
/// One auditable place; every cell attaches an explicit hint.
fn compile_cell(scope: &ActivityScope, ty: ActivityType) -> (Predicate, IndexHint) {
    let (type_predicate, all_hint) = type_cell(ty);
    match scope {
        ActivityScope::All => (type_predicate, all_hint),
        ActivityScope::ByUser(users) => {
            let (field, hint) = user_field(ty);
            let user_predicate = if let [single] = users.as_slice() {
                Predicate::Eq(field, Value::Addr(*single))
            } else {
                Predicate::In(field, users.iter().map(|u| Value::Addr(*u)).collect())
            };
            (type_predicate.and(user_predicate), hint)
        }
        ActivityScope::ByCollection(contract) => (
            type_predicate.and(Predicate::Eq(Field::Token, Value::Addr(*contract))),
            IndexHint::CollectionDate,
        ),
        ActivityScope::ByItem(contract, token_id) => (
            type_predicate
                .and(Predicate::Eq(Field::Token, Value::Addr(*contract)))
                .and(Predicate::Eq(Field::TokenId, Value::TokenId(*token_id))),
            IndexHint::ItemDate,
        ),
    }
}

/// Base predicate and unscoped hint per requested type.
///
/// The sentinel partition mirrors [`crate::model::classify_transfer`]
/// exactly: mint iff from is zero; burn iff owner is zero and from is
/// not; transfer iff neither is zero.
fn type_cell(ty: ActivityType) -> (Predicate, IndexHint) {
    let confirmed = Predicate::Eq(Field::Status, Value::Status(LogStatus::Confirmed));
    let kind = |k: ActivityKind| Predicate::Eq(Field::Kind, Value::Kind(k));
    let zero = Value::Addr(Address::ZERO);
    match ty {
        ActivityType::Mint => (
            kind(ActivityKind::Transfer)
                .and(confirmed)
                .and(Predicate::Eq(Field::From, zero)),
            IndexHint::FromDate,
        ),
        ActivityType::Burn => (
            kind(ActivityKind::Transfer)
                .and(confirmed)
                .and(Predicate::Eq(Field::Owner, zero.clone()))
                .and(Predicate::Ne(Field::From, zero)),
            IndexHint::OwnerDate,
        ),
        ActivityType::Transfer => (
            kind(ActivityKind::Transfer)
                .and(confirmed)
                .and(Predicate::Ne(Field::From, zero.clone()))
                .and(Predicate::Ne(Field::Owner, zero)),
            IndexHint::KindDate,
        ),
        ActivityType::List => (kind(ActivityKind::List).and(confirmed), IndexHint::KindDate),
        ActivityType::Bid => (kind(ActivityKind::Bid).and(confirmed), IndexHint::KindDate),
        ActivityType::Match => (
            kind(ActivityKind::Match).and(confirmed),
            IndexHint::KindDate,
        ),
        ActivityType::Cancel => (
            kind(ActivityKind::Cancel).and(confirmed),
            IndexHint::KindDate,
        ),
    }
}

/// The address field a user scope constrains, per type.
///
/// Mints scope by the receiving owner; every other type scopes by the
/// sending side (the maker, for order kinds).
fn user_field(ty: ActivityType) -> (Field, IndexHint) {
    match ty {
        ActivityType::Mint => (Field::Owner, IndexHint::OwnerDate),
        _ => (Field::From, IndexHint::FromDate),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{classify_transfer, ActivityRecord, BlockOrdering, TransferClass};

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn transfer(from: Address, owner: Address) -> ActivityRecord {
        ActivityRecord {
            id: "t".to_string(),
            kind: ActivityKind::Transfer,
            token: addr(9),
            token_id: TokenId(1),
            from,
            owner,
            value: 1,
            date: Utc.timestamp_millis_opt(100).single().expect("ts"),
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

    fn compile_one(scope: ActivityScope, ty: ActivityType) -> CompiledQuery {
        let filter = ActivityFilter {
            scope,
            types: vec![ty],
            direction: SortDirection::LatestFirst,
            continuation: None,
        };
        filter
            .compile()
            .expect("compile")
            .into_iter()
            .next()
            .expect("one query")
    }

    #[test]
    fn test_sentinel_predicates_agree_with_classifier() {
        // The compiled mint/burn/transfer predicates must partition
        // transfer records exactly as classify_transfer does.
        let samples = [
            transfer(Address::ZERO, addr(1)),
            transfer(addr(1), Address::ZERO),
            transfer(addr(1), addr(2)),
            transfer(Address::ZERO, Address::ZERO),
        ];
        for record in &samples {
            let matched: Vec<ActivityType> =
                [ActivityType::Mint, ActivityType::Burn, ActivityType::Transfer]
                    .into_iter()
                    .filter(|ty| {
                        compile_one(ActivityScope::All, *ty)
                            .predicate
                            .matches(record)
                    })
                    .collect();
            assert_eq!(matched.len(), 1, "record must match exactly one class");
            let expected = match classify_transfer(record.from, record.owner) {
                TransferClass::Mint => ActivityType::Mint,
                TransferClass::Burn => ActivityType::Burn,
                TransferClass::Transfer => ActivityType::Transfer,
            };
            assert_eq!(matched, vec![expected]);
        }
    }

    #[test]
    fn test_reverted_records_excluded() {
        let mut record = transfer(addr(1), addr(2));
        record.status = LogStatus::Reverted;
        let q = compile_one(ActivityScope::All, ActivityType::Transfer);
        assert!(!q.predicate.matches(&record));
    }

    #[test]
    fn test_index_hints_per_cell() {
        let user = ActivityScope::ByUser(vec![addr(5)]);
        let coll = ActivityScope::ByCollection(addr(9));
        let item = ActivityScope::ByItem(addr(9), TokenId(1));

        let cases = [
            (ActivityScope::All, ActivityType::Mint, IndexHint::FromDate),
            (ActivityScope::All, ActivityType::Burn, IndexHint::OwnerDate),
            (
                ActivityScope::All,
                ActivityType::Transfer,
                IndexHint::KindDate,
            ),
            (ActivityScope::All, ActivityType::List, IndexHint::KindDate),
            (user.clone(), ActivityType::Mint, IndexHint::OwnerDate),
            (user.clone(), ActivityType::Burn, IndexHint::FromDate),
            (user.clone(), ActivityType::Match, IndexHint::FromDate),
            (coll.clone(), ActivityType::Mint, IndexHint::CollectionDate),
            (coll, ActivityType::Cancel, IndexHint::CollectionDate),
            (item.clone(), ActivityType::Transfer, IndexHint::ItemDate),
            (item, ActivityType::Bid, IndexHint::ItemDate),
        ];
        for (scope, ty, expected) in cases {
            let q = compile_one(scope.clone(), ty);
            assert_eq!(q.hint, expected, "hint for ({scope:?}, {ty:?})");
        }
    }

    #[test]
    fn test_user_scope_matches_only_requested_users() {
        let q = compile_one(
            ActivityScope::ByUser(vec![addr(5), addr(6)]),
            ActivityType::Transfer,
        );
        assert!(q.predicate.matches(&transfer(addr(5), addr(2))));
        assert!(q.predicate.matches(&transfer(addr(6), addr(2))));
        assert!(!q.predicate.matches(&transfer(addr(7), addr(2))));
    }

    #[test]
    fn test_user_scope_mint_matches_receiver() {
        let q = compile_one(ActivityScope::ByUser(vec![addr(5)]), ActivityType::Mint);
        assert!(q.predicate.matches(&transfer(Address::ZERO, addr(5))));
        assert!(!q.predicate.matches(&transfer(Address::ZERO, addr(6))));
    }

    #[test]
    fn test_item_scope_constrains_token_and_id() {
        let q = compile_one(ActivityScope::ByItem(addr(9), TokenId(1)), ActivityType::Transfer);
        let mut matching = transfer(addr(1), addr(2));
        assert!(q.predicate.matches(&matching));
        matching.token_id = TokenId(2);
        assert!(!q.predicate.matches(&matching));
    }

    #[test]
    fn test_types_compile_to_independent_sub_queries() {
        let filter = ActivityFilter {
            scope: ActivityScope::All,
            types: vec![ActivityType::Mint, ActivityType::Burn, ActivityType::List],
            direction: SortDirection::LatestFirst,
            continuation: None,
        };
        let compiled = filter.compile().expect("compile");
        assert_eq!(compiled.len(), 3);
        let types: Vec<_> = compiled.iter().map(|c| c.ty).collect();
        assert_eq!(
            types,
            vec![ActivityType::Mint, ActivityType::Burn, ActivityType::List]
        );
    }

    #[test]
    fn test_malformed_continuation_rejected() {
        let filter = ActivityFilter {
            scope: ActivityScope::All,
            types: vec![ActivityType::Mint],
            direction: SortDirection::LatestFirst,
            continuation: Some("garbage".to_string()),
        };
        assert!(matches!(
            filter.compile(),
            Err(CoreError::InvalidContinuation(_))
        ));
    }

    #[test]
    fn test_continuation_tightens_predicate() {
        let ts = Utc.timestamp_millis_opt(100).single().expect("ts");
        let token = Continuation::new(ts, "t").encode();
        let filter = ActivityFilter {
            scope: ActivityScope::All,
            types: vec![ActivityType::Transfer],
            direction: SortDirection::LatestFirst,
            continuation: Some(token),
        };
        let q = filter
            .compile()
            .expect("compile")
            .into_iter()
            .next()
            .expect("one");
        // Same (date, id) as the continuation: excluded.
        assert!(!q.predicate.matches(&transfer(addr(1), addr(2))));
    }
}
