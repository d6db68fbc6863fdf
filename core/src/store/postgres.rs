//! Postgres store bindings over sqlx.
//!
//! Predicates render to SQL through [`sqlx::QueryBuilder`]; the index
//! hints map onto indexes provisioned by `ensure_indexes`. Duplicate
//! inserts rely on `ON CONFLICT DO NOTHING`, versioned order saves on a
//! conditional `UPDATE ... WHERE version = $n`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::query::{Field, HistoryQuery, IndexHint, Predicate, Value};
use super::{HistoryStore, OrderStore, SaveResult};
use crate::continuation::SortDirection;
use crate::error::StoreError;
use crate::model::{
    ActivityKind, ActivityRecord, Address, Asset, BlockOrdering, CanonicalOrder, LogStatus,
    OrderHash, OrderStatus, Platform, TokenId,
};

const HISTORY_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS activity_history (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    token TEXT NOT NULL,
    token_id TEXT NOT NULL,
    from_address TEXT NOT NULL,
    owner_address TEXT NOT NULL,
    value TEXT NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    tx_hash TEXT NOT NULL,
    block_number BIGINT NOT NULL,
    log_index INTEGER NOT NULL,
    minor_log_index INTEGER NOT NULL,
    order_hash TEXT
)";

const ORDER_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS canonical_order (
    hash TEXT PRIMARY KEY,
    maker TEXT NOT NULL,
    make JSONB NOT NULL,
    take JSONB NOT NULL,
    salt BIGINT NOT NULL,
    nonce BIGINT NOT NULL,
    fill TEXT NOT NULL,
    status TEXT NOT NULL,
    start_at TIMESTAMPTZ,
    end_at TIMESTAMPTZ,
    platform TEXT NOT NULL,
    signature TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    last_update_at TIMESTAMPTZ NOT NULL,
    version BIGINT NOT NULL
)";

const HISTORY_COLUMNS: &str = "id, kind, status, token, token_id, from_address, owner_address, \
     value, date, tx_hash, block_number, log_index, minor_log_index, order_hash";

const ORDER_COLUMNS: &str = "hash, maker, make, take, salt, nonce, fill, status, start_at, \
     end_at, platform, signature, created_at, last_update_at, version";

/// Postgres-backed history store.
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn find(&self, query: &HistoryQuery) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {HISTORY_COLUMNS} FROM activity_history WHERE "
        ));
        push_predicate(&mut qb, &query.predicate);
        match query.direction {
            SortDirection::LatestFirst => qb.push(" ORDER BY date DESC, id DESC"),
            SortDirection::EarliestFirst => qb.push(" ORDER BY date ASC, id ASC"),
        };
        qb.push(" LIMIT ");
        qb.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(history_from_row).collect()
    }

    async fn save(&self, record: ActivityRecord) -> Result<SaveResult, StoreError> {
        let result = sqlx::query(
            "INSERT INTO activity_history (id, kind, status, token, token_id, from_address, \
             owner_address, value, date, tx_hash, block_number, log_index, minor_log_index, \
             order_hash) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&record.id)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.token.to_string())
        .bind(record.token_id.to_string())
        .bind(record.from.to_string())
        .bind(record.owner.to_string())
        .bind(record.value.to_string())
        .bind(record.date)
        .bind(&record.tx_hash)
        .bind(i64::try_from(record.block.block_number).map_err(backend)?)
        .bind(i32::try_from(record.block.log_index).map_err(backend)?)
        .bind(i32::try_from(record.block.minor_log_index).map_err(backend)?)
        .bind(record.order_hash.map(|h| h.to_string()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::Duplicate)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn mark_reverted(&self, id: &str) -> Result<Option<ActivityRecord>, StoreError> {
        sqlx::query("UPDATE activity_history SET status = 'reverted' WHERE id = $1 AND status = 'confirmed'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM activity_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(history_from_row).transpose()
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        sqlx::query(HISTORY_TABLE_DDL).execute(&self.pool).await?;
        for hint in IndexHint::all() {
            let ddl = format!(
                "CREATE INDEX IF NOT EXISTS {} ON activity_history ({})",
                hint.index_name(),
                hint.columns().join(", ")
            );
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Postgres-backed canonical order store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provisions the aggregate table and its maker/nonce index.
    ///
    /// # Errors
    ///
    /// Returns a backend error when DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(ORDER_TABLE_DDL).execute(&self.pool).await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS order_maker_nonce ON canonical_order (maker, nonce)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_hash(&self, hash: &OrderHash) -> Result<Option<CanonicalOrder>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM canonical_order WHERE hash = $1"
        ))
        .bind(hash.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn save(&self, order: CanonicalOrder) -> Result<CanonicalOrder, StoreError> {
        let mut stored = order;
        let expected = stored.version;
        stored.version += 1;

        let make = serde_json::to_value(&stored.make).map_err(backend)?;
        let take = serde_json::to_value(&stored.take).map_err(backend)?;

        let rows_affected = if expected == 0 {
            sqlx::query(
                "INSERT INTO canonical_order (hash, maker, make, take, salt, nonce, fill, \
                 status, start_at, end_at, platform, signature, created_at, last_update_at, \
                 version) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                 $15) ON CONFLICT (hash) DO NOTHING",
            )
            .bind(stored.hash.to_string())
            .bind(stored.maker.to_string())
            .bind(&make)
            .bind(&take)
            .bind(i64::try_from(stored.salt).map_err(backend)?)
            .bind(i64::try_from(stored.nonce).map_err(backend)?)
            .bind(stored.fill.to_string())
            .bind(status_str(stored.status))
            .bind(stored.start)
            .bind(stored.end)
            .bind(stored.platform.as_str())
            .bind(&stored.signature)
            .bind(stored.created_at)
            .bind(stored.last_update_at)
            .bind(i64::try_from(stored.version).map_err(backend)?)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE canonical_order SET fill = $1, status = $2, signature = $3, \
                 last_update_at = $4, version = $5 WHERE hash = $6 AND version = $7",
            )
            .bind(stored.fill.to_string())
            .bind(status_str(stored.status))
            .bind(&stored.signature)
            .bind(stored.last_update_at)
            .bind(i64::try_from(stored.version).map_err(backend)?)
            .bind(stored.hash.to_string())
            .bind(i64::try_from(expected).map_err(backend)?)
            .execute(&self.pool)
            .await?
            .rows_affected()
        };

        if rows_affected == 0 {
            return Err(StoreError::VersionConflict(stored.hash.to_string()));
        }
        Ok(stored)
    }

    async fn find_by_maker_and_nonce_below(
        &self,
        maker: Address,
        min_nonce: u64,
    ) -> Result<Vec<CanonicalOrder>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM canonical_order WHERE maker = $1 AND nonce < $2"
        ))
        .bind(maker.to_string())
        .bind(i64::try_from(min_nonce).map_err(backend)?)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }
}

/// Renders a predicate into the query builder with bound parameters.
fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::And(children) | Predicate::Or(children) => {
            let keyword = if matches!(predicate, Predicate::And(_)) {
                " AND "
            } else {
                " OR "
            };
            if children.is_empty() {
                qb.push(if keyword == " AND " { "TRUE" } else { "FALSE" });
                return;
            }
            qb.push("(");
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    qb.push(keyword);
                }
                push_predicate(qb, child);
            }
            qb.push(")");
        }
        Predicate::Eq(field, value) => push_comparison(qb, *field, " = ", value),
        Predicate::Ne(field, value) => push_comparison(qb, *field, " <> ", value),
        Predicate::Lt(field, value) => push_comparison(qb, *field, " < ", value),
        Predicate::Gt(field, value) => push_comparison(qb, *field, " > ", value),
        Predicate::In(field, values) => {
            if values.is_empty() {
                // `IN ()` is not SQL; an empty list matches nothing,
                // agreeing with the reference interpreter.
                qb.push("FALSE");
                return;
            }
            qb.push(field.column());
            qb.push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(qb, value);
            }
            qb.push(")");
        }
    }
}

fn push_comparison(qb: &mut QueryBuilder<'_, Postgres>, field: Field, op: &str, value: &Value) {
    qb.push(field.column());
    qb.push(op);
    push_value(qb, value);
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Date(d) => {
            qb.push_bind(*d);
        }
        Value::Kind(k) => {
            qb.push_bind(k.as_str());
        }
        Value::Status(s) => {
            qb.push_bind(s.as_str());
        }
        Value::Addr(a) => {
            qb.push_bind(a.to_string());
        }
        Value::TokenId(t) => {
            qb.push_bind(t.to_string());
        }
        Value::Id(id) => {
            qb.push_bind(id.clone());
        }
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn history_from_row(row: &PgRow) -> Result<ActivityRecord, StoreError> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let token: String = row.try_get("token")?;
    let token_id: String = row.try_get("token_id")?;
    let from: String = row.try_get("from_address")?;
    let owner: String = row.try_get("owner_address")?;
    let value: String = row.try_get("value")?;
    let order_hash: Option<String> = row.try_get("order_hash")?;

    Ok(ActivityRecord {
        id: row.try_get("id")?,
        kind: parse_kind(&kind)?,
        token: Address::from_hex(&token).map_err(backend)?,
        token_id: TokenId::parse(&token_id).map_err(backend)?,
        from: Address::from_hex(&from).map_err(backend)?,
        owner: Address::from_hex(&owner).map_err(backend)?,
        value: value.parse().map_err(backend)?,
        date: row.try_get::<DateTime<Utc>, _>("date")?,
        status: parse_status(&status)?,
        tx_hash: row.try_get("tx_hash")?,
        block: BlockOrdering {
            block_number: u64::try_from(row.try_get::<i64, _>("block_number")?)
                .map_err(backend)?,
            log_index: u32::try_from(row.try_get::<i32, _>("log_index")?).map_err(backend)?,
            minor_log_index: u32::try_from(row.try_get::<i32, _>("minor_log_index")?)
                .map_err(backend)?,
        },
        order_hash: order_hash
            .map(|h| OrderHash::from_hex(&h).map_err(backend))
            .transpose()?,
    })
}

fn order_from_row(row: &PgRow) -> Result<CanonicalOrder, StoreError> {
    let hash: String = row.try_get("hash")?;
    let maker: String = row.try_get("maker")?;
    let make: serde_json::Value = row.try_get("make")?;
    let take: serde_json::Value = row.try_get("take")?;
    let fill: String = row.try_get("fill")?;
    let status: String = row.try_get("status")?;
    let platform: String = row.try_get("platform")?;

    Ok(CanonicalOrder {
        hash: OrderHash::from_hex(&hash).map_err(backend)?,
        maker: Address::from_hex(&maker).map_err(backend)?,
        make: serde_json::from_value::<Asset>(make).map_err(backend)?,
        take: serde_json::from_value::<Asset>(take).map_err(backend)?,
        salt: u64::try_from(row.try_get::<i64, _>("salt")?).map_err(backend)?,
        nonce: u64::try_from(row.try_get::<i64, _>("nonce")?).map_err(backend)?,
        fill: fill.parse().map_err(backend)?,
        status: parse_order_status(&status)?,
        start: row.try_get::<Option<DateTime<Utc>>, _>("start_at")?,
        end: row.try_get::<Option<DateTime<Utc>>, _>("end_at")?,
        platform: parse_platform(&platform)?,
        signature: row.try_get("signature")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        last_update_at: row.try_get::<DateTime<Utc>, _>("last_update_at")?,
        version: u64::try_from(row.try_get::<i64, _>("version")?).map_err(backend)?,
    })
}

fn parse_kind(s: &str) -> Result<ActivityKind, StoreError> {
    match s {
        "transfer" => Ok(ActivityKind::Transfer),
        "list" => Ok(ActivityKind::List),
        "bid" => Ok(ActivityKind::Bid),
        "match" => Ok(ActivityKind::Match),
        "cancel" => Ok(ActivityKind::Cancel),
        other => Err(StoreError::Backend(format!("unknown kind {other}"))),
    }
}

fn parse_status(s: &str) -> Result<LogStatus, StoreError> {
    match s {
        "pending" => Ok(LogStatus::Pending),
        "confirmed" => Ok(LogStatus::Confirmed),
        "reverted" => Ok(LogStatus::Reverted),
        other => Err(StoreError::Backend(format!("unknown status {other}"))),
    }
}

const fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Active => "active",
        OrderStatus::Inactive => "inactive",
        OrderStatus::NotStarted => "not_started",
        OrderStatus::Ended => "ended",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Filled => "filled",
    }
}

fn parse_order_status(s: &str) -> Result<OrderStatus, StoreError> {
    match s {
        "active" => Ok(OrderStatus::Active),
        "inactive" => Ok(OrderStatus::Inactive),
        "not_started" => Ok(OrderStatus::NotStarted),
        "ended" => Ok(OrderStatus::Ended),
        "cancelled" => Ok(OrderStatus::Cancelled),
        "filled" => Ok(OrderStatus::Filled),
        other => Err(StoreError::Backend(format!("unknown order status {other}"))),
    }
}

fn parse_platform(s: &str) -> Result<Platform, StoreError> {
    match s {
        "chain" => Ok(Platform::Chain),
        "opensea" => Ok(Platform::Opensea),
        "looksrare" => Ok(Platform::Looksrare),
        "x2y2" => Ok(Platform::X2y2),
        other => Err(StoreError::Backend(format!("unknown platform {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Active,
            OrderStatus::Inactive,
            OrderStatus::NotStarted,
            OrderStatus::Ended,
            OrderStatus::Cancelled,
            OrderStatus::Filled,
        ] {
            assert_eq!(parse_order_status(status_str(status)).ok(), Some(status));
        }
        assert!(parse_order_status("bogus").is_err());
    }

    #[test]
    fn test_kind_and_log_status_parse() {
        assert_eq!(parse_kind("transfer").ok(), Some(ActivityKind::Transfer));
        assert!(parse_kind("bogus").is_err());
        assert_eq!(parse_status("reverted").ok(), Some(LogStatus::Reverted));
        assert!(parse_status("bogus").is_err());
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!(parse_platform("looksrare").ok(), Some(Platform::Looksrare));
        assert!(parse_platform("bogus").is_err());
    }

    #[test]
    fn test_empty_in_renders_false() {
        // An empty user list must match nothing, not emit `IN ()`.
        let predicate = Predicate::Eq(Field::Kind, Value::Kind(ActivityKind::Transfer))
            .and(Predicate::In(Field::From, Vec::new()));
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_predicate(&mut qb, &predicate);
        let sql = qb.sql();
        assert!(sql.contains("FALSE"), "{sql}");
        assert!(!sql.contains("IN ("), "{sql}");
    }

    #[test]
    fn test_in_list_renders_bound_members() {
        let predicate = Predicate::In(
            Field::From,
            vec![Value::Addr(Address::ZERO), Value::Addr(Address::new([1; 20]))],
        );
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_predicate(&mut qb, &predicate);
        let sql = qb.sql();
        assert!(sql.contains("from_address IN ($1, $2)"), "{sql}");
    }
}
