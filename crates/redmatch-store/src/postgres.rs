//! PostgreSQL-backed store.
//!
//! Connections come from a bounded pool sized at startup; the acquire
//! timeout is the only timeout boundary in the core, and sqlx returns
//! connections to the pool on every exit path, closing broken ones instead
//! of recycling them.
//!
//! The commit protocol runs entirely inside one transaction: every
//! allocation is a compare-and-decrement (`remaining >= amount_used` must
//! still hold), a single failed row aborts and rolls back the whole call,
//! and audit rows plus the batch digest land together with the decrements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redmatch_engine::{AllocationStore, CandidateSource};
use redmatch_types::{
    AuditEntry, BatchId, CreditLine, GroupKey, LineId, PartyId, RedmatchError, Result,
    StoreConfig,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::digest::{commit_digest, digest_hex};

fn db_err(err: sqlx::Error) -> RedmatchError {
    RedmatchError::Database(err.to_string())
}

/// Flat row shape; the nested [`GroupKey`] is rebuilt on the way out.
#[derive(Debug, sqlx::FromRow)]
struct CreditLineRow {
    line_id: Uuid,
    tax_rate: i16,
    buyer_id: Uuid,
    seller_id: Uuid,
    remaining: Decimal,
    last_update: DateTime<Utc>,
}

impl From<CreditLineRow> for CreditLine {
    fn from(row: CreditLineRow) -> Self {
        Self {
            id: LineId(row.line_id),
            key: GroupKey::new(row.tax_rate, PartyId(row.buyer_id), PartyId(row.seller_id)),
            remaining: row.remaining,
            last_update: row.last_update,
        }
    }
}

const FETCH_BY_KEY_SQL: &str = r"
    SELECT line_id, tax_rate, buyer_id, seller_id, remaining, last_update
    FROM credit_lines
    WHERE tax_rate = $1
      AND buyer_id = $2
      AND seller_id = $3
      AND remaining > 0
    ORDER BY remaining ASC, line_id ASC
    LIMIT $4
";

// One round-trip for all keys; each key gets its own LIMIT.
const FETCH_BY_KEYS_SQL: &str = r"
    SELECT c.line_id, c.tax_rate, c.buyer_id, c.seller_id, c.remaining, c.last_update
    FROM UNNEST($1::smallint[], $2::uuid[], $3::uuid[], $4::bigint[])
         AS k(tax_rate, buyer_id, seller_id, cap)
    CROSS JOIN LATERAL (
        SELECT line_id, tax_rate, buyer_id, seller_id, remaining, last_update
        FROM credit_lines
        WHERE tax_rate = k.tax_rate
          AND buyer_id = k.buyer_id
          AND seller_id = k.seller_id
          AND remaining > 0
        ORDER BY remaining ASC, line_id ASC
        LIMIT k.cap
    ) AS c
";

const DECREMENT_SQL: &str = r"
    UPDATE credit_lines
    SET remaining = remaining - $1,
        last_update = now()
    WHERE line_id = $2
      AND remaining >= $1
";

const INSERT_AUDIT_SQL: &str = r"
    INSERT INTO match_audit (batch_id, demand_id, line_id, amount_used)
    SELECT $1, t.demand_id, t.line_id, t.amount_used
    FROM UNNEST($2::uuid[], $3::uuid[], $4::numeric[])
         AS t(demand_id, line_id, amount_used)
";

const INSERT_BATCH_SQL: &str = r"
    INSERT INTO match_batches (batch_id, digest, entry_count)
    VALUES ($1, $2, $3)
";

const CURRENT_REMAINING_SQL: &str = r"
    SELECT line_id, remaining
    FROM credit_lines
    WHERE line_id = ANY($1)
";

/// Store handle over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build the pool and (optionally) apply embedded migrations.
    ///
    /// # Errors
    /// Returns [`RedmatchError::Database`] if the pool cannot be built or
    /// a migration fails.
    pub async fn connect(cfg: &StoreConfig) -> Result<Self> {
        info!(
            max_connections = cfg.max_connections,
            "connecting credit-line store"
        );
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .min_connections(cfg.min_connections)
            .acquire_timeout(cfg.acquire_timeout)
            .connect(&cfg.url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        if cfg.run_migrations {
            store.run_migrations().await?;
        }
        Ok(store)
    }

    /// Wrap an existing pool (tests, shared pools).
    #[must_use]
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations. Idempotent.
    ///
    /// # Errors
    /// Returns [`RedmatchError::Database`] on migration failure.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RedmatchError::Database(e.to_string()))
    }

    /// Whether the store answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CandidateSource for PgStore {
    async fn fetch_by_key(&self, key: &GroupKey, limit: i64) -> Result<Vec<CreditLine>> {
        let rows: Vec<CreditLineRow> = sqlx::query_as(FETCH_BY_KEY_SQL)
            .bind(key.tax_rate)
            .bind(key.buyer.0)
            .bind(key.seller.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        debug!(%key, rows = rows.len(), "fetched candidates");
        Ok(rows.into_iter().map(CreditLine::from).collect())
    }

    async fn fetch_by_keys(
        &self,
        requests: &[(GroupKey, i64)],
    ) -> Result<HashMap<GroupKey, Vec<CreditLine>>> {
        if requests.is_empty() {
            return Ok(HashMap::new());
        }

        let tax_rates: Vec<i16> = requests.iter().map(|(k, _)| k.tax_rate).collect();
        let buyers: Vec<Uuid> = requests.iter().map(|(k, _)| k.buyer.0).collect();
        let sellers: Vec<Uuid> = requests.iter().map(|(k, _)| k.seller.0).collect();
        let caps: Vec<i64> = requests.iter().map(|(_, cap)| *cap).collect();

        let rows: Vec<CreditLineRow> = sqlx::query_as(FETCH_BY_KEYS_SQL)
            .bind(&tax_rates)
            .bind(&buyers)
            .bind(&sellers)
            .bind(&caps)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        debug!(keys = requests.len(), rows = rows.len(), "batched fetch");
        let mut out: HashMap<GroupKey, Vec<CreditLine>> = HashMap::with_capacity(requests.len());
        for row in rows {
            let line = CreditLine::from(row);
            out.entry(line.key).or_default().push(line);
        }
        Ok(out)
    }
}

#[async_trait]
impl AllocationStore for PgStore {
    #[allow(clippy::cast_possible_wrap)]
    async fn commit(&self, entries: &[AuditEntry], batch: BatchId) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut conflicting: Vec<LineId> = Vec::new();
        let mut updated: u64 = 0;
        for entry in entries {
            let result = sqlx::query(DECREMENT_SQL)
                .bind(entry.amount_used)
                .bind(entry.line_id.0)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if result.rows_affected() == 0 {
                conflicting.push(entry.line_id);
            } else {
                updated += result.rows_affected();
            }
        }

        if !conflicting.is_empty() {
            tx.rollback().await.map_err(db_err)?;
            conflicting.sort();
            conflicting.dedup();

            // Identify what changed underneath us, for the operator log.
            let ids: Vec<Uuid> = conflicting.iter().map(|id| id.0).collect();
            if let Ok(rows) = sqlx::query_as::<_, (Uuid, Decimal)>(CURRENT_REMAINING_SQL)
                .bind(&ids)
                .fetch_all(&self.pool)
                .await
            {
                for (line_id, remaining) in rows {
                    warn!(%line_id, %remaining, "credit line changed under batch");
                }
            }
            warn!(
                %batch,
                conflicting = conflicting.len(),
                "commit rolled back on concurrent conflict"
            );
            return Err(RedmatchError::ConcurrentConflict { conflicting });
        }

        let demand_ids: Vec<Uuid> = entries.iter().map(|e| e.demand_id.0).collect();
        let line_ids: Vec<Uuid> = entries.iter().map(|e| e.line_id.0).collect();
        let amounts: Vec<Decimal> = entries.iter().map(|e| e.amount_used).collect();

        sqlx::query(INSERT_AUDIT_SQL)
            .bind(batch.0)
            .bind(&demand_ids)
            .bind(&line_ids)
            .bind(&amounts)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let digest = commit_digest(batch, entries);
        sqlx::query(INSERT_BATCH_SQL)
            .bind(batch.0)
            .bind(digest_hex(&digest))
            .bind(entries.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        info!(%batch, updated, "commit applied");
        Ok(updated)
    }
}
