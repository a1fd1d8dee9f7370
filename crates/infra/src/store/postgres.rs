//! Postgres-backed ledger.
//!
//! Same semantics as the in-memory store, as async methods over a `PgPool`.
//! Every write runs in one transaction that first takes a transaction-scoped
//! advisory lock per `(product, location)` balance it could lower, then reads
//! those balances, validates, and writes. Two writers drawing on the same
//! balance are therefore serialized; writers on unrelated balances are not.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | LedgerError | Scenario |
//! |-----------------------|-------------|----------|
//! | `23505` (unique violation) | `Domain(Conflict)` | Registering/renaming onto a taken id |
//! | `23503` (foreign key violation) | `Domain(Referential)` | Movement names an unknown product/location |
//! | `23514` (check violation) | `Domain(Validation)` | `qty <= 0` slipped past the domain types |
//! | anything else, pool closed, IO | `Storage` | Propagated unchanged |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument};

use stockflow_core::{DomainError, LocationId, MovementId, ProductId};
use stockflow_ledger::{Movement, MovementDraft, MovementValidator, Quantity, StockLine, Withdrawal};

use crate::error::{LedgerError, LedgerResult, log_write_failure};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        product_id VARCHAR(50) PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        location_id VARCHAR(50) PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_movements (
        movement_id   BIGSERIAL PRIMARY KEY,
        timestamp     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        from_location VARCHAR(50) NULL REFERENCES locations (location_id) ON UPDATE CASCADE,
        to_location   VARCHAR(50) NULL REFERENCES locations (location_id) ON UPDATE CASCADE,
        product_id    VARCHAR(50) NOT NULL REFERENCES products (product_id) ON UPDATE CASCADE,
        qty           INTEGER NOT NULL CHECK (qty > 0),
        CHECK (from_location IS NOT NULL OR to_location IS NOT NULL)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS product_movements_timestamp_idx
        ON product_movements (timestamp DESC, movement_id DESC)
    "#,
];

const MOVEMENT_COLUMNS: &str = "movement_id, timestamp, from_location, to_location, product_id, qty";

/// Postgres-backed products, locations and movement ledger.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip_all, err)]
    pub async fn ensure_schema(&self) -> LedgerResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(product = %id), err)]
    pub async fn register_product(&self, id: &ProductId) -> LedgerResult<()> {
        sqlx::query("INSERT INTO products (product_id) VALUES ($1)")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("register_product", e))?;
        Ok(())
    }

    /// Rename a product; movements follow through `ON UPDATE CASCADE`.
    #[instrument(skip_all, fields(product = %id, new_id = %new_id), err)]
    pub async fn rename_product(&self, id: &ProductId, new_id: &ProductId) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE products SET product_id = $2 WHERE product_id = $1")
            .bind(id.as_str())
            .bind(new_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_product", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("product", id.as_str()).into());
        }
        Ok(())
    }

    #[instrument(skip_all, fields(location = %id), err)]
    pub async fn register_location(&self, id: &LocationId) -> LedgerResult<()> {
        sqlx::query("INSERT INTO locations (location_id) VALUES ($1)")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("register_location", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(location = %id, new_id = %new_id), err)]
    pub async fn rename_location(&self, id: &LocationId, new_id: &LocationId) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE locations SET location_id = $2 WHERE location_id = $1")
            .bind(id.as_str())
            .bind(new_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_location", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("location", id.as_str()).into());
        }
        Ok(())
    }

    pub async fn products(&self) -> LedgerResult<Vec<ProductId>> {
        let rows = sqlx::query("SELECT product_id FROM products ORDER BY product_id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("products", e))?;
        rows.iter()
            .map(|row| parse_column(row, "product_id", |s| ProductId::parse(s)))
            .collect()
    }

    pub async fn locations(&self) -> LedgerResult<Vec<LocationId>> {
        let rows = sqlx::query("SELECT location_id FROM locations ORDER BY location_id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("locations", e))?;
        rows.iter()
            .map(|row| parse_column(row, "location_id", |s| LocationId::parse(s)))
            .collect()
    }

    /// Validate and append a movement atomically.
    #[instrument(skip_all, fields(product = %draft.product_id, qty = draft.qty.get()))]
    pub async fn record_movement(&self, draft: MovementDraft) -> LedgerResult<Movement> {
        let movement = self
            .insert_movement(draft)
            .await
            .inspect_err(log_write_failure)?;
        info!(movement_id = %movement.movement_id, "movement recorded");
        Ok(movement)
    }

    /// Validate and apply an amendment atomically.
    ///
    /// The movement row is locked (`FOR UPDATE`) before its old contribution is
    /// read, so concurrent amendments of the same movement queue up.
    #[instrument(skip_all, fields(movement_id = %id))]
    pub async fn amend_movement(&self, id: MovementId, draft: MovementDraft) -> LedgerResult<Movement> {
        let amended = self
            .update_movement(id, draft)
            .await
            .inspect_err(log_write_failure)?;
        info!("movement amended");
        Ok(amended)
    }

    async fn insert_movement(&self, draft: MovementDraft) -> LedgerResult<Movement> {
        draft.validate()?;
        let withdrawals = MovementValidator::withdrawals(None, &draft);

        let mut tx = self.begin().await?;
        lock_balances(&mut tx, &withdrawals).await?;
        check_references(&mut tx, &draft).await?;
        check_withdrawals(&mut tx, &withdrawals).await?;

        let row = sqlx::query(&format!(
            "INSERT INTO product_movements (timestamp, from_location, to_location, product_id, qty) \
             VALUES (COALESCE($1, NOW()), $2, $3, $4, $5) RETURNING {MOVEMENT_COLUMNS}"
        ))
        .bind(draft.occurred_at)
        .bind(draft.from_location.as_ref().map(LocationId::as_str))
        .bind(draft.to_location.as_ref().map(LocationId::as_str))
        .bind(draft.product_id.as_str())
        .bind(qty_column(draft.qty))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        let movement = movement_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(movement)
    }

    async fn update_movement(&self, id: MovementId, draft: MovementDraft) -> LedgerResult<Movement> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM product_movements WHERE movement_id = $1 FOR UPDATE"
        ))
        .bind(id_column(id)?)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_movement", e))?;
        let current = match row {
            Some(row) => movement_from_row(&row)?,
            None => return Err(DomainError::not_found("movement", id.to_string()).into()),
        };

        draft.validate()?;
        let withdrawals = MovementValidator::withdrawals(Some(&current), &draft);
        lock_balances(&mut tx, &withdrawals).await?;
        check_references(&mut tx, &draft).await?;
        check_withdrawals(&mut tx, &withdrawals).await?;

        let row = sqlx::query(&format!(
            "UPDATE product_movements \
             SET from_location = $2, to_location = $3, product_id = $4, qty = $5 \
             WHERE movement_id = $1 RETURNING {MOVEMENT_COLUMNS}"
        ))
        .bind(id_column(id)?)
        .bind(draft.from_location.as_ref().map(LocationId::as_str))
        .bind(draft.to_location.as_ref().map(LocationId::as_str))
        .bind(draft.product_id.as_str())
        .bind(qty_column(draft.qty))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_movement", e))?;
        let amended = movement_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(amended)
    }

    pub async fn movement(&self, id: MovementId) -> LedgerResult<Movement> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM product_movements WHERE movement_id = $1"
        ))
        .bind(id_column(id)?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement", e))?;
        match row {
            Some(row) => movement_from_row(&row),
            None => Err(DomainError::not_found("movement", id.to_string()).into()),
        }
    }

    /// Every movement, newest first.
    pub async fn movement_history(&self) -> LedgerResult<Vec<Movement>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM product_movements ORDER BY timestamp DESC, movement_id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement_history", e))?;
        rows.iter().map(movement_from_row).collect()
    }

    pub async fn balance(&self, product: &ProductId, location: &LocationId) -> LedgerResult<i64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        balance_on(&mut conn, product, location).await
    }

    /// Positive balances, product-major, computed in a single grouped query.
    pub async fn stock_report(&self) -> LedgerResult<Vec<StockLine>> {
        let rows = sqlx::query(
            r#"
            WITH deltas AS (
                SELECT product_id, to_location AS location_id, qty::BIGINT AS delta
                FROM product_movements
                WHERE to_location IS NOT NULL
                UNION ALL
                SELECT product_id, from_location AS location_id, -qty::BIGINT AS delta
                FROM product_movements
                WHERE from_location IS NOT NULL
            )
            SELECT product_id, location_id, SUM(delta)::BIGINT AS balance
            FROM deltas
            GROUP BY product_id, location_id
            HAVING SUM(delta) > 0
            ORDER BY product_id, location_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_report", e))?;

        rows.iter()
            .map(|row| {
                Ok(StockLine {
                    product_id: parse_column(row, "product_id", |s| ProductId::parse(s))?,
                    location_id: parse_column(row, "location_id", |s| LocationId::parse(s))?,
                    balance: row
                        .try_get::<i64, _>("balance")
                        .map_err(|e| map_sqlx_error("decode_balance", e))?,
                })
            })
            .collect()
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Advisory lock key text for one balance.
fn lock_key(product: &ProductId, location: &LocationId) -> String {
    format!("stockflow:{product}\u{1f}{location}")
}

/// Lock every balance about to be drawn on, in a stable order so two writers
/// never wait on each other crosswise.
async fn lock_balances(
    tx: &mut Transaction<'static, Postgres>,
    withdrawals: &[Withdrawal],
) -> LedgerResult<()> {
    let mut keys: Vec<String> = withdrawals
        .iter()
        .map(|w| lock_key(&w.product_id, &w.location_id))
        .collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;
    }
    Ok(())
}

async fn check_references(
    tx: &mut Transaction<'static, Postgres>,
    draft: &MovementDraft,
) -> LedgerResult<()> {
    let product_known: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE product_id = $1)")
            .bind(draft.product_id.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("check_product", e))?;
    if !product_known {
        return Err(DomainError::referential(format!(
            "product '{}' is not registered",
            draft.product_id
        ))
        .into());
    }

    for location in draft.from_location.iter().chain(draft.to_location.iter()) {
        let known: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM locations WHERE location_id = $1)")
                .bind(location.as_str())
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("check_location", e))?;
        if !known {
            return Err(
                DomainError::referential(format!("location '{location}' is not registered")).into(),
            );
        }
    }
    Ok(())
}

async fn check_withdrawals(
    tx: &mut Transaction<'static, Postgres>,
    withdrawals: &[Withdrawal],
) -> LedgerResult<()> {
    for w in withdrawals {
        let available = balance_on(&mut **tx, &w.product_id, &w.location_id).await?;
        w.check(available)?;
    }
    Ok(())
}

async fn balance_on(
    conn: &mut sqlx::PgConnection,
    product: &ProductId,
    location: &LocationId,
) -> LedgerResult<i64> {
    sqlx::query_scalar(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN to_location = $2 THEN qty ELSE 0 END), 0)::BIGINT
          - COALESCE(SUM(CASE WHEN from_location = $2 THEN qty ELSE 0 END), 0)::BIGINT
        FROM product_movements
        WHERE product_id = $1 AND (to_location = $2 OR from_location = $2)
        "#,
    )
    .bind(product.as_str())
    .bind(location.as_str())
    .fetch_one(conn)
    .await
    .map_err(|e| map_sqlx_error("balance", e))
}

fn id_column(id: MovementId) -> LedgerResult<i64> {
    i64::try_from(id.get())
        .map_err(|_| DomainError::not_found("movement", id.to_string()).into())
}

fn qty_column(qty: Quantity) -> i32 {
    // Quantity is bounded by i32::MAX.
    qty.get() as i32
}

fn parse_column<T>(
    row: &PgRow,
    column: &str,
    parse: impl Fn(&str) -> Result<T, DomainError>,
) -> LedgerResult<T> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode_row", e))?;
    parse(&raw).map_err(|e| LedgerError::storage(format!("corrupt {column} '{raw}': {e}")))
}

fn parse_optional_location(row: &PgRow, column: &str) -> LedgerResult<Option<LocationId>> {
    let raw: Option<String> = row
        .try_get(column)
        .map_err(|e| map_sqlx_error("decode_row", e))?;
    raw.map(|s| {
        LocationId::parse(&s)
            .map_err(|e| LedgerError::storage(format!("corrupt {column} '{s}': {e}")))
    })
    .transpose()
}

fn movement_from_row(row: &PgRow) -> LedgerResult<Movement> {
    let id: i64 = row
        .try_get("movement_id")
        .map_err(|e| map_sqlx_error("decode_row", e))?;
    let timestamp: DateTime<Utc> = row
        .try_get("timestamp")
        .map_err(|e| map_sqlx_error("decode_row", e))?;
    let qty: i32 = row
        .try_get("qty")
        .map_err(|e| map_sqlx_error("decode_row", e))?;

    Ok(Movement {
        movement_id: u64::try_from(id)
            .map(MovementId::new)
            .map_err(|_| LedgerError::storage(format!("corrupt movement_id {id}")))?,
        timestamp,
        product_id: parse_column(row, "product_id", |s| ProductId::parse(s))?,
        from_location: parse_optional_location(row, "from_location")?,
        to_location: parse_optional_location(row, "to_location")?,
        qty: Quantity::new(i64::from(qty))
            .map_err(|e| LedgerError::storage(format!("corrupt qty {qty}: {e}")))?,
    })
}

/// Maps SQLx errors to ledger errors (see the table in the module docs).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{} in {}", db_err.message(), operation);
            match db_err.code().as_deref() {
                Some("23505") => DomainError::conflict(msg).into(),
                Some("23503") => DomainError::referential(msg).into(),
                Some("23514") => DomainError::validation(msg).into(),
                _ => LedgerError::storage(format!("database error in {operation}: {}", db_err.message())),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerError::storage(format!("connection pool closed in {operation}"))
        }
        _ => LedgerError::storage(format!("sqlx error in {operation}: {err}")),
    }
}
