//! # PostgreSQL Positions Repository
//!
//! Relational implementation of [`PositionsRepository`]. The table carries a
//! unique constraint on `(strategy_id, instrument_id)`; `upsert` rides on
//! `ON CONFLICT` against that constraint so the one-position-per-pair rule
//! holds without a read-first round trip.

use crate::domain::entities::Position;
use crate::domain::value_objects::{InstrumentId, PositionId, StrategyId};
use crate::infrastructure::persistence::postgres::map_sqlx_err;
use crate::infrastructure::persistence::traits::{
    PositionsRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Relational implementation of [`PositionsRepository`].
#[derive(Debug, Clone)]
pub struct PostgresPositionsRepository {
    pool: PgPool,
    schema: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PositionRow {
    position_id: String,
    strategy_id: String,
    instrument_id: String,
    quantity: Decimal,
    average_entry_price: Decimal,
    current_price: Decimal,
    market_value: Decimal,
    unrealized_pnl: Decimal,
    realized_pnl: Decimal,
    cost_basis: Decimal,
    exposure: Decimal,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Self {
            position_id: PositionId::new(row.position_id),
            strategy_id: StrategyId::new(row.strategy_id),
            instrument_id: InstrumentId::new(row.instrument_id),
            quantity: row.quantity,
            average_entry_price: row.average_entry_price,
            current_price: row.current_price,
            market_value: row.market_value,
            unrealized_pnl: row.unrealized_pnl,
            realized_pnl: row.realized_pnl,
            cost_basis: row.cost_basis,
            exposure: row.exposure,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "position_id, strategy_id, instrument_id, quantity, average_entry_price, \
     current_price, market_value, unrealized_pnl, realized_pnl, cost_basis, exposure, \
     opened_at, closed_at, updated_at";

impl PostgresPositionsRepository {
    /// Creates a repository over an existing pool, scoped to `schema`.
    #[must_use]
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        format!("{}.positions", self.schema)
    }
}

#[async_trait]
impl PositionsRepository for PostgresPositionsRepository {
    async fn get(
        &self,
        strategy_id: &StrategyId,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Option<Position>> {
        let row: Option<PositionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE strategy_id = $1 AND instrument_id = $2",
            self.table()
        ))
        .bind(strategy_id.as_str())
        .bind(instrument_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", strategy_id.as_str()))?;
        Ok(row.map(Position::from))
    }

    async fn upsert(&self, position: &Position) -> RepositoryResult<Position> {
        position.validate().map_err(RepositoryError::validation)?;
        let row: PositionRow = sqlx::query_as(&format!(
            "INSERT INTO {} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (strategy_id, instrument_id) DO UPDATE SET \
               position_id = EXCLUDED.position_id, quantity = EXCLUDED.quantity, \
               average_entry_price = EXCLUDED.average_entry_price, \
               current_price = EXCLUDED.current_price, market_value = EXCLUDED.market_value, \
               unrealized_pnl = EXCLUDED.unrealized_pnl, realized_pnl = EXCLUDED.realized_pnl, \
               cost_basis = EXCLUDED.cost_basis, exposure = EXCLUDED.exposure, \
               closed_at = EXCLUDED.closed_at, updated_at = EXCLUDED.updated_at \
             RETURNING {COLUMNS}",
            self.table()
        ))
        .bind(position.position_id.as_str())
        .bind(position.strategy_id.as_str())
        .bind(position.instrument_id.as_str())
        .bind(position.quantity)
        .bind(position.average_entry_price)
        .bind(position.current_price)
        .bind(position.market_value)
        .bind(position.unrealized_pnl)
        .bind(position.realized_pnl)
        .bind(position.cost_basis)
        .bind(position.exposure)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .bind(position.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", position.position_id.as_str()))?;
        Ok(Position::from(row))
    }

    async fn update_market_price(
        &self,
        id: &PositionId,
        current_price: Decimal,
    ) -> RepositoryResult<Position> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_err(e, "Position", id.as_str()))?;
        let row: Option<PositionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE position_id = $1 FOR UPDATE",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", id.as_str()))?;
        let mut position = row
            .map(Position::from)
            .ok_or_else(|| RepositoryError::not_found("Position", id.as_str()))?;
        position.recompute(current_price, Utc::now());
        sqlx::query(&format!(
            "UPDATE {} SET current_price = $2, market_value = $3, unrealized_pnl = $4, \
             exposure = $5, updated_at = $6 WHERE position_id = $1",
            self.table()
        ))
        .bind(position.position_id.as_str())
        .bind(position.current_price)
        .bind(position.market_value)
        .bind(position.unrealized_pnl)
        .bind(position.exposure)
        .bind(position.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", id.as_str()))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_err(e, "Position", id.as_str()))?;
        Ok(position)
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Position>> {
        let rows: Vec<PositionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE strategy_id = $1 ORDER BY position_id",
            self.table()
        ))
        .bind(strategy_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", strategy_id.as_str()))?;
        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn list_open(&self) -> RepositoryResult<Vec<Position>> {
        let rows: Vec<PositionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE quantity <> 0 ORDER BY position_id",
            self.table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", ""))?;
        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn total_exposure(&self, strategy_id: Option<&StrategyId>) -> RepositoryResult<Decimal> {
        let sum: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(exposure), 0) FROM {} \
             WHERE quantity <> 0 AND ($1::text IS NULL OR strategy_id = $1)",
            self.table()
        ))
        .bind(strategy_id.map(|s| s.as_str().to_string()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", ""))?;
        Ok(sum)
    }

    async fn total_unrealized_pnl(
        &self,
        strategy_id: Option<&StrategyId>,
    ) -> RepositoryResult<Decimal> {
        let sum: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(unrealized_pnl), 0) FROM {} \
             WHERE quantity <> 0 AND ($1::text IS NULL OR strategy_id = $1)",
            self.table()
        ))
        .bind(strategy_id.map(|s| s.as_str().to_string()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", ""))?;
        Ok(sum)
    }

    async fn delete(&self, id: &PositionId) -> RepositoryResult<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE position_id = $1",
            self.table()
        ))
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Position", id.as_str()))?;
        Ok(result.rows_affected() > 0)
    }
}
