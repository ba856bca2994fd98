//! # PostgreSQL Strategies Repository
//!
//! Relational implementation of [`StrategiesRepository`].
//!
//! Read-modify-write operations run inside a short transaction with a
//! `FOR UPDATE` row lock so the same domain methods that back the
//! in-memory variant apply here without losing updates.

use crate::domain::entities::Strategy;
use crate::domain::value_objects::{InstrumentId, StrategyId, StrategyStatus};
use crate::infrastructure::persistence::postgres::map_sqlx_err;
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, StrategiesRepository, StrategyFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};

/// Relational implementation of [`StrategiesRepository`].
#[derive(Debug, Clone)]
pub struct PostgresStrategiesRepository {
    pool: PgPool,
    schema: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StrategyRow {
    strategy_id: String,
    name: String,
    strategy_type: String,
    status: String,
    parameters: Value,
    instruments: Vec<String>,
    max_position_size: Option<Decimal>,
    max_daily_loss: Option<Decimal>,
    total_pnl: Decimal,
    daily_pnl: Decimal,
    total_trades: i64,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StrategyRow> for Strategy {
    type Error = RepositoryError;

    fn try_from(row: StrategyRow) -> Result<Self, Self::Error> {
        let parameters = match row.parameters {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(RepositoryError::serialization(format!(
                    "strategy parameters must be a JSON object, got {other}"
                )));
            }
        };
        Ok(Self {
            strategy_id: StrategyId::new(row.strategy_id),
            name: row.name,
            strategy_type: row
                .strategy_type
                .parse()
                .map_err(|e| RepositoryError::serialization(format!("{e}")))?,
            status: row
                .status
                .parse()
                .map_err(|e| RepositoryError::serialization(format!("{e}")))?,
            parameters,
            instruments: row.instruments.into_iter().map(InstrumentId::new).collect(),
            max_position_size: row.max_position_size,
            max_daily_loss: row.max_daily_loss,
            total_pnl: row.total_pnl,
            daily_pnl: row.daily_pnl,
            total_trades: row.total_trades.max(0) as u64,
            started_at: row.started_at,
            stopped_at: row.stopped_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "strategy_id, name, strategy_type, status, parameters, instruments, \
     max_position_size, max_daily_loss, total_pnl, daily_pnl, total_trades, \
     started_at, stopped_at, created_at, updated_at";

impl PostgresStrategiesRepository {
    /// Creates a repository over an existing pool, scoped to `schema`.
    #[must_use]
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        format!("{}.strategies", self.schema)
    }

    async fn fetch_for_update(
        &self,
        conn: &mut PgConnection,
        id: &StrategyId,
    ) -> RepositoryResult<Strategy> {
        let row: Option<StrategyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE strategy_id = $1 FOR UPDATE",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        row.map(Strategy::try_from)
            .transpose()?
            .ok_or_else(|| RepositoryError::not_found("Strategy", id.as_str()))
    }

    async fn persist(
        &self,
        conn: &mut PgConnection,
        strategy: &Strategy,
    ) -> RepositoryResult<()> {
        let instruments: Vec<String> = strategy
            .instruments
            .iter()
            .map(|i| i.as_str().to_string())
            .collect();
        sqlx::query(&format!(
            "UPDATE {} SET name = $2, strategy_type = $3, status = $4, parameters = $5, \
             instruments = $6, max_position_size = $7, max_daily_loss = $8, total_pnl = $9, \
             daily_pnl = $10, total_trades = $11, started_at = $12, stopped_at = $13, \
             updated_at = $14 WHERE strategy_id = $1",
            self.table()
        ))
        .bind(strategy.strategy_id.as_str())
        .bind(&strategy.name)
        .bind(strategy.strategy_type.to_string())
        .bind(strategy.status.to_string())
        .bind(Value::Object(strategy.parameters.clone()))
        .bind(&instruments)
        .bind(strategy.max_position_size)
        .bind(strategy.max_daily_loss)
        .bind(strategy.total_pnl)
        .bind(strategy.daily_pnl)
        .bind(strategy.total_trades as i64)
        .bind(strategy.started_at)
        .bind(strategy.stopped_at)
        .bind(strategy.updated_at)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", strategy.strategy_id.as_str()))?;
        Ok(())
    }

    async fn mutate<F>(&self, id: &StrategyId, apply: F) -> RepositoryResult<Strategy>
    where
        F: FnOnce(&mut Strategy) -> RepositoryResult<()> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        let mut strategy = self.fetch_for_update(&mut tx, id).await?;
        apply(&mut strategy)?;
        strategy.updated_at = Utc::now();
        self.persist(&mut tx, &strategy).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        Ok(strategy)
    }
}

#[async_trait]
impl StrategiesRepository for PostgresStrategiesRepository {
    async fn create(&self, strategy: &Strategy) -> RepositoryResult<()> {
        strategy.validate().map_err(RepositoryError::validation)?;
        let instruments: Vec<String> = strategy
            .instruments
            .iter()
            .map(|i| i.as_str().to_string())
            .collect();
        sqlx::query(&format!(
            "INSERT INTO {} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            self.table()
        ))
        .bind(strategy.strategy_id.as_str())
        .bind(&strategy.name)
        .bind(strategy.strategy_type.to_string())
        .bind(strategy.status.to_string())
        .bind(Value::Object(strategy.parameters.clone()))
        .bind(&instruments)
        .bind(strategy.max_position_size)
        .bind(strategy.max_daily_loss)
        .bind(strategy.total_pnl)
        .bind(strategy.daily_pnl)
        .bind(strategy.total_trades as i64)
        .bind(strategy.started_at)
        .bind(strategy.stopped_at)
        .bind(strategy.created_at)
        .bind(strategy.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", strategy.strategy_id.as_str()))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &StrategyId) -> RepositoryResult<Option<Strategy>> {
        let row: Option<StrategyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE strategy_id = $1",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        row.map(Strategy::try_from).transpose()
    }

    async fn list(&self, filter: &StrategyFilter) -> RepositoryResult<Vec<Strategy>> {
        let rows: Vec<StrategyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR strategy_type = $2) \
               AND ($3::text IS NULL OR $3 = ANY(instruments)) \
             ORDER BY strategy_id",
            self.table()
        ))
        .bind(filter.status.map(|s| s.to_string()))
        .bind(filter.strategy_type.map(|t| t.to_string()))
        .bind(filter.instrument.as_ref().map(|i| i.as_str().to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", ""))?;
        rows.into_iter().map(Strategy::try_from).collect()
    }

    async fn update_status(
        &self,
        id: &StrategyId,
        status: StrategyStatus,
    ) -> RepositoryResult<Strategy> {
        self.mutate(id, |strategy| {
            if !strategy.status.can_transition_to(status) {
                return Err(RepositoryError::validation(format!(
                    "strategy {} cannot transition from {} to {status}",
                    strategy.strategy_id, strategy.status
                )));
            }
            let now = Utc::now();
            match status {
                StrategyStatus::Active if strategy.started_at.is_none() => {
                    strategy.started_at = Some(now);
                }
                StrategyStatus::Stopped => strategy.stopped_at = Some(now),
                _ => {}
            }
            strategy.status = status;
            Ok(())
        })
        .await
    }

    async fn update_parameters(
        &self,
        id: &StrategyId,
        parameters: Map<String, Value>,
    ) -> RepositoryResult<Strategy> {
        self.mutate(id, move |strategy| {
            strategy.parameters = parameters;
            Ok(())
        })
        .await
    }

    async fn update_pnl(
        &self,
        id: &StrategyId,
        total_pnl: Decimal,
        daily_pnl: Decimal,
    ) -> RepositoryResult<Strategy> {
        self.mutate(id, move |strategy| {
            strategy.total_pnl = total_pnl;
            strategy.daily_pnl = daily_pnl;
            Ok(())
        })
        .await
    }

    async fn increment_trade_count(&self, id: &StrategyId) -> RepositoryResult<Strategy> {
        self.mutate(id, |strategy| {
            strategy.total_trades += 1;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &StrategyId) -> RepositoryResult<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE strategy_id = $1",
            self.table()
        ))
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Strategy", ""))?;
        Ok(count.max(0) as u64)
    }

    async fn exists(&self, id: &StrategyId) -> RepositoryResult<bool> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE strategy_id = $1)",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Strategy", id.as_str()))?;
        Ok(exists)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::StrategyType;
    use serde_json::json;

    fn row() -> StrategyRow {
        StrategyRow {
            strategy_id: "strat-001".to_string(),
            name: "BTC Market Making".to_string(),
            strategy_type: "market_making".to_string(),
            status: "active".to_string(),
            parameters: json!({"spread": 0.001}),
            instruments: vec!["BTC-USD".to_string()],
            max_position_size: Some(Decimal::from(10)),
            max_daily_loss: None,
            total_pnl: Decimal::from(5000),
            daily_pnl: Decimal::from(250),
            total_trades: 142,
            started_at: Some(Utc::now()),
            stopped_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_entity() {
        let strategy = Strategy::try_from(row()).unwrap();
        assert_eq!(strategy.strategy_type, StrategyType::MarketMaking);
        assert_eq!(strategy.status, StrategyStatus::Active);
        assert_eq!(strategy.total_trades, 142);
        assert_eq!(strategy.instruments, vec![InstrumentId::new("BTC-USD")]);
        assert_eq!(strategy.parameters.get("spread"), Some(&json!(0.001)));
    }

    #[test]
    fn null_parameters_become_empty_map() {
        let mut r = row();
        r.parameters = Value::Null;
        let strategy = Strategy::try_from(r).unwrap();
        assert!(strategy.parameters.is_empty());
    }

    #[test]
    fn unknown_status_is_a_serialization_error() {
        let mut r = row();
        r.status = "launched".to_string();
        let err = Strategy::try_from(r).unwrap_err();
        assert!(err.to_string().contains("serialization"));
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        let mut r = row();
        r.parameters = json!([1, 2, 3]);
        assert!(Strategy::try_from(r).is_err());
    }
}
