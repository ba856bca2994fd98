//! # PostgreSQL Trades Repository
//!
//! Relational implementation of [`TradesRepository`]. Trades are immutable
//! once written; the P&L and volume aggregates push the summation into the
//! database with `COALESCE(SUM(..), 0)` so an empty result set sums to zero.

use crate::domain::entities::Trade;
use crate::domain::value_objects::{InstrumentId, OrderId, StrategyId, TradeId};
use crate::infrastructure::persistence::postgres::map_sqlx_err;
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, TradesRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Relational implementation of [`TradesRepository`].
#[derive(Debug, Clone)]
pub struct PostgresTradesRepository {
    pool: PgPool,
    schema: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TradeRow {
    trade_id: String,
    order_id: String,
    strategy_id: String,
    instrument_id: String,
    side: String,
    quantity: Decimal,
    price: Decimal,
    gross_value: Decimal,
    commission: Decimal,
    net_value: Decimal,
    realized_pnl: Option<Decimal>,
    exchange_trade_id: Option<String>,
    execution_venue: String,
    liquidity_flag: Option<String>,
    executed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = RepositoryError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            trade_id: TradeId::new(row.trade_id),
            order_id: OrderId::new(row.order_id),
            strategy_id: StrategyId::new(row.strategy_id),
            instrument_id: InstrumentId::new(row.instrument_id),
            side: row
                .side
                .parse()
                .map_err(|e| RepositoryError::serialization(format!("{e}")))?,
            quantity: row.quantity,
            price: row.price,
            gross_value: row.gross_value,
            commission: row.commission,
            net_value: row.net_value,
            realized_pnl: row.realized_pnl,
            exchange_trade_id: row.exchange_trade_id,
            execution_venue: row.execution_venue,
            liquidity_flag: row
                .liquidity_flag
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(|e| RepositoryError::serialization(format!("{e}")))?,
            executed_at: row.executed_at,
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = "trade_id, order_id, strategy_id, instrument_id, side, quantity, price, \
     gross_value, commission, net_value, realized_pnl, exchange_trade_id, execution_venue, \
     liquidity_flag, executed_at, created_at";

impl PostgresTradesRepository {
    /// Creates a repository over an existing pool, scoped to `schema`.
    #[must_use]
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        format!("{}.trades", self.schema)
    }

    async fn list_where(&self, predicate: &str, bind: &str) -> RepositoryResult<Vec<Trade>> {
        let rows: Vec<TradeRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE {predicate} ORDER BY executed_at, trade_id",
            self.table()
        ))
        .bind(bind)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", ""))?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn sum_column(
        &self,
        column: &str,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal> {
        let sum: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM({column}), 0) FROM {} \
             WHERE strategy_id = $1 \
               AND ($2::timestamptz IS NULL OR executed_at >= $2) \
               AND ($3::timestamptz IS NULL OR executed_at <= $3)",
            self.table()
        ))
        .bind(strategy_id.as_str())
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", strategy_id.as_str()))?;
        Ok(sum)
    }
}

#[async_trait]
impl TradesRepository for PostgresTradesRepository {
    async fn create(&self, trade: &Trade) -> RepositoryResult<()> {
        trade.validate().map_err(RepositoryError::validation)?;
        sqlx::query(&format!(
            "INSERT INTO {} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            self.table()
        ))
        .bind(trade.trade_id.as_str())
        .bind(trade.order_id.as_str())
        .bind(trade.strategy_id.as_str())
        .bind(trade.instrument_id.as_str())
        .bind(trade.side.to_string())
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.gross_value)
        .bind(trade.commission)
        .bind(trade.net_value)
        .bind(trade.realized_pnl)
        .bind(&trade.exchange_trade_id)
        .bind(&trade.execution_venue)
        .bind(trade.liquidity_flag.map(|f| f.to_string()))
        .bind(trade.executed_at)
        .bind(trade.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", trade.trade_id.as_str()))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &TradeId) -> RepositoryResult<Option<Trade>> {
        let row: Option<TradeRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE trade_id = $1",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", id.as_str()))?;
        row.map(Trade::try_from).transpose()
    }

    async fn get_by_exchange_trade_id(
        &self,
        exchange_trade_id: &str,
    ) -> RepositoryResult<Option<Trade>> {
        let row: Option<TradeRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE exchange_trade_id = $1",
            self.table()
        ))
        .bind(exchange_trade_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", exchange_trade_id))?;
        row.map(Trade::try_from).transpose()
    }

    async fn list_by_order(&self, order_id: &OrderId) -> RepositoryResult<Vec<Trade>> {
        self.list_where("order_id = $1", order_id.as_str()).await
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Trade>> {
        self.list_where("strategy_id = $1", strategy_id.as_str())
            .await
    }

    async fn list_by_instrument(
        &self,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Vec<Trade>> {
        self.list_where("instrument_id = $1", instrument_id.as_str())
            .await
    }

    async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Trade>> {
        let rows: Vec<TradeRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE executed_at >= $1 AND executed_at <= $2 \
             ORDER BY executed_at, trade_id",
            self.table()
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Trade", ""))?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn aggregate_pnl(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal> {
        self.sum_column("realized_pnl", strategy_id, from, to).await
    }

    async fn sum_volume(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal> {
        self.sum_column("gross_value", strategy_id, from, to).await
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Trade", ""))?;
        Ok(count.max(0) as u64)
    }
}
