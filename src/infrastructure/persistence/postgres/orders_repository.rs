//! # PostgreSQL Orders Repository
//!
//! Relational implementation of [`OrdersRepository`]. Fill application and
//! cancellation run inside a `FOR UPDATE` transaction and reuse the domain
//! lifecycle methods so that rejected mutations leave the row untouched.

use crate::domain::entities::Order;
use crate::domain::value_objects::{InstrumentId, OrderId, OrderStatus, StrategyId};
use crate::infrastructure::persistence::postgres::map_sqlx_err;
use crate::infrastructure::persistence::traits::{
    OrdersRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

/// Relational implementation of [`OrdersRepository`].
#[derive(Debug, Clone)]
pub struct PostgresOrdersRepository {
    pool: PgPool,
    schema: String,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    strategy_id: String,
    instrument_id: String,
    side: String,
    order_type: String,
    time_in_force: String,
    status: String,
    quantity: Decimal,
    filled_quantity: Decimal,
    price: Option<Decimal>,
    stop_price: Option<Decimal>,
    average_fill_price: Option<Decimal>,
    exchange_order_id: Option<String>,
    commission: Decimal,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    filled_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        fn parse<T: std::str::FromStr>(s: &str) -> Result<T, RepositoryError>
        where
            T::Err: std::fmt::Display,
        {
            s.parse()
                .map_err(|e| RepositoryError::serialization(format!("{e}")))
        }
        Ok(Self {
            order_id: OrderId::new(row.order_id),
            strategy_id: StrategyId::new(row.strategy_id),
            instrument_id: InstrumentId::new(row.instrument_id),
            side: parse(&row.side)?,
            order_type: parse(&row.order_type)?,
            time_in_force: parse(&row.time_in_force)?,
            status: parse(&row.status)?,
            quantity: row.quantity,
            filled_quantity: row.filled_quantity,
            price: row.price,
            stop_price: row.stop_price,
            average_fill_price: row.average_fill_price,
            exchange_order_id: row.exchange_order_id,
            commission: row.commission,
            created_at: row.created_at,
            submitted_at: row.submitted_at,
            filled_at: row.filled_at,
            cancelled_at: row.cancelled_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "order_id, strategy_id, instrument_id, side, order_type, time_in_force, \
     status, quantity, filled_quantity, price, stop_price, average_fill_price, \
     exchange_order_id, commission, created_at, submitted_at, filled_at, cancelled_at, \
     updated_at";

impl PostgresOrdersRepository {
    /// Creates a repository over an existing pool, scoped to `schema`.
    #[must_use]
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table(&self) -> String {
        format!("{}.orders", self.schema)
    }

    async fn fetch_for_update(
        &self,
        conn: &mut PgConnection,
        id: &OrderId,
    ) -> RepositoryResult<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE order_id = $1 FOR UPDATE",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_err(e, "Order", id.as_str()))?;
        row.map(Order::try_from)
            .transpose()?
            .ok_or_else(|| RepositoryError::not_found("Order", id.as_str()))
    }

    async fn persist(&self, conn: &mut PgConnection, order: &Order) -> RepositoryResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET status = $2, filled_quantity = $3, average_fill_price = $4, \
             exchange_order_id = $5, commission = $6, submitted_at = $7, filled_at = $8, \
             cancelled_at = $9, updated_at = $10 WHERE order_id = $1",
            self.table()
        ))
        .bind(order.order_id.as_str())
        .bind(order.status.to_string())
        .bind(order.filled_quantity)
        .bind(order.average_fill_price)
        .bind(&order.exchange_order_id)
        .bind(order.commission)
        .bind(order.submitted_at)
        .bind(order.filled_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_err(e, "Order", order.order_id.as_str()))?;
        Ok(())
    }

    async fn mutate<F>(&self, id: &OrderId, apply: F) -> RepositoryResult<Order>
    where
        F: FnOnce(&mut Order) -> Result<(), String> + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_err(e, "Order", id.as_str()))?;
        let mut order = self.fetch_for_update(&mut tx, id).await?;
        apply(&mut order).map_err(RepositoryError::validation)?;
        self.persist(&mut tx, &order).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_err(e, "Order", id.as_str()))?;
        Ok(order)
    }

    async fn list_where(
        &self,
        predicate: &str,
        bind: Option<&str>,
    ) -> RepositoryResult<Vec<Order>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE {predicate} ORDER BY order_id",
            self.table()
        );
        let mut query = sqlx::query_as(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows: Vec<OrderRow> = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Order", ""))?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl OrdersRepository for PostgresOrdersRepository {
    async fn create(&self, order: &Order) -> RepositoryResult<()> {
        order.validate().map_err(RepositoryError::validation)?;
        sqlx::query(&format!(
            "INSERT INTO {} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19)",
            self.table()
        ))
        .bind(order.order_id.as_str())
        .bind(order.strategy_id.as_str())
        .bind(order.instrument_id.as_str())
        .bind(order.side.to_string())
        .bind(order.order_type.to_string())
        .bind(order.time_in_force.to_string())
        .bind(order.status.to_string())
        .bind(order.quantity)
        .bind(order.filled_quantity)
        .bind(order.price)
        .bind(order.stop_price)
        .bind(order.average_fill_price)
        .bind(&order.exchange_order_id)
        .bind(order.commission)
        .bind(order.created_at)
        .bind(order.submitted_at)
        .bind(order.filled_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Order", order.order_id.as_str()))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &OrderId) -> RepositoryResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE order_id = $1",
            self.table()
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Order", id.as_str()))?;
        row.map(Order::try_from).transpose()
    }

    async fn get_by_exchange_order_id(
        &self,
        exchange_order_id: &str,
    ) -> RepositoryResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM {} WHERE exchange_order_id = $1",
            self.table()
        ))
        .bind(exchange_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Order", exchange_order_id))?;
        row.map(Order::try_from).transpose()
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Order>> {
        self.list_where("strategy_id = $1", Some(strategy_id.as_str()))
            .await
    }

    async fn list_by_status(&self, status: OrderStatus) -> RepositoryResult<Vec<Order>> {
        self.list_where("status = $1", Some(&status.to_string()))
            .await
    }

    async fn list_open(&self) -> RepositoryResult<Vec<Order>> {
        self.list_where("status IN ('new', 'partially_filled')", None)
            .await
    }

    async fn update_fill(
        &self,
        id: &OrderId,
        fill_quantity: Decimal,
        fill_price: Decimal,
    ) -> RepositoryResult<Order> {
        self.mutate(id, move |order| order.apply_fill(fill_quantity, fill_price))
            .await
    }

    async fn cancel(&self, id: &OrderId, cancelled_at: DateTime<Utc>) -> RepositoryResult<Order> {
        self.mutate(id, move |order| order.cancel(cancelled_at)).await
    }

    async fn delete(&self, id: &OrderId) -> RepositoryResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE order_id = $1", self.table()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Order", id.as_str()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Order", ""))?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{OrderSide, OrderType, TimeInForce};

    fn row() -> OrderRow {
        OrderRow {
            order_id: "ord-001".to_string(),
            strategy_id: "strat-001".to_string(),
            instrument_id: "BTC-USD".to_string(),
            side: "buy".to_string(),
            order_type: "limit".to_string(),
            time_in_force: "gtc".to_string(),
            status: "partially_filled".to_string(),
            quantity: Decimal::from(2),
            filled_quantity: Decimal::ONE,
            price: Some(Decimal::from(50_000)),
            stop_price: None,
            average_fill_price: Some(Decimal::from(49_990)),
            exchange_order_id: Some("EX-123".to_string()),
            commission: Decimal::ZERO,
            created_at: Utc::now(),
            submitted_at: Some(Utc::now()),
            filled_at: None,
            cancelled_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_entity() {
        let order = Order::try_from(row()).unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.time_in_force, TimeInForce::Gtc);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert!(order.is_open());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn unknown_side_is_a_serialization_error() {
        let mut r = row();
        r.side = "long".to_string();
        assert!(Order::try_from(r).is_err());
    }
}
