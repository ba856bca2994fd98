//! # In-Memory Orders Repository
//!
//! In-memory implementation of [`OrdersRepository`]. Fill bookkeeping is
//! delegated to [`Order::apply_fill`] so the stub and the relational
//! variant enforce identical invariants.

use crate::domain::entities::Order;
use crate::domain::value_objects::{OrderId, OrderStatus, StrategyId};
use crate::infrastructure::persistence::traits::{
    OrdersRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`OrdersRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrdersRepository {
    storage: Arc<RwLock<BTreeMap<OrderId, Order>>>,
}

impl InMemoryOrdersRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all orders.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl OrdersRepository for InMemoryOrdersRepository {
    async fn create(&self, order: &Order) -> RepositoryResult<()> {
        order.validate().map_err(RepositoryError::validation)?;
        let mut storage = self.storage.write().await;
        if storage.contains_key(&order.order_id) {
            return Err(RepositoryError::conflict("Order", order.order_id.as_str()));
        }
        storage.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn get_by_exchange_order_id(
        &self,
        exchange_order_id: &str,
    ) -> RepositoryResult<Option<Order>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .find(|o| o.exchange_order_id.as_deref() == Some(exchange_order_id))
            .cloned())
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Order>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|o| &o.strategy_id == strategy_id)
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: OrderStatus) -> RepositoryResult<Vec<Order>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|o| o.status == status).cloned().collect())
    }

    async fn list_open(&self) -> RepositoryResult<Vec<Order>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|o| o.is_open()).cloned().collect())
    }

    async fn update_fill(
        &self,
        id: &OrderId,
        fill_quantity: Decimal,
        fill_price: Decimal,
    ) -> RepositoryResult<Order> {
        let mut storage = self.storage.write().await;
        let order = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Order", id.as_str()))?;
        order
            .apply_fill(fill_quantity, fill_price)
            .map_err(RepositoryError::validation)?;
        Ok(order.clone())
    }

    async fn cancel(&self, id: &OrderId, cancelled_at: DateTime<Utc>) -> RepositoryResult<Order> {
        let mut storage = self.storage.write().await;
        let order = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Order", id.as_str()))?;
        order.cancel(cancelled_at).map_err(RepositoryError::validation)?;
        Ok(order.clone())
    }

    async fn delete(&self, id: &OrderId) -> RepositoryResult<bool> {
        Ok(self.storage.write().await.remove(id).is_some())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.storage.read().await.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{InstrumentId, OrderSide, OrderType};

    fn order(id: &str, strategy: &str, quantity: &str) -> Order {
        Order::new(
            OrderId::new(id),
            StrategyId::new(strategy),
            InstrumentId::new("BTC-USD"),
            OrderSide::Buy,
            OrderType::Limit,
            quantity.parse().unwrap(),
            Some("50000".parse().unwrap()),
        )
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_entity() {
        let repo = InMemoryOrdersRepository::new();
        let o = order("ord-1", "strat-1", "1.5");
        repo.create(&o).await.unwrap();

        let loaded = repo.get_by_id(&o.order_id).await.unwrap().unwrap();
        assert_eq!(loaded, o);
    }

    #[tokio::test]
    async fn get_by_exchange_order_id() {
        let repo = InMemoryOrdersRepository::new();
        let mut o = order("ord-1", "strat-1", "1");
        o.acknowledge("EX-99", Utc::now());
        repo.create(&o).await.unwrap();

        let found = repo.get_by_exchange_order_id("EX-99").await.unwrap();
        assert_eq!(found.unwrap().order_id, o.order_id);
        assert!(repo.get_by_exchange_order_id("EX-00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fill_lifecycle_updates_status() {
        let repo = InMemoryOrdersRepository::new();
        repo.create(&order("ord-1", "strat-1", "2")).await.unwrap();
        let id = OrderId::new("ord-1");

        let after = repo
            .update_fill(&id, "1".parse().unwrap(), "50000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(after.status, OrderStatus::PartiallyFilled);
        assert_eq!(repo.list_open().await.unwrap().len(), 1);

        let after = repo
            .update_fill(&id, "1".parse().unwrap(), "50000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(after.status, OrderStatus::Filled);
        assert!(repo.list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overfill_fails_and_leaves_order_unchanged() {
        let repo = InMemoryOrdersRepository::new();
        repo.create(&order("ord-1", "strat-1", "1")).await.unwrap();
        let id = OrderId::new("ord-1");

        let err = repo
            .update_fill(&id, "2".parse().unwrap(), "50000".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let unchanged = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(unchanged.filled_quantity, Decimal::ZERO);
        assert_eq!(unchanged.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn cancel_sets_timestamp() {
        let repo = InMemoryOrdersRepository::new();
        repo.create(&order("ord-1", "strat-1", "1")).await.unwrap();
        let at = Utc::now();

        let cancelled = repo.cancel(&OrderId::new("ord-1"), at).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(at));

        let err = repo.cancel(&OrderId::new("ord-1"), at).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn list_by_strategy_and_status() {
        let repo = InMemoryOrdersRepository::new();
        repo.create(&order("ord-1", "strat-1", "1")).await.unwrap();
        repo.create(&order("ord-2", "strat-1", "1")).await.unwrap();
        repo.create(&order("ord-3", "strat-2", "1")).await.unwrap();

        assert_eq!(
            repo.list_by_strategy(&StrategyId::new("strat-1")).await.unwrap().len(),
            2
        );
        assert_eq!(repo.list_by_status(OrderStatus::New).await.unwrap().len(), 3);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = InMemoryOrdersRepository::new();
        repo.create(&order("ord-1", "strat-1", "1")).await.unwrap();

        assert!(repo.delete(&OrderId::new("ord-1")).await.unwrap());
        assert!(!repo.delete(&OrderId::new("ord-1")).await.unwrap());
        assert!(!repo.delete(&OrderId::new("never-existed")).await.unwrap());
    }
}
