//! # In-Memory Trades Repository
//!
//! In-memory implementation of [`TradesRepository`]. Aggregations are
//! linear scans, which is acceptable at test/dev data volumes.

use crate::domain::entities::Trade;
use crate::domain::value_objects::{InstrumentId, OrderId, StrategyId, TradeId};
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, TradesRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`TradesRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTradesRepository {
    storage: Arc<RwLock<BTreeMap<TradeId, Trade>>>,
}

impl InMemoryTradesRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all trades.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

fn in_range(trade: &Trade, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.is_none_or(|f| trade.executed_at >= f) && to.is_none_or(|t| trade.executed_at <= t)
}

#[async_trait]
impl TradesRepository for InMemoryTradesRepository {
    async fn create(&self, trade: &Trade) -> RepositoryResult<()> {
        trade.validate().map_err(RepositoryError::validation)?;
        let mut storage = self.storage.write().await;
        if storage.contains_key(&trade.trade_id) {
            return Err(RepositoryError::conflict("Trade", trade.trade_id.as_str()));
        }
        storage.insert(trade.trade_id.clone(), trade.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &TradeId) -> RepositoryResult<Option<Trade>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn get_by_exchange_trade_id(
        &self,
        exchange_trade_id: &str,
    ) -> RepositoryResult<Option<Trade>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .find(|t| t.exchange_trade_id.as_deref() == Some(exchange_trade_id))
            .cloned())
    }

    async fn list_by_order(&self, order_id: &OrderId) -> RepositoryResult<Vec<Trade>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|t| &t.order_id == order_id).cloned().collect())
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Trade>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|t| &t.strategy_id == strategy_id)
            .cloned()
            .collect())
    }

    async fn list_by_instrument(
        &self,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Vec<Trade>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|t| &t.instrument_id == instrument_id)
            .cloned()
            .collect())
    }

    async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Trade>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|t| in_range(t, Some(from), Some(to)))
            .cloned()
            .collect())
    }

    async fn aggregate_pnl(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|t| &t.strategy_id == strategy_id && in_range(t, from, to))
            .filter_map(|t| t.realized_pnl)
            .sum())
    }

    async fn sum_volume(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|t| &t.strategy_id == strategy_id && in_range(t, from, to))
            .map(|t| t.gross_value)
            .sum())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.storage.read().await.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderSide;
    use chrono::Duration;

    fn trade(id: &str, strategy: &str, quantity: &str, executed_at: DateTime<Utc>) -> Trade {
        Trade::new(
            TradeId::new(id),
            OrderId::new("ord-1"),
            StrategyId::new(strategy),
            InstrumentId::new("BTC-USD"),
            OrderSide::Buy,
            quantity.parse().unwrap(),
            "50000".parse().unwrap(),
            "5".parse().unwrap(),
            "exchange-simulator",
            executed_at,
        )
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_entity() {
        let repo = InMemoryTradesRepository::new();
        let t = trade("trade-1", "strat-1", "0.5", Utc::now());
        repo.create(&t).await.unwrap();

        let loaded = repo.get_by_id(&t.trade_id).await.unwrap().unwrap();
        assert_eq!(loaded, t);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let repo = InMemoryTradesRepository::new();
        let t = trade("trade-1", "strat-1", "0.5", Utc::now());
        repo.create(&t).await.unwrap();
        assert!(repo.create(&t).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn invalid_trade_is_rejected() {
        let repo = InMemoryTradesRepository::new();
        let mut t = trade("trade-1", "strat-1", "0.5", Utc::now());
        t.gross_value = Decimal::ONE;
        assert!(repo.create(&t).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn aggregate_pnl_respects_date_range() {
        let repo = InMemoryTradesRepository::new();
        let now = Utc::now();
        let old = now - Duration::days(10);

        let t1 = trade("trade-1", "strat-1", "1", old).with_realized_pnl("100".parse().unwrap());
        let t2 = trade("trade-2", "strat-1", "1", now).with_realized_pnl("50".parse().unwrap());
        let t3 = trade("trade-3", "strat-2", "1", now).with_realized_pnl("999".parse().unwrap());
        repo.create(&t1).await.unwrap();
        repo.create(&t2).await.unwrap();
        repo.create(&t3).await.unwrap();

        let strategy = StrategyId::new("strat-1");
        let total = repo.aggregate_pnl(&strategy, None, None).await.unwrap();
        assert_eq!(total, "150".parse::<Decimal>().unwrap());

        let recent = repo
            .aggregate_pnl(&strategy, Some(now - Duration::days(1)), None)
            .await
            .unwrap();
        assert_eq!(recent, "50".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn sum_volume_uses_gross_value() {
        let repo = InMemoryTradesRepository::new();
        let now = Utc::now();
        repo.create(&trade("trade-1", "strat-1", "1", now)).await.unwrap();
        repo.create(&trade("trade-2", "strat-1", "0.5", now)).await.unwrap();

        let volume = repo.sum_volume(&StrategyId::new("strat-1"), None, None).await.unwrap();
        assert_eq!(volume, "75000".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn list_by_date_range_is_inclusive() {
        let repo = InMemoryTradesRepository::new();
        let now = Utc::now();
        repo.create(&trade("trade-1", "strat-1", "1", now)).await.unwrap();

        let hits = repo.list_by_date_range(now, now).await.unwrap();
        assert_eq!(hits.len(), 1);

        let misses = repo
            .list_by_date_range(now + Duration::seconds(1), now + Duration::seconds(2))
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn list_by_order_and_instrument() {
        let repo = InMemoryTradesRepository::new();
        let now = Utc::now();
        repo.create(&trade("trade-1", "strat-1", "1", now)).await.unwrap();
        repo.create(&trade("trade-2", "strat-2", "1", now)).await.unwrap();

        assert_eq!(repo.list_by_order(&OrderId::new("ord-1")).await.unwrap().len(), 2);
        assert_eq!(
            repo.list_by_instrument(&InstrumentId::new("BTC-USD")).await.unwrap().len(),
            2
        );
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
