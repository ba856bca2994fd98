//! # In-Memory Strategies Repository
//!
//! In-memory implementation of [`StrategiesRepository`], used for testing
//! and as the degradation fallback when the relational backend is
//! unreachable.

use crate::domain::entities::Strategy;
use crate::domain::value_objects::{StrategyId, StrategyStatus};
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, StrategiesRepository, StrategyFilter,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`StrategiesRepository`].
///
/// Uses a `BTreeMap` behind a single lock, so listings are deterministic
/// (ordered by id) and reads after writes are consistent within the
/// process. The lock is held only for the duration of the mutation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStrategiesRepository {
    storage: Arc<RwLock<BTreeMap<StrategyId, Strategy>>>,
}

impl InMemoryStrategiesRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all strategies.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl StrategiesRepository for InMemoryStrategiesRepository {
    async fn create(&self, strategy: &Strategy) -> RepositoryResult<()> {
        strategy.validate().map_err(RepositoryError::validation)?;
        let mut storage = self.storage.write().await;
        if storage.contains_key(&strategy.strategy_id) {
            return Err(RepositoryError::conflict(
                "Strategy",
                strategy.strategy_id.as_str(),
            ));
        }
        storage.insert(strategy.strategy_id.clone(), strategy.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &StrategyId) -> RepositoryResult<Option<Strategy>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn list(&self, filter: &StrategyFilter) -> RepositoryResult<Vec<Strategy>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn update_status(
        &self,
        id: &StrategyId,
        status: StrategyStatus,
    ) -> RepositoryResult<Strategy> {
        let mut storage = self.storage.write().await;
        let strategy = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Strategy", id.as_str()))?;
        if !strategy.status.can_transition_to(status) {
            return Err(RepositoryError::validation(format!(
                "strategy {id} cannot transition from {} to {status}",
                strategy.status
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
        strategy.updated_at = now;
        Ok(strategy.clone())
    }

    async fn update_parameters(
        &self,
        id: &StrategyId,
        parameters: Map<String, Value>,
    ) -> RepositoryResult<Strategy> {
        let mut storage = self.storage.write().await;
        let strategy = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Strategy", id.as_str()))?;
        strategy.parameters = parameters;
        strategy.updated_at = Utc::now();
        Ok(strategy.clone())
    }

    async fn update_pnl(
        &self,
        id: &StrategyId,
        total_pnl: Decimal,
        daily_pnl: Decimal,
    ) -> RepositoryResult<Strategy> {
        let mut storage = self.storage.write().await;
        let strategy = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Strategy", id.as_str()))?;
        strategy.total_pnl = total_pnl;
        strategy.daily_pnl = daily_pnl;
        strategy.updated_at = Utc::now();
        Ok(strategy.clone())
    }

    async fn increment_trade_count(&self, id: &StrategyId) -> RepositoryResult<Strategy> {
        let mut storage = self.storage.write().await;
        let strategy = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Strategy", id.as_str()))?;
        strategy.total_trades += 1;
        strategy.updated_at = Utc::now();
        Ok(strategy.clone())
    }

    async fn delete(&self, id: &StrategyId) -> RepositoryResult<bool> {
        Ok(self.storage.write().await.remove(id).is_some())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.storage.read().await.len() as u64)
    }

    async fn exists(&self, id: &StrategyId) -> RepositoryResult<bool> {
        Ok(self.storage.read().await.contains_key(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{InstrumentId, StrategyType};

    fn strategy(id: &str, strategy_type: StrategyType) -> Strategy {
        Strategy::new(StrategyId::new(id), format!("strategy {id}"), strategy_type)
            .with_instruments(vec![InstrumentId::new("BTC-USD")])
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_entity() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::MarketMaking);
        repo.create(&s).await.unwrap();

        let loaded = repo.get_by_id(&s.strategy_id).await.unwrap().unwrap();
        assert_eq!(loaded, s);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::MarketMaking);
        repo.create(&s).await.unwrap();

        let err = repo.create(&s).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_strategy_is_rejected() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::Custom)
            .with_max_position_size(Decimal::from(-5));
        assert!(repo.create(&s).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn list_with_filters() {
        let repo = InMemoryStrategiesRepository::new();
        repo.create(&strategy("strat-1", StrategyType::MarketMaking)).await.unwrap();
        repo.create(&strategy("strat-2", StrategyType::Arbitrage)).await.unwrap();
        repo.update_status(&StrategyId::new("strat-2"), StrategyStatus::Active)
            .await
            .unwrap();

        let all = repo.list(&StrategyFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let mm = repo
            .list(&StrategyFilter {
                strategy_type: Some(StrategyType::MarketMaking),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mm.len(), 1);
        assert_eq!(mm[0].strategy_id.as_str(), "strat-1");

        let active = repo
            .list(&StrategyFilter {
                status: Some(StrategyStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].strategy_id.as_str(), "strat-2");
    }

    #[tokio::test]
    async fn illegal_status_transition_is_rejected() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::MarketMaking);
        repo.create(&s).await.unwrap();

        // Inactive -> Paused is not in the transition set.
        let err = repo
            .update_status(&s.strategy_id, StrategyStatus::Paused)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        repo.update_status(&s.strategy_id, StrategyStatus::Active).await.unwrap();
        let stopped = repo
            .update_status(&s.strategy_id, StrategyStatus::Stopped)
            .await
            .unwrap();
        assert!(stopped.stopped_at.is_some());
    }

    #[tokio::test]
    async fn update_pnl_and_trade_count() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::MarketMaking);
        repo.create(&s).await.unwrap();

        let updated = repo
            .update_pnl(&s.strategy_id, Decimal::from(5000), Decimal::from(250))
            .await
            .unwrap();
        assert_eq!(updated.total_pnl, Decimal::from(5000));

        let updated = repo.increment_trade_count(&s.strategy_id).await.unwrap();
        assert_eq!(updated.total_trades, 1);
    }

    #[tokio::test]
    async fn update_on_missing_strategy_is_not_found() {
        let repo = InMemoryStrategiesRepository::new();
        let err = repo
            .update_pnl(&StrategyId::new("ghost"), Decimal::ZERO, Decimal::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = InMemoryStrategiesRepository::new();
        let s = strategy("strat-1", StrategyType::MarketMaking);
        repo.create(&s).await.unwrap();

        assert!(repo.delete(&s.strategy_id).await.unwrap());
        assert!(!repo.delete(&s.strategy_id).await.unwrap());
        assert!(!repo.exists(&s.strategy_id).await.unwrap());
    }
}
