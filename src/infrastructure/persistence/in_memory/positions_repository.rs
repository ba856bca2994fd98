//! # In-Memory Positions Repository
//!
//! In-memory implementation of [`PositionsRepository`]. Derived-field
//! recomputation is delegated to [`Position::recompute`].

use crate::domain::entities::Position;
use crate::domain::value_objects::{InstrumentId, PositionId, StrategyId};
use crate::infrastructure::persistence::traits::{
    PositionsRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`PositionsRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPositionsRepository {
    storage: Arc<RwLock<BTreeMap<PositionId, Position>>>,
}

impl InMemoryPositionsRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all positions.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl PositionsRepository for InMemoryPositionsRepository {
    async fn get(
        &self,
        strategy_id: &StrategyId,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Option<Position>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .find(|p| &p.strategy_id == strategy_id && &p.instrument_id == instrument_id)
            .cloned())
    }

    async fn upsert(&self, position: &Position) -> RepositoryResult<Position> {
        position.validate().map_err(RepositoryError::validation)?;
        let mut storage = self.storage.write().await;
        // One position per strategy/instrument pair: an upsert under a new
        // id replaces any existing record for the same pair.
        let existing_id = storage
            .values()
            .find(|p| {
                p.strategy_id == position.strategy_id && p.instrument_id == position.instrument_id
            })
            .map(|p| p.position_id.clone());
        if let Some(id) = existing_id
            && id != position.position_id
        {
            storage.remove(&id);
        }
        storage.insert(position.position_id.clone(), position.clone());
        Ok(position.clone())
    }

    async fn update_market_price(
        &self,
        id: &PositionId,
        current_price: Decimal,
    ) -> RepositoryResult<Position> {
        let mut storage = self.storage.write().await;
        let position = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Position", id.as_str()))?;
        position.recompute(current_price, Utc::now());
        Ok(position.clone())
    }

    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Position>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|p| &p.strategy_id == strategy_id)
            .cloned()
            .collect())
    }

    async fn list_open(&self) -> RepositoryResult<Vec<Position>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|p| p.is_open()).cloned().collect())
    }

    async fn total_exposure(&self, strategy_id: Option<&StrategyId>) -> RepositoryResult<Decimal> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|p| p.is_open() && strategy_id.is_none_or(|s| &p.strategy_id == s))
            .map(|p| p.exposure)
            .sum())
    }

    async fn total_unrealized_pnl(
        &self,
        strategy_id: Option<&StrategyId>,
    ) -> RepositoryResult<Decimal> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|p| p.is_open() && strategy_id.is_none_or(|s| &p.strategy_id == s))
            .map(|p| p.unrealized_pnl)
            .sum())
    }

    async fn delete(&self, id: &PositionId) -> RepositoryResult<bool> {
        Ok(self.storage.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn position(id: &str, strategy: &str, instrument: &str, quantity: &str) -> Position {
        Position::new(
            PositionId::new(id),
            StrategyId::new(strategy),
            InstrumentId::new(instrument),
            quantity.parse().unwrap(),
            "48000".parse().unwrap(),
            "48000".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn upsert_then_get_by_pair() {
        let repo = InMemoryPositionsRepository::new();
        let p = position("pos-1", "strat-1", "BTC-USD", "2");
        repo.upsert(&p).await.unwrap();

        let loaded = repo
            .get(&StrategyId::new("strat-1"), &InstrumentId::new("BTC-USD"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, p);
        assert!(
            repo.get(&StrategyId::new("strat-1"), &InstrumentId::new("ETH-USD"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn upsert_replaces_position_for_same_pair() {
        let repo = InMemoryPositionsRepository::new();
        repo.upsert(&position("pos-1", "strat-1", "BTC-USD", "2")).await.unwrap();
        repo.upsert(&position("pos-2", "strat-1", "BTC-USD", "3")).await.unwrap();

        let loaded = repo
            .get(&StrategyId::new("strat-1"), &InstrumentId::new("BTC-USD"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.position_id.as_str(), "pos-2");
        assert_eq!(loaded.quantity, Decimal::from(3));
        assert_eq!(repo.list_by_strategy(&StrategyId::new("strat-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_market_price_recomputes_derived_fields() {
        let repo = InMemoryPositionsRepository::new();
        repo.upsert(&position("pos-1", "strat-1", "BTC-USD", "2")).await.unwrap();

        let updated = repo
            .update_market_price(&PositionId::new("pos-1"), "50000".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(updated.market_value, "100000".parse::<Decimal>().unwrap());
        assert_eq!(updated.unrealized_pnl, "4000".parse::<Decimal>().unwrap());
        assert_eq!(updated.exposure, "100000".parse::<Decimal>().unwrap());
        assert!(updated.validate().is_ok());
    }

    #[tokio::test]
    async fn update_market_price_on_missing_position() {
        let repo = InMemoryPositionsRepository::new();
        let err = repo
            .update_market_price(&PositionId::new("ghost"), Decimal::ONE)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_open_excludes_flat_positions() {
        let repo = InMemoryPositionsRepository::new();
        repo.upsert(&position("pos-1", "strat-1", "BTC-USD", "2")).await.unwrap();
        repo.upsert(&position("pos-2", "strat-1", "ETH-USD", "0")).await.unwrap();

        let open = repo.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].position_id.as_str(), "pos-1");
    }

    #[tokio::test]
    async fn exposure_sums_open_positions_only() {
        let repo = InMemoryPositionsRepository::new();
        repo.upsert(&position("pos-1", "strat-1", "BTC-USD", "1")).await.unwrap();
        repo.upsert(&position("pos-2", "strat-1", "ETH-USD", "-1")).await.unwrap();
        repo.upsert(&position("pos-3", "strat-2", "BTC-USD", "1")).await.unwrap();

        // Shorts contribute |market value|.
        let strat1 = repo
            .total_exposure(Some(&StrategyId::new("strat-1")))
            .await
            .unwrap();
        assert_eq!(strat1, "96000".parse::<Decimal>().unwrap());

        let all = repo.total_exposure(None).await.unwrap();
        assert_eq!(all, "144000".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = InMemoryPositionsRepository::new();
        repo.upsert(&position("pos-1", "strat-1", "BTC-USD", "1")).await.unwrap();

        assert!(repo.delete(&PositionId::new("pos-1")).await.unwrap());
        assert!(!repo.delete(&PositionId::new("pos-1")).await.unwrap());
    }
}
