//! Game-theoretic bidding models.
//!
//! A model turns a bid request, the campaign bidding on it, the competitors
//! expected in the auction, and the predicted response rates into a bid
//! price. Models learn from auction results through `update_model`.

pub mod competitor_profile;
pub mod nash_equilibrium;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::data::models::{BidRequest, BidResponse, Campaign};
use crate::services::prediction::Predictions;

pub use competitor_profile::{CompetitorProfile, CompetitorStrategy};
pub use nash_equilibrium::{NashConfig, NashEquilibriumModel};

/// Competitors in an auction, keyed by role ("aggressive", ...).
///
/// Ordered so that anything derived from the key set is stable.
pub type CompetitorSet = BTreeMap<String, CompetitorProfile>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameTheoryType {
    NashEquilibrium,
    Stackelberg,
    Bayesian,
    ReinforcementLearning,
    MultiAgentLearning,
}

impl fmt::Display for GameTheoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NashEquilibrium => "NASH_EQUILIBRIUM",
            Self::Stackelberg => "STACKELBERG",
            Self::Bayesian => "BAYESIAN",
            Self::ReinforcementLearning => "REINFORCEMENT_LEARNING",
            Self::MultiAgentLearning => "MULTI_AGENT_LEARNING",
        };
        write!(f, "{name}")
    }
}

impl FromStr for GameTheoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NASH_EQUILIBRIUM" => Ok(Self::NashEquilibrium),
            "STACKELBERG" => Ok(Self::Stackelberg),
            "BAYESIAN" => Ok(Self::Bayesian),
            "REINFORCEMENT_LEARNING" => Ok(Self::ReinforcementLearning),
            "MULTI_AGENT_LEARNING" => Ok(Self::MultiAgentLearning),
            _ => Err(format!("Invalid game theory model: {s}")),
        }
    }
}

pub trait GameTheoryModel: Send + Sync {
    fn model_type(&self) -> GameTheoryType;

    /// Bid price for `campaign` on `request`, within the campaign's and
    /// the slot's constraints.
    fn calculate_optimal_bid(
        &self,
        request: &BidRequest,
        campaign: &Campaign,
        competitors: &CompetitorSet,
        predictions: &Predictions,
    ) -> Decimal;

    /// Expected profit of bidding `bid_price`; higher is better.
    fn calculate_utility(
        &self,
        campaign: &Campaign,
        bid_price: Decimal,
        predictions: &Predictions,
    ) -> f64;

    /// Learn from a completed auction.
    fn update_model(
        &self,
        response: &BidResponse,
        campaign: &Campaign,
        competitors: &CompetitorSet,
    );
}

/// Available models indexed by type.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<GameTheoryType, Arc<dyn GameTheoryModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Nash equilibrium model installed.
    pub fn with_nash(config: NashConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NashEquilibriumModel::new(config)));
        registry
    }

    pub fn register(&mut self, model: Arc<dyn GameTheoryModel>) {
        self.models.insert(model.model_type(), model);
    }

    pub fn get(&self, model_type: GameTheoryType) -> Option<Arc<dyn GameTheoryModel>> {
        self.models.get(&model_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_theory_type_round_trips_through_display() {
        for t in [
            GameTheoryType::NashEquilibrium,
            GameTheoryType::Stackelberg,
            GameTheoryType::MultiAgentLearning,
        ] {
            assert_eq!(t.to_string().parse::<GameTheoryType>(), Ok(t));
        }
        assert!("minimax".parse::<GameTheoryType>().is_err());
    }

    #[test]
    fn test_registry_with_nash() {
        let registry = ModelRegistry::with_nash(NashConfig::default());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(GameTheoryType::NashEquilibrium).is_some());
        assert!(registry.get(GameTheoryType::Bayesian).is_none());
    }
}
