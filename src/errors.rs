//! Error types for the bidding engine.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::models::OptimizationStatus;
use crate::simulation::SimulationError;

#[derive(Error, Debug)]
pub enum AdOptError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(u64),

    #[error("Optimization not found: {0}")]
    OptimizationNotFound(u64),

    #[error("Optimization {id} is {status}, expected PENDING")]
    OptimizationNotPending { id: u64, status: OptimizationStatus },

    #[error("Invalid bid price {price} for campaign {campaign_id}")]
    InvalidBid { campaign_id: u64, price: Decimal },

    #[error("No game theory model registered for {0}")]
    ModelUnavailable(String),

    #[error("Payoff system of size {size} is singular (smallest pivot {pivot:e})")]
    SingularMatrix { size: usize, pivot: f64 },

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

impl AdOptError {
    /// Whether the caller can reasonably skip the item and keep going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ModelUnavailable(_))
    }
}
