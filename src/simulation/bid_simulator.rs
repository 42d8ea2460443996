//! Closed-form bid simulation model.
//!
//! Maps a proposed bid and its floor/ceiling bounds to a win probability and
//! a handful of expected performance metrics:
//!
//! ```text
//! normalized = (bid - floor) / (max - floor)
//! win        = 1 / (1 + e^(-k * (normalized - 0.5)))     (0 below floor, cap at/above max)
//! ctr        = base_ctr * (1 + (bid / max) * ctr_lift)
//! cvr        = base_cvr * (1 + (bid / max) * cvr_lift)
//! cpa        = bid / (base_ctr * base_cvr * (1 + (bid / max) * efficiency_lift))
//! roi        = (1 + (bid / max) * efficiency_lift) * roi_multiplier - bid
//! ```
//!
//! Every constant lives in [`SimulationPolicy`]; the defaults reproduce the
//! dashboard's bidding simulator exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bid slider range of the dashboard simulator.
pub const SLIDER_MIN_BID: f64 = 0.1;
pub const SLIDER_MAX_BID: f64 = 5.0;
pub const SLIDER_STEP: f64 = 0.1;

/// Largest number of points a single sweep may produce.
pub const MAX_SWEEP_POINTS: usize = 10_000;

/// Tunable constants of the simulation model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationPolicy {
    /// Logistic steepness around the midpoint of [floor, max].
    pub steepness: f64,
    /// Win probability returned at or above the max bid.
    pub win_cap: f64,
    pub base_ctr: f64,
    /// Maximum relative CTR uplift reached at `bid == max`.
    pub ctr_lift: f64,
    pub base_cvr: f64,
    /// Maximum relative CVR uplift reached at `bid == max`.
    pub cvr_lift: f64,
    /// Efficiency gain used by both the CPA and ROI estimates.
    pub efficiency_lift: f64,
    pub roi_multiplier: f64,
}

impl Default for SimulationPolicy {
    fn default() -> Self {
        Self {
            steepness: 10.0,
            win_cap: 0.95,
            base_ctr: 0.025,
            ctr_lift: 0.2,
            base_cvr: 0.12,
            cvr_lift: 0.1,
            efficiency_lift: 0.3,
            roi_multiplier: 2.0,
        }
    }
}

/// A bid together with the bounds of its auction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BidSimulationInput {
    pub bid_amount: f64,
    pub floor_price: f64,
    pub max_bid: f64,
}

/// Estimated outcome of placing a bid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BidSimulationResult {
    pub win_probability: f64,
    pub expected_click_through_rate: f64,
    pub expected_conversion_rate: f64,
    pub expected_cost_per_acquisition: f64,
    pub expected_return_on_investment: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Bid amount must be positive and finite, got {0}")]
    InvalidBid(f64),

    #[error("Floor price must be non-negative and finite, got {0}")]
    InvalidFloor(f64),

    #[error("Max bid {max_bid} must be finite and greater than floor price {floor_price}")]
    InvalidRange { floor_price: f64, max_bid: f64 },

    #[error("Sweep step must be positive, got {0}")]
    InvalidStep(f64),

    #[error("Sweep bounds must be finite, got {from}..={to}")]
    InvalidSweepBounds { from: f64, to: f64 },

    #[error("Sweep would produce {requested} points, limit is {limit}")]
    TooManyPoints { requested: f64, limit: usize },
}

impl BidSimulationInput {
    pub fn new(bid_amount: f64, floor_price: f64, max_bid: f64) -> Self {
        Self {
            bid_amount,
            floor_price,
            max_bid,
        }
    }

    /// Check the bounds that [`simulate`] takes as a precondition.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.bid_amount.is_finite() || self.bid_amount <= 0.0 {
            return Err(SimulationError::InvalidBid(self.bid_amount));
        }
        if !self.floor_price.is_finite() || self.floor_price < 0.0 {
            return Err(SimulationError::InvalidFloor(self.floor_price));
        }
        if !self.max_bid.is_finite() || self.max_bid <= self.floor_price {
            return Err(SimulationError::InvalidRange {
                floor_price: self.floor_price,
                max_bid: self.max_bid,
            });
        }
        Ok(())
    }

    /// Bid position relative to the max bid, the driver of every uplift.
    fn bid_ratio(&self) -> f64 {
        self.bid_amount / self.max_bid
    }
}

/// Win probability of `bid` in an auction bounded by `[floor, max]`.
///
/// Caller guarantees `max > floor`.
pub fn win_probability(bid: f64, floor: f64, max: f64, policy: &SimulationPolicy) -> f64 {
    if bid < floor {
        return 0.0;
    }
    if bid >= max {
        return policy.win_cap;
    }

    let normalized = (bid - floor) / (max - floor);
    logistic(normalized, policy.steepness)
}

/// Logistic curve centred on 0.5.
pub fn logistic(normalized: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * (normalized - 0.5)).exp())
}

/// Run the model. Pure: identical inputs give identical outputs.
pub fn simulate(input: &BidSimulationInput, policy: &SimulationPolicy) -> BidSimulationResult {
    let ratio = input.bid_ratio();
    let efficiency = 1.0 + ratio * policy.efficiency_lift;

    BidSimulationResult {
        win_probability: win_probability(
            input.bid_amount,
            input.floor_price,
            input.max_bid,
            policy,
        ),
        expected_click_through_rate: policy.base_ctr * (1.0 + ratio * policy.ctr_lift),
        expected_conversion_rate: policy.base_cvr * (1.0 + ratio * policy.cvr_lift),
        expected_cost_per_acquisition: input.bid_amount
            / (policy.base_ctr * policy.base_cvr * efficiency),
        expected_return_on_investment: efficiency * policy.roi_multiplier - input.bid_amount,
    }
}

/// [`simulate`] behind [`BidSimulationInput::validate`].
pub fn simulate_checked(
    input: &BidSimulationInput,
    policy: &SimulationPolicy,
) -> Result<BidSimulationResult, SimulationError> {
    input.validate()?;
    Ok(simulate(input, policy))
}

/// Simulate every bid from `from` to `to` (inclusive) in increments of `step`.
///
/// Bids are computed as `from + i * step` and rounded to 1e-9 so the points
/// line up with what a slider would emit.
pub fn sweep(
    floor_price: f64,
    max_bid: f64,
    from: f64,
    to: f64,
    step: f64,
    policy: &SimulationPolicy,
) -> Result<Vec<(f64, BidSimulationResult)>, SimulationError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SimulationError::InvalidStep(step));
    }
    if !from.is_finite() || !to.is_finite() {
        return Err(SimulationError::InvalidSweepBounds { from, to });
    }

    let count = ((to - from) / step + 1e-9).floor();
    if count < 0.0 {
        return Ok(Vec::new());
    }
    if count >= MAX_SWEEP_POINTS as f64 {
        return Err(SimulationError::TooManyPoints {
            requested: count + 1.0,
            limit: MAX_SWEEP_POINTS,
        });
    }

    let count = count as usize;
    let mut points = Vec::with_capacity(count + 1);
    for i in 0..=count {
        let bid = ((from + i as f64 * step) * 1e9).round() / 1e9;
        let input = BidSimulationInput::new(bid, floor_price, max_bid);
        points.push((bid, simulate_checked(&input, policy)?));
    }
    Ok(points)
}
