//! Nash-equilibrium bidding against a field of competitors.
//!
//! Bids are discretized into `n` levels `(i + 1) / n` of the campaign max
//! bid. For every (campaign, competitor set) pair the model keeps an n×n
//! payoff matrix `P[ours][theirs]`, seeded with
//!
//! ```text
//! P[i][j] = 1 - level_i   if level_i > level_j   (win: value minus price)
//!         = 0             otherwise              (lose: nothing)
//! ```
//!
//! and nudged toward realized utilities as auction results come in.
//!
//! The mixed strategy `x` is the solution of the (n+1)×(n+1) system
//!
//! ```text
//! [ Pᵀ  1 ] [x]   [0]
//! [ 1ᵀ  0 ] [v] = [1]
//! ```
//!
//! solved by LU decomposition, with negatives clamped and the result
//! renormalized. When the system is singular (the seeded matrix always is),
//! the strategy falls back to weights proportional to `i + 1`.

use nalgebra::{DMatrix, DVector};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::data::models::{decimal_to_f64, money_from_f64, BidRequest, BidResponse, Campaign};
use crate::errors::AdOptError;
use crate::services::prediction::Predictions;

use super::{CompetitorSet, GameTheoryModel, GameTheoryType};

/// LU pivots smaller than this mark the system as singular.
const SINGULARITY_THRESHOLD: f64 = 1e-11;

const DEFAULT_PREDICTED_CTR: f64 = 0.01;
const DEFAULT_PREDICTED_CVR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NashConfig {
    /// Number of discrete bid levels.
    pub bid_levels: usize,
    /// Weight of a new auction result in the payoff matrix.
    pub learning_rate: f64,
}

impl Default for NashConfig {
    fn default() -> Self {
        Self {
            bid_levels: 10,
            learning_rate: 0.1,
        }
    }
}

pub type PayoffMatrix = Vec<Vec<f64>>;

pub struct NashEquilibriumModel {
    config: NashConfig,
    payoff_matrices: RwLock<HashMap<String, PayoffMatrix>>,
}

impl NashEquilibriumModel {
    pub fn new(config: NashConfig) -> Self {
        Self {
            config,
            payoff_matrices: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> NashConfig {
        self.config
    }

    /// Key identifying a campaign facing a particular set of competitors.
    pub fn matrix_key(campaign: &Campaign, competitors: &CompetitorSet) -> String {
        let mut key = format!("campaign_{}", campaign.id);
        for competitor_id in competitors.keys() {
            key.push_str("_comp_");
            key.push_str(competitor_id);
        }
        key
    }

    /// Snapshot of a payoff matrix, if one has been created for `key`.
    pub fn payoff_matrix(&self, key: &str) -> Option<PayoffMatrix> {
        self.payoff_matrices.read().unwrap().get(key).cloned()
    }

    pub fn initial_payoff_matrix(&self) -> PayoffMatrix {
        let n = self.config.bid_levels;
        (0..n)
            .map(|i| {
                let ours = self.level(i);
                (0..n)
                    .map(|j| if ours > self.level(j) { 1.0 - ours } else { 0.0 })
                    .collect()
            })
            .collect()
    }

    /// Mixed strategy over bid levels for `payoff`.
    pub fn equilibrium_strategy(&self, payoff: &PayoffMatrix) -> Vec<f64> {
        match solve_equilibrium(payoff) {
            Ok(strategy) => strategy,
            Err(e) => {
                debug!(error = %e, "Equilibrium solve failed, using increasing-weight fallback");
                self.fallback_strategy()
            }
        }
    }

    /// Weights proportional to `i + 1`, favouring higher bids.
    pub fn fallback_strategy(&self) -> Vec<f64> {
        let n = self.config.bid_levels;
        let total = (n * (n + 1) / 2) as f64;
        (0..n).map(|i| (i + 1) as f64 / total).collect()
    }

    /// Expected bid level under `strategy`, scaled to the campaign max bid.
    pub fn bid_from_strategy(&self, strategy: &[f64], campaign: &Campaign) -> Decimal {
        let expected_level: f64 = strategy
            .iter()
            .enumerate()
            .map(|(i, p)| self.level(i) * p)
            .sum();
        money_from_f64(expected_level * decimal_to_f64(campaign.max_bid_price))
    }

    fn level(&self, index: usize) -> f64 {
        (index as f64 + 1.0) / self.config.bid_levels as f64
    }

    fn level_index(&self, bid_price: Decimal, max_bid: Decimal) -> usize {
        let n = self.config.bid_levels;
        if max_bid <= Decimal::ZERO {
            return 0;
        }
        let raw = (decimal_to_f64(bid_price) / decimal_to_f64(max_bid) * n as f64).floor();
        raw.clamp(0.0, (n - 1) as f64) as usize
    }
}

impl GameTheoryModel for NashEquilibriumModel {
    fn model_type(&self) -> GameTheoryType {
        GameTheoryType::NashEquilibrium
    }

    fn calculate_optimal_bid(
        &self,
        request: &BidRequest,
        campaign: &Campaign,
        competitors: &CompetitorSet,
        predictions: &Predictions,
    ) -> Decimal {
        debug!(
            request_id = %request.request_id,
            campaign_id = campaign.id,
            "Calculating optimal bid"
        );

        let key = Self::matrix_key(campaign, competitors);
        let payoff = {
            let mut matrices = self.payoff_matrices.write().unwrap();
            matrices
                .entry(key)
                .or_insert_with(|| self.initial_payoff_matrix())
                .clone()
        };

        let strategy = self.equilibrium_strategy(&payoff);
        let baseline = self.bid_from_strategy(&strategy, campaign);
        let adjusted = adjust_for_user_value(baseline, predictions.user_value_estimate);
        enforce_bid_constraints(adjusted, campaign, request)
    }

    fn calculate_utility(
        &self,
        campaign: &Campaign,
        bid_price: Decimal,
        predictions: &Predictions,
    ) -> f64 {
        let ctr = predictions.predicted_ctr.unwrap_or(DEFAULT_PREDICTED_CTR);
        let cvr = predictions.predicted_cvr.unwrap_or(DEFAULT_PREDICTED_CVR);
        let weight = campaign.campaign_type.objective_weight() as f64;

        let expected_value = ctr + weight * ctr * cvr;
        expected_value - decimal_to_f64(bid_price)
    }

    fn update_model(
        &self,
        response: &BidResponse,
        campaign: &Campaign,
        competitors: &CompetitorSet,
    ) {
        let key = Self::matrix_key(campaign, competitors);
        let mut matrices = self.payoff_matrices.write().unwrap();
        let Some(payoff) = matrices.get_mut(&key) else {
            return;
        };

        let n = self.config.bid_levels;
        let ours = self.level_index(response.bid_price, campaign.max_bid_price);
        let won = response.is_won == Some(true);

        // Winning means the competitor sat one level below us; losing, one above.
        let theirs = if won {
            ours.saturating_sub(1)
        } else {
            (ours + 1).min(n - 1)
        };

        let utility = if won {
            let mut value = 0.0;
            if response.is_clicked == Some(true) {
                value += 1.0;
                if response.is_converted == Some(true) {
                    value += campaign.campaign_type.objective_weight() as f64;
                }
            }
            let cost = response.actual_price.unwrap_or(response.bid_price);
            value - decimal_to_f64(cost)
        } else {
            0.0
        };

        let lr = self.config.learning_rate;
        let cell = &mut payoff[ours][theirs];
        *cell = (1.0 - lr) * *cell + lr * utility;

        debug!(
            key = %key,
            ours,
            theirs,
            utility,
            cell = *cell,
            "Payoff matrix updated"
        );
    }
}

/// Scale a bid up by the estimated user value (never down).
fn adjust_for_user_value(baseline: Decimal, user_value: f64) -> Decimal {
    money_from_f64(decimal_to_f64(baseline) * (1.0 + user_value.max(0.0)))
}

/// Clamp to the slot floor, the campaign max, then the campaign floor.
fn enforce_bid_constraints(mut bid: Decimal, campaign: &Campaign, request: &BidRequest) -> Decimal {
    if bid < request.ad_slot_floor_price {
        bid = request.ad_slot_floor_price;
    }
    if bid > campaign.max_bid_price {
        bid = campaign.max_bid_price;
    }
    if let Some(floor) = campaign.bid_floor {
        if bid < floor {
            bid = floor;
        }
    }
    bid
}

/// Solve the equilibrium system for `payoff` and return a probability vector.
fn solve_equilibrium(payoff: &PayoffMatrix) -> Result<Vec<f64>, AdOptError> {
    let n = payoff.len();
    let a = DMatrix::from_fn(n + 1, n + 1, |i, j| match (i < n, j < n) {
        (true, true) => payoff[j][i],
        (false, false) => 0.0,
        _ => 1.0,
    });
    let mut rhs = DVector::zeros(n + 1);
    rhs[n] = 1.0;

    let lu = a.lu();
    let pivot = lu
        .u()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |min, p| min.min(p.abs()));
    let singular = AdOptError::SingularMatrix { size: n + 1, pivot };
    if pivot < SINGULARITY_THRESHOLD {
        return Err(singular);
    }
    let solution = lu
        .solve(&rhs)
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or(singular)?;

    let mut strategy: Vec<f64> = solution.iter().take(n).map(|p| p.max(0.0)).collect();
    let sum: f64 = strategy.iter().sum();
    if sum > 0.0 {
        for p in &mut strategy {
            *p /= sum;
        }
    } else {
        warn!("Equilibrium strategy is all zero, using uniform distribution");
        strategy = vec![1.0 / n as f64; n];
    }
    Ok(strategy)
}
