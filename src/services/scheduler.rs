//! Periodic bid optimization.
//!
//! `generate_optimizations` proposes a new max bid for every running
//! campaign with performance data; `auto_apply` applies the proposals whose
//! change is small enough to not need review.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::data::models::{
    decimal_to_f64, money_from_f64, BidOptimization, Campaign, OptimizationStatus,
};
use crate::errors::AdOptError;
use crate::game_theory::GameTheoryType;
use crate::state::CampaignStore;

pub const RAISE_REASON: &str = "Competitor bidding increased; raising bid to maintain position";
pub const LOWER_REASON: &str = "Opportunity to maintain performance with a lower bid";

/// Optimized bid is the current max bid scaled by a factor in this range.
const ADJUSTMENT_RANGE: (f64, f64) = (0.8, 1.2);

#[derive(Debug, Clone)]
pub struct OptimizationScheduler {
    store: CampaignStore,
    /// Largest |change| / previous, in percent, applied without review.
    max_auto_change_pct: Decimal,
}

impl OptimizationScheduler {
    pub fn new(store: CampaignStore, max_auto_change_pct: Decimal) -> Self {
        Self {
            store,
            max_auto_change_pct,
        }
    }

    /// Propose and store a pending optimization for each running campaign
    /// that has metrics. Campaigns that fail are logged and skipped.
    pub fn generate_optimizations<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<BidOptimization> {
        let mut created = Vec::new();
        for campaign in self.store.find_running(now) {
            if campaign.metrics.is_empty() {
                continue;
            }
            match propose(&campaign, now, rng) {
                Ok(optimization) => {
                    let stored = self.store.add_optimization(optimization);
                    info!(
                        optimization_id = stored.id,
                        campaign_id = stored.campaign_id,
                        previous_bid = %stored.previous_bid,
                        optimized_bid = %stored.optimized_bid,
                        performance_change = stored.performance_change,
                        "Bid optimization proposed"
                    );
                    created.push(stored);
                }
                Err(e) => warn!(campaign_id = campaign.id, error = %e, "Skipping optimization"),
            }
        }
        created
    }

    /// Apply every pending optimization whose change is within the
    /// auto-apply threshold. Returns the applied ones.
    pub fn auto_apply(&self, now: DateTime<Utc>) -> Vec<BidOptimization> {
        let mut applied = Vec::new();
        for optimization in self.store.pending_optimizations() {
            let within = optimization
                .change_pct()
                .is_some_and(|pct| pct <= self.max_auto_change_pct);
            if !within {
                continue;
            }
            match self.store.apply_optimization(optimization.id, now) {
                Ok(o) => applied.push(o),
                Err(e) => warn!(optimization_id = optimization.id, error = %e, "Auto-apply failed"),
            }
        }
        if !applied.is_empty() {
            info!(count = applied.len(), "Optimizations auto-applied");
        }
        applied
    }
}

fn propose<R: Rng + ?Sized>(
    campaign: &Campaign,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<BidOptimization, AdOptError> {
    let previous_bid = campaign.max_bid_price;
    let factor = rng.gen_range(ADJUSTMENT_RANGE.0..=ADJUSTMENT_RANGE.1);
    let optimized_bid = money_from_f64(decimal_to_f64(previous_bid) * factor);
    if previous_bid <= Decimal::ZERO || optimized_bid <= Decimal::ZERO {
        return Err(AdOptError::InvalidBid {
            campaign_id: campaign.id,
            price: optimized_bid,
        });
    }

    let raising = optimized_bid > previous_bid;
    Ok(BidOptimization {
        id: 0,
        campaign_id: campaign.id,
        previous_bid,
        optimized_bid,
        performance_change: performance_change(previous_bid, optimized_bid),
        status: OptimizationStatus::Pending,
        reason: if raising { RAISE_REASON } else { LOWER_REASON }.to_string(),
        game_theory_model: GameTheoryType::NashEquilibrium,
        created_at: now,
        applied_at: None,
    })
}

/// Expected performance change in percent of moving from `previous` to
/// `optimized`. Raising is credited at half the relative increase, lowering
/// at a quarter of the relative saving.
pub fn performance_change(previous: Decimal, optimized: Decimal) -> f64 {
    let previous = decimal_to_f64(previous);
    let optimized = decimal_to_f64(optimized);
    if optimized > previous {
        (optimized / previous - 1.0) * 50.0
    } else {
        (previous / optimized - 1.0) * 25.0
    }
}
