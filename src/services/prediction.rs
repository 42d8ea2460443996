//! Heuristic response-rate predictions.
//!
//! Stand-ins for trained CTR / CVR / user-value models: a campaign target
//! rate scaled by profile, time-of-day and jitter multipliers, then clamped
//! to a realistic band. Randomness and the hour are passed in so callers
//! control determinism.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::models::{round_money, BidRequest, Campaign, CampaignType};
use crate::simulation::bid_simulator::logistic;
use crate::simulation::SimulationPolicy;

use super::user_profile::UserProfile;

const DEFAULT_BASE_CTR: f64 = 0.01;
const DEFAULT_BASE_CVR: f64 = 0.1;

const CTR_BOUNDS: (f64, f64) = (0.001, 0.1);
const CVR_BOUNDS: (f64, f64) = (0.01, 0.5);

/// Win-probability curve spans floor..=floor * WIN_CURVE_SPAN.
const WIN_CURVE_SPAN: i64 = 3;
const WIN_CURVE_POINTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinProbabilityPoint {
    pub price: Decimal,
    pub probability: f64,
}

/// Everything a bidding model needs to know about the expected response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub predicted_ctr: Option<f64>,
    pub predicted_cvr: Option<f64>,
    pub user_value_estimate: f64,
    pub win_probabilities: Vec<WinProbabilityPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionService {
    policy: SimulationPolicy,
}

impl PredictionService {
    pub fn new(policy: SimulationPolicy) -> Self {
        Self { policy }
    }

    /// All predictions for one auction.
    pub fn predict<R: Rng + ?Sized>(
        &self,
        request: &BidRequest,
        campaign: &Campaign,
        profile: Option<&UserProfile>,
        hour: u32,
        rng: &mut R,
    ) -> Predictions {
        Predictions {
            predicted_ctr: Some(self.predict_ctr(campaign, profile, hour, rng)),
            predicted_cvr: Some(self.predict_cvr(campaign, profile, rng)),
            user_value_estimate: self.estimate_user_value(campaign, profile, rng),
            win_probabilities: self.predict_win_probabilities(request.ad_slot_floor_price),
        }
    }

    pub fn predict_ctr<R: Rng + ?Sized>(
        &self,
        campaign: &Campaign,
        profile: Option<&UserProfile>,
        hour: u32,
        rng: &mut R,
    ) -> f64 {
        let base = campaign.target_ctr.unwrap_or(DEFAULT_BASE_CTR);
        let jitter = rng.gen_range(0.8..1.2);
        let ctr = base
            * profile_ctr_multiplier(profile)
            * time_of_day_ctr_multiplier(hour)
            * ad_position_ctr_multiplier()
            * jitter;
        ctr.clamp(CTR_BOUNDS.0, CTR_BOUNDS.1)
    }

    pub fn predict_cvr<R: Rng + ?Sized>(
        &self,
        campaign: &Campaign,
        profile: Option<&UserProfile>,
        rng: &mut R,
    ) -> f64 {
        let base = campaign.target_conversion_rate.unwrap_or(DEFAULT_BASE_CVR);
        let jitter = rng.gen_range(0.9..1.1);
        let cvr = base * profile_cvr_multiplier(profile) * jitter;
        cvr.clamp(CVR_BOUNDS.0, CVR_BOUNDS.1)
    }

    pub fn estimate_user_value<R: Rng + ?Sized>(
        &self,
        campaign: &Campaign,
        profile: Option<&UserProfile>,
        rng: &mut R,
    ) -> f64 {
        let base = match campaign.campaign_type {
            CampaignType::Cpc => 0.5,
            CampaignType::Cpa => 1.0,
            CampaignType::Cpm => 0.2,
            CampaignType::Hybrid => 0.5,
        };
        let jitter = rng.gen_range(0.8..1.2);
        base * user_value_multiplier(profile) * jitter
    }

    /// Win probability at 11 evenly spaced prices from the floor to 3× the floor.
    pub fn predict_win_probabilities(&self, floor_price: Decimal) -> Vec<WinProbabilityPoint> {
        let max_price = floor_price * Decimal::from(WIN_CURVE_SPAN);
        (0..=WIN_CURVE_POINTS)
            .map(|i| {
                let ratio = Decimal::from(i) / Decimal::from(WIN_CURVE_POINTS);
                let price = round_money(floor_price + (max_price - floor_price) * ratio);
                let probability =
                    logistic(i as f64 / WIN_CURVE_POINTS as f64, self.policy.steepness);
                WinProbabilityPoint { price, probability }
            })
            .collect()
    }
}

fn profile_ctr_multiplier(profile: Option<&UserProfile>) -> f64 {
    let Some(profile) = profile else {
        return 1.0;
    };
    let target = if profile.is_target_audience { 1.5 } else { 0.8 };
    let recency = (-(profile.days_since_last_interest as f64) / 10.0)
        .exp()
        .clamp(0.5, 1.5);
    target * recency
}

fn profile_cvr_multiplier(profile: Option<&UserProfile>) -> f64 {
    let Some(profile) = profile else {
        return 1.0;
    };
    let history = if profile.has_previous_conversion { 2.0 } else { 0.7 };
    let recency = (-(profile.days_since_last_visit as f64) / 7.0)
        .exp()
        .clamp(0.5, 1.5);
    history * recency
}

fn user_value_multiplier(profile: Option<&UserProfile>) -> f64 {
    match profile {
        Some(p) => 0.7 * p.purchasing_power + 0.3 * p.engagement_level,
        None => 1.0,
    }
}

/// Engagement by local hour of day.
pub fn time_of_day_ctr_multiplier(hour: u32) -> f64 {
    match hour {
        7..=9 => 1.2,
        10..=11 => 0.9,
        12..=13 => 1.1,
        14..=16 => 0.8,
        17..=19 => 1.3,
        20..=22 => 1.2,
        _ => 0.7,
    }
}

// Every slot is treated as equally visible.
fn ad_position_ctr_multiplier() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_table() {
        assert_eq!(time_of_day_ctr_multiplier(6), 0.7);
        assert_eq!(time_of_day_ctr_multiplier(7), 1.2);
        assert_eq!(time_of_day_ctr_multiplier(11), 0.9);
        assert_eq!(time_of_day_ctr_multiplier(13), 1.1);
        assert_eq!(time_of_day_ctr_multiplier(16), 0.8);
        assert_eq!(time_of_day_ctr_multiplier(19), 1.3);
        assert_eq!(time_of_day_ctr_multiplier(22), 1.2);
        assert_eq!(time_of_day_ctr_multiplier(23), 0.7);
    }

    #[test]
    fn test_win_curve_spans_floor_to_three_times_floor() {
        let service = PredictionService::default();
        let curve = service.predict_win_probabilities(Decimal::new(50, 2));
        assert_eq!(curve.len(), 11);
        assert_eq!(curve[0].price, Decimal::new(50, 2));
        // 0.50 + 1.00 * 0.5 = 1.00 sits on the midpoint.
        assert_eq!(curve[5].price, Decimal::new(100, 2));
        assert!((curve[5].probability - 0.5).abs() < 1e-12);
        assert_eq!(curve[10].price, Decimal::new(150, 2));
        // 1 / (1 + e^-5) = 0.9933
        assert!((curve[10].probability - 0.9933071).abs() < 1e-6);
    }

    #[test]
    fn test_profile_multipliers_default_without_profile() {
        assert_eq!(profile_ctr_multiplier(None), 1.0);
        assert_eq!(profile_cvr_multiplier(None), 1.0);
        assert_eq!(user_value_multiplier(None), 1.0);
    }
}
