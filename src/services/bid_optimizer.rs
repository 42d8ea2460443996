//! Turns bid requests into bid responses and learns from auction results.

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::models::{AuctionOutcome, BidRequest, BidResponse, BidStatus, Campaign};
use crate::errors::AdOptError;
use crate::game_theory::{
    CompetitorSet, GameTheoryModel, GameTheoryType, ModelRegistry, NashConfig,
};
use crate::simulation::SimulationPolicy;

use super::competitor_analysis::CompetitorAnalysisService;
use super::prediction::PredictionService;
use super::user_profile::{UserEvent, UserProfileStore};

#[derive(Debug)]
pub struct BidOptimizer {
    registry: ModelRegistry,
    model_type: GameTheoryType,
    predictions: PredictionService,
    profiles: UserProfileStore,
    competitors: CompetitorAnalysisService,
}

impl BidOptimizer {
    pub fn new(registry: ModelRegistry, policy: SimulationPolicy) -> Self {
        Self {
            registry,
            model_type: GameTheoryType::NashEquilibrium,
            predictions: PredictionService::new(policy),
            profiles: UserProfileStore::new(),
            competitors: CompetitorAnalysisService::new(),
        }
    }

    /// Optimizer bidding with the Nash equilibrium model.
    pub fn with_nash(config: NashConfig, policy: SimulationPolicy) -> Self {
        Self::new(ModelRegistry::with_nash(config), policy)
    }

    pub fn profiles(&self) -> &UserProfileStore {
        &self.profiles
    }

    pub fn competitors(&self) -> &CompetitorAnalysisService {
        &self.competitors
    }

    fn model(&self, model_type: GameTheoryType) -> Result<Arc<dyn GameTheoryModel>, AdOptError> {
        self.registry
            .get(model_type)
            .ok_or_else(|| AdOptError::ModelUnavailable(model_type.to_string()))
    }

    /// Price `campaign`'s bid on `request`.
    ///
    /// Inactive campaigns, exhausted budgets, and slots no creative fits get
    /// a `NoBid` response at price zero. The request timestamp's hour drives
    /// the time-of-day heuristics.
    pub fn generate_bid_response<R: Rng + ?Sized>(
        &self,
        request: &BidRequest,
        campaign: &Campaign,
        rng: &mut R,
    ) -> Result<BidResponse, AdOptError> {
        if !campaign.is_active()
            || !campaign.has_budget()
            || !campaign.has_creative_for(request.ad_slot_width, request.ad_slot_height)
        {
            debug!(
                request_id = %request.request_id,
                campaign_id = campaign.id,
                "Campaign not eligible, no bid"
            );
            return Ok(no_bid(request, campaign));
        }

        let hour = request.timestamp.hour();
        let profile = self.profiles.get_or_create(
            request.cookie_id.as_deref(),
            request.device_id.as_deref(),
            rng,
        );
        let competitors = self.competitors.competitor_profiles(request, hour);
        let predictions = self
            .predictions
            .predict(request, campaign, Some(&profile), hour, rng);

        let model = self.model(self.model_type)?;
        let bid_price = model.calculate_optimal_bid(request, campaign, &competitors, &predictions);
        if bid_price <= Decimal::ZERO {
            return Err(AdOptError::InvalidBid {
                campaign_id: campaign.id,
                price: bid_price,
            });
        }
        let utility = model.calculate_utility(campaign, bid_price, &predictions);

        let Some(creative) = campaign.select_creative(request.ad_slot_width, request.ad_slot_height)
        else {
            // Only inactive creatives fit this slot.
            return Ok(no_bid(request, campaign));
        };

        let response = BidResponse {
            response_id: Uuid::new_v4().to_string(),
            request_id: request.request_id.clone(),
            ad_slot_id: request.ad_slot_id.clone(),
            campaign_id: campaign.id,
            creative_id: Some(creative.id),
            bid_price,
            actual_price: None,
            status: BidStatus::Sent,
            is_won: None,
            is_clicked: None,
            is_converted: None,
            predicted_ctr: predictions.predicted_ctr,
            predicted_cvr: predictions.predicted_cvr,
            game_theory_model: Some(model.model_type()),
            game_theory_parameters: json!({
                "competitors": competitors.keys().collect::<Vec<_>>(),
                "user_value_estimate": predictions.user_value_estimate,
                "win_probabilities": predictions.win_probabilities,
            }),
            utility_score: Some(utility),
            timestamp: request.timestamp,
            processed_at: None,
        };

        debug!(
            request_id = %request.request_id,
            campaign_id = campaign.id,
            creative_id = creative.id,
            bid_price = %bid_price,
            utility,
            "Bid generated"
        );
        Ok(response)
    }

    /// Complete `response` with the auction outcome and feed it back into
    /// the bidding model. A win at an unknown price is charged the bid price.
    pub fn process_auction_result<R: Rng + ?Sized>(
        &self,
        response: &BidResponse,
        request: &BidRequest,
        campaign: &Campaign,
        outcome: &AuctionOutcome,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<BidResponse, AdOptError> {
        let AuctionOutcome {
            won,
            clicked,
            converted,
            actual_price,
        } = *outcome;

        let mut result = response.clone();
        result.is_won = Some(won);
        result.is_clicked = Some(won && clicked);
        result.is_converted = Some(won && clicked && converted);
        result.status = if won { BidStatus::Won } else { BidStatus::Lost };
        result.actual_price = won.then(|| actual_price.unwrap_or(response.bid_price));
        result.processed_at = Some(now);

        let competitors: CompetitorSet = self.competitors.cached_profiles(&request.ad_slot_id);
        let model_type = response.game_theory_model.unwrap_or(self.model_type);
        self.model(model_type)?
            .update_model(&result, campaign, &competitors);

        if let Some(price) = result.actual_price {
            self.competitors
                .update_competitor_profiles(&request.ad_slot_id, price, &competitors);
        }

        let cookie = request.cookie_id.as_deref();
        let device = request.device_id.as_deref();
        if result.is_clicked == Some(true) {
            self.profiles.track_event(cookie, device, UserEvent::Click, rng);
        }
        if result.is_converted == Some(true) {
            self.profiles
                .track_event(cookie, device, UserEvent::Conversion, rng);
        }

        info!(
            response_id = %result.response_id,
            campaign_id = campaign.id,
            won,
            clicked = result.is_clicked == Some(true),
            converted = result.is_converted == Some(true),
            actual_price = ?result.actual_price,
            "Auction result processed"
        );
        Ok(result)
    }
}

fn no_bid(request: &BidRequest, campaign: &Campaign) -> BidResponse {
    BidResponse {
        response_id: Uuid::new_v4().to_string(),
        request_id: request.request_id.clone(),
        ad_slot_id: request.ad_slot_id.clone(),
        campaign_id: campaign.id,
        creative_id: None,
        bid_price: Decimal::ZERO,
        actual_price: None,
        status: BidStatus::NoBid,
        is_won: None,
        is_clicked: None,
        is_converted: None,
        predicted_ctr: None,
        predicted_cvr: None,
        game_theory_model: None,
        game_theory_parameters: serde_json::Value::Null,
        utility_score: None,
        timestamp: request.timestamp,
        processed_at: None,
    }
}
