//! Core data models for campaigns, auctions, and optimizations.
//!
//! Money is carried as `Decimal`; rates and probabilities as `f64`.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::game_theory::GameTheoryType;

/// Round a money amount to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an `f64` into cents via its shortest decimal form.
/// Non-finite input maps to zero.
pub fn money_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(round_money)
        .unwrap_or(Decimal::ZERO)
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignType {
    /// Cost per click.
    Cpc,
    /// Cost per thousand impressions.
    Cpm,
    /// Cost per acquisition.
    Cpa,
    Hybrid,
}

impl CampaignType {
    /// Weight of a conversion relative to a click when scoring utility.
    pub fn objective_weight(&self) -> i32 {
        match self {
            Self::Cpc => 1,
            Self::Cpa => 20,
            Self::Hybrid => 10,
            Self::Cpm => 5,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreativeType {
    #[default]
    Image,
    Text,
    Video,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Pending,
    Sent,
    Won,
    Lost,
    Timeout,
    Error,
    /// Campaign declined to bid; never sent to the exchange.
    NoBid,
}

impl BidStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Timeout | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationStatus {
    Pending,
    Applied,
    Rejected,
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Applied => write!(f, "APPLIED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

// =============================================================================
// Campaigns
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    pub id: u64,
    pub name: String,
    pub image_url: String,
    pub landing_page_url: String,
    pub width: u32,
    pub height: u32,
    pub creative_type: CreativeType,
    pub active: bool,
}

impl Creative {
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// Daily performance counters for a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetric {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: Decimal,
}

impl CampaignMetric {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            impressions: 0,
            clicks: 0,
            conversions: 0,
            spend: Decimal::ZERO,
        }
    }

    pub fn day_of_week(&self) -> Weekday {
        self.date.weekday()
    }

    /// clicks / impressions.
    pub fn click_through_rate(&self) -> Option<f64> {
        (self.impressions > 0).then(|| self.clicks as f64 / self.impressions as f64)
    }

    /// conversions / clicks.
    pub fn conversion_rate(&self) -> Option<f64> {
        (self.clicks > 0).then(|| self.conversions as f64 / self.clicks as f64)
    }

    pub fn cost_per_click(&self) -> Option<Decimal> {
        (self.clicks > 0).then(|| round_money(self.spend / Decimal::from(self.clicks)))
    }

    pub fn cost_per_mille(&self) -> Option<Decimal> {
        (self.impressions > 0).then(|| {
            round_money(self.spend * Decimal::ONE_THOUSAND / Decimal::from(self.impressions))
        })
    }

    pub fn cost_per_acquisition(&self) -> Option<Decimal> {
        (self.conversions > 0).then(|| round_money(self.spend / Decimal::from(self.conversions)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Zero until the store assigns one.
    pub id: u64,
    pub name: String,
    pub description: String,
    pub advertiser_id: String,
    pub campaign_type: CampaignType,

    pub total_budget: Decimal,
    pub remaining_budget: Decimal,
    pub daily_budget: Decimal,

    /// Lowest bid the campaign will place.
    pub bid_floor: Option<Decimal>,
    pub max_bid_price: Decimal,

    pub target_ctr: Option<f64>,
    pub target_conversion_rate: Option<f64>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: CampaignStatus,

    pub creatives: Vec<Creative>,
    pub target_audiences: BTreeSet<String>,
    pub metrics: Vec<CampaignMetric>,
}

impl Campaign {
    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }

    pub fn has_budget(&self) -> bool {
        self.remaining_budget > Decimal::ZERO
    }

    /// Active and inside its scheduled window at `now`.
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        true
    }

    pub fn has_creative_for(&self, width: u32, height: u32) -> bool {
        self.creatives.iter().any(|c| c.fits(width, height))
    }

    /// First active creative matching the slot dimensions.
    pub fn select_creative(&self, width: u32, height: u32) -> Option<&Creative> {
        self.creatives
            .iter()
            .find(|c| c.active && c.fits(width, height))
    }

    pub fn spent_budget(&self) -> Decimal {
        self.total_budget - self.remaining_budget
    }
}

// =============================================================================
// Auctions
// =============================================================================

/// Bid request received from an ad exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    pub request_id: String,
    pub exchange_id: String,
    pub device_id: Option<String>,
    pub cookie_id: Option<String>,
    pub geo_region: Option<String>,
    pub publisher_domain: String,
    pub ad_slot_id: String,
    pub ad_slot_width: u32,
    pub ad_slot_height: u32,
    /// Minimum price set by the publisher.
    pub ad_slot_floor_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Our answer to a bid request, later completed with the auction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub response_id: String,
    pub request_id: String,
    pub ad_slot_id: String,
    pub campaign_id: u64,
    pub creative_id: Option<u64>,

    pub bid_price: Decimal,
    /// What we actually paid (second price).
    pub actual_price: Option<Decimal>,
    pub status: BidStatus,

    pub is_won: Option<bool>,
    pub is_clicked: Option<bool>,
    pub is_converted: Option<bool>,

    pub predicted_ctr: Option<f64>,
    pub predicted_cvr: Option<f64>,

    pub game_theory_model: Option<GameTheoryType>,
    pub game_theory_parameters: serde_json::Value,
    pub utility_score: Option<f64>,

    pub timestamp: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl BidResponse {
    pub fn is_bid(&self) -> bool {
        self.status != BidStatus::NoBid
    }
}

/// What happened to a bid once the exchange closed the auction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub won: bool,
    pub clicked: bool,
    pub converted: bool,
    /// Clearing price; `None` when lost or not reported.
    pub actual_price: Option<Decimal>,
}

impl AuctionOutcome {
    pub fn lost() -> Self {
        Self {
            won: false,
            clicked: false,
            converted: false,
            actual_price: None,
        }
    }
}

// =============================================================================
// Optimizations
// =============================================================================

/// A recommended change to a campaign's max bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidOptimization {
    pub id: u64,
    pub campaign_id: u64,
    pub previous_bid: Decimal,
    pub optimized_bid: Decimal,
    /// Expected performance change in percent.
    pub performance_change: f64,
    pub status: OptimizationStatus,
    pub reason: String,
    pub game_theory_model: GameTheoryType,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
}

impl BidOptimization {
    /// |optimized - previous| / previous, in percent (4dp before scaling).
    pub fn change_pct(&self) -> Option<Decimal> {
        if self.previous_bid.is_zero() {
            return None;
        }
        let ratio = ((self.optimized_bid - self.previous_bid).abs() / self.previous_bid)
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
        Some(ratio * Decimal::ONE_HUNDRED)
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Aggregate performance of a campaign across all of its metric days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub campaign_id: u64,
    pub name: String,
    pub status: CampaignStatus,
    pub campaign_type: CampaignType,
    pub total_budget: Decimal,
    pub remaining_budget: Decimal,
    pub spent_budget: Decimal,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: Decimal,
    pub ctr: Option<f64>,
    pub cvr: Option<f64>,
    pub cpm: Option<Decimal>,
    pub cpc: Option<Decimal>,
    pub cpa: Option<Decimal>,
}

impl PerformanceSummary {
    pub fn from_campaign(campaign: &Campaign) -> Self {
        let mut totals = CampaignMetric::empty(NaiveDate::MIN);
        for metric in &campaign.metrics {
            totals.impressions += metric.impressions;
            totals.clicks += metric.clicks;
            totals.conversions += metric.conversions;
            totals.spend += metric.spend;
        }

        let has_spend = totals.spend > Decimal::ZERO;

        Self {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            status: campaign.status,
            campaign_type: campaign.campaign_type,
            total_budget: campaign.total_budget,
            remaining_budget: campaign.remaining_budget,
            spent_budget: campaign.spent_budget(),
            impressions: totals.impressions,
            clicks: totals.clicks,
            conversions: totals.conversions,
            spend: totals.spend,
            ctr: totals.click_through_rate(),
            // Conversion rate is only reported once there are impressions.
            cvr: totals
                .click_through_rate()
                .and_then(|_| totals.conversion_rate()),
            cpm: totals.cost_per_mille().filter(|_| has_spend),
            cpc: totals.cost_per_click().filter(|_| has_spend),
            cpa: totals.cost_per_acquisition().filter(|_| has_spend),
        }
    }
}
