//! Observed bidding behaviour of a single competitor on an ad slot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::models::round_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorStrategy {
    Aggressive,
    Conservative,
    TimeSensitive,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub competitor_id: String,
    pub competitor_name: String,
    pub ad_slot_id: String,

    pub average_bid_price: Option<Decimal>,
    pub min_bid_price: Option<Decimal>,
    pub max_bid_price: Option<Decimal>,
    pub bid_count: u32,

    pub estimated_quality_score: Option<f64>,
    pub win_rate: Option<f64>,

    pub strategy: CompetitorStrategy,
    pub notes: Option<String>,

    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CompetitorProfile {
    pub fn new(
        competitor_id: impl Into<String>,
        competitor_name: impl Into<String>,
        ad_slot_id: impl Into<String>,
        strategy: CompetitorStrategy,
    ) -> Self {
        let now = Utc::now();
        Self {
            competitor_id: competitor_id.into(),
            competitor_name: competitor_name.into(),
            ad_slot_id: ad_slot_id.into(),
            average_bid_price: None,
            min_bid_price: None,
            max_bid_price: None,
            bid_count: 0,
            estimated_quality_score: None,
            win_rate: None,
            strategy,
            notes: None,
            first_seen: now,
            last_updated: now,
        }
    }

    /// Fold one observed bid into the running statistics.
    pub fn add_bid_observation(&mut self, bid_price: Decimal, won_auction: bool) {
        self.bid_count += 1;
        let count = Decimal::from(self.bid_count);

        if self.min_bid_price.map_or(true, |min| bid_price < min) {
            self.min_bid_price = Some(bid_price);
        }
        if self.max_bid_price.map_or(true, |max| bid_price > max) {
            self.max_bid_price = Some(bid_price);
        }

        self.average_bid_price = Some(match self.average_bid_price {
            None => bid_price,
            Some(avg) => round_money((avg * (count - Decimal::ONE) + bid_price) / count),
        });

        let won = if won_auction { 1.0 } else { 0.0 };
        self.win_rate = Some(match self.win_rate {
            None => won,
            Some(rate) => {
                let n = self.bid_count as f64;
                (rate * (n - 1.0) + won) / n
            }
        });

        self.last_updated = Utc::now();
    }
}
