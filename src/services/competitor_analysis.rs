//! Competitor tracking per ad slot.
//!
//! Each slot gets three archetypal competitors whose bid ranges are
//! multiples of the slot floor. Profiles are cached and refined from
//! observed clearing prices. The cache holds unscaled averages; the
//! time-of-day factor is applied to the copy handed out on lookup.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::data::models::{round_money, BidRequest};
use crate::game_theory::{CompetitorProfile, CompetitorSet, CompetitorStrategy};

pub const AGGRESSIVE: &str = "aggressive";
pub const CONSERVATIVE: &str = "conservative";
pub const TIME_SENSITIVE: &str = "timeSensitive";

/// Synthetic observations each archetype starts with.
const SEED_BID_COUNT: u32 = 10;

/// Assumed margin between our clearing price and the competitor's bid.
const CLEARING_PRICE_DISCOUNT: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

#[derive(Debug, Clone, Default)]
pub struct CompetitorAnalysisService {
    cache: Arc<RwLock<HashMap<String, CompetitorProfile>>>,
}

impl CompetitorAnalysisService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The competitors expected in `request`'s auction at local `hour`.
    pub fn competitor_profiles(&self, request: &BidRequest, hour: u32) -> CompetitorSet {
        let mut set = CompetitorSet::new();
        for role in [AGGRESSIVE, CONSERVATIVE, TIME_SENSITIVE] {
            let key = cache_key(role, &request.ad_slot_id);
            let mut cache = self.cache.write().unwrap();
            let mut profile = cache
                .entry(key)
                .or_insert_with(|| archetype(role, request))
                .clone();

            if profile.strategy == CompetitorStrategy::TimeSensitive {
                profile.average_bid_price = profile
                    .average_bid_price
                    .map(|avg| round_money(avg * time_of_day_bid_factor(hour)));
            }
            set.insert(role.to_string(), profile);
        }
        set
    }

    /// Record an auction we won at `actual_price` against every competitor
    /// in `competitors`, and return the refreshed, unscaled profiles.
    pub fn update_competitor_profiles(
        &self,
        ad_slot_id: &str,
        actual_price: Decimal,
        competitors: &CompetitorSet,
    ) -> CompetitorSet {
        let estimated_bid = round_money(actual_price * CLEARING_PRICE_DISCOUNT);
        let mut cache = self.cache.write().unwrap();
        let mut updated = CompetitorSet::new();

        for role in competitors.keys() {
            let key = cache_key(role, ad_slot_id);
            let Some(profile) = cache.get_mut(&key) else {
                continue;
            };
            profile.add_bid_observation(estimated_bid, false);
            debug!(
                competitor = %profile.competitor_id,
                estimated_bid = %estimated_bid,
                bid_count = profile.bid_count,
                "Competitor profile updated"
            );
            updated.insert(role.clone(), profile.clone());
        }
        updated
    }

    /// Profiles already cached for `ad_slot_id`, without any hour scaling.
    pub fn cached_profiles(&self, ad_slot_id: &str) -> CompetitorSet {
        let cache = self.cache.read().unwrap();
        [AGGRESSIVE, CONSERVATIVE, TIME_SENSITIVE]
            .into_iter()
            .filter_map(|role| {
                cache
                    .get(&cache_key(role, ad_slot_id))
                    .map(|profile| (role.to_string(), profile.clone()))
            })
            .collect()
    }

    /// Every cached profile, e.g. for reporting.
    pub fn all_profiles(&self) -> Vec<CompetitorProfile> {
        let cache = self.cache.read().unwrap();
        let mut profiles: Vec<_> = cache.values().cloned().collect();
        profiles.sort_by(|a, b| a.competitor_id.cmp(&b.competitor_id));
        profiles
    }
}

fn cache_key(role: &str, ad_slot_id: &str) -> String {
    format!("{role}_{ad_slot_id}")
}

fn archetype(role: &str, request: &BidRequest) -> CompetitorProfile {
    let floor = request.ad_slot_floor_price;
    let (name, strategy, avg_mult, max_mult, notes) = match role {
        AGGRESSIVE => ("Aggressive Bidder", CompetitorStrategy::Aggressive, 20, 25, None),
        CONSERVATIVE => (
            "Conservative Bidder",
            CompetitorStrategy::Conservative,
            11,
            13,
            None,
        ),
        TIME_SENSITIVE => (
            "Time Sensitive Bidder",
            CompetitorStrategy::TimeSensitive,
            15,
            20,
            Some("Active during hours: 9-12,13-17,18-22".to_string()),
        ),
        _ => ("Unknown Bidder", CompetitorStrategy::Unknown, 10, 10, None),
    };

    let average = round_money(floor * Decimal::new(avg_mult, 1));
    let mut profile = CompetitorProfile::new(
        format!("{role}_{}", request.ad_slot_id),
        name,
        request.ad_slot_id.clone(),
        strategy,
    );
    profile.average_bid_price = Some(average);
    profile.min_bid_price = Some(floor);
    profile.max_bid_price = Some(round_money(floor * Decimal::new(max_mult, 1)));
    profile.bid_count = SEED_BID_COUNT;
    profile.notes = notes;
    profile
}

/// Scaling of a time-sensitive competitor's average bid by local hour.
pub fn time_of_day_bid_factor(hour: u32) -> Decimal {
    match hour {
        9..=11 => Decimal::ONE,
        13..=16 => Decimal::new(12, 1),
        18..=21 => Decimal::new(9, 1),
        _ => Decimal::new(7, 1),
    }
}
