//! Second-price auction resolution against simulated competitor bids.

use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use crate::data::models::{decimal_to_f64, money_from_f64, AuctionOutcome, BidResponse};
use crate::game_theory::{CompetitorProfile, CompetitorSet};

/// Resolve `response` in an auction with `competitors` and a slot `floor`.
///
/// Each competitor bids uniformly within its observed range. We win by
/// strictly beating every competitor and pay the higher of the best
/// competing bid and the floor. Clicks and conversions are drawn from the
/// response's predicted rates.
pub fn resolve_auction<R: Rng + ?Sized>(
    response: &BidResponse,
    competitors: &CompetitorSet,
    floor: Decimal,
    rng: &mut R,
) -> AuctionOutcome {
    if !response.is_bid() || response.bid_price < floor {
        return AuctionOutcome::lost();
    }

    let best_competing = competitors
        .values()
        .filter_map(|c| competitor_bid(c, rng))
        .max()
        .unwrap_or(Decimal::ZERO);

    if response.bid_price <= best_competing {
        debug!(
            response_id = %response.response_id,
            bid = %response.bid_price,
            best_competing = %best_competing,
            "Auction lost"
        );
        return AuctionOutcome::lost();
    }

    let clearing_price = best_competing.max(floor).min(response.bid_price);
    let clicked = rng.gen_bool(probability(response.predicted_ctr));
    let converted = clicked && rng.gen_bool(probability(response.predicted_cvr));

    AuctionOutcome {
        won: true,
        clicked,
        converted,
        actual_price: Some(clearing_price),
    }
}

fn competitor_bid<R: Rng + ?Sized>(profile: &CompetitorProfile, rng: &mut R) -> Option<Decimal> {
    let average = profile.average_bid_price?;
    let low = decimal_to_f64(profile.min_bid_price.unwrap_or(average));
    let high = decimal_to_f64(profile.max_bid_price.unwrap_or(average));
    if high <= low {
        return Some(average);
    }
    Some(money_from_f64(rng.gen_range(low..=high)))
}

fn probability(rate: Option<f64>) -> f64 {
    rate.unwrap_or(0.0).clamp(0.0, 1.0)
}
