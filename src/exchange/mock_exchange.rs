//! Mock bid request feed.
//!
//! Emits synthetic bid requests at a fixed interval from a background
//! tokio task, standing in for an exchange connection.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::models::BidRequest;

/// Slot sizes the exchange offers. The last fits none of the sample creatives.
const SLOT_SIZES: &[(u32, u32)] = &[(300, 250), (728, 90), (300, 600), (160, 600)];
const PUBLISHERS: &[&str] = &["news.example.com", "sports.example.com", "shop.example.com"];
const GEO_REGIONS: &[&str] = &["US-CA", "US-NY", "US-TX", "GB-LND"];
/// Distinct users per identifier kind, so profiles get reused.
const USER_POOL: u32 = 50;

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub exchange_id: String,
    pub request_interval_ms: u64,
    /// Floor prices a slot is drawn from.
    pub floor_prices: Vec<Decimal>,
    /// Seed for reproducible traffic; entropy when unset.
    pub seed: Option<u64>,
    pub channel_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            exchange_id: "mock_exchange".to_string(),
            request_interval_ms: 500,
            floor_prices: vec![Decimal::new(25, 2), Decimal::new(50, 2), Decimal::new(100, 2)],
            seed: None,
            channel_capacity: 256,
        }
    }
}

pub struct MockExchange {
    config: ExchangeConfig,
}

impl MockExchange {
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config }
    }

    /// Start emitting requests. Runs until the receiver is dropped.
    pub fn start(self) -> mpsc::Receiver<BidRequest> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        info!(
            exchange_id = %self.config.exchange_id,
            request_interval_ms = self.config.request_interval_ms,
            floors = ?self.config.floor_prices,
            seeded = self.config.seed.is_some(),
            "Mock exchange starting"
        );

        let config = self.config;
        tokio::spawn(async move {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut interval =
                tokio::time::interval(Duration::from_millis(config.request_interval_ms.max(1)));

            loop {
                interval.tick().await;
                let request = synthetic_request(&config, Utc::now(), &mut rng);
                debug!(
                    request_id = %request.request_id,
                    slot = %request.ad_slot_id,
                    floor = %request.ad_slot_floor_price,
                    "Bid request emitted"
                );
                if tx.send(request).await.is_err() {
                    info!("Bid request receiver dropped, mock exchange stopping");
                    break;
                }
            }
        });

        rx
    }
}

/// One random bid request stamped `now`.
pub fn synthetic_request<R: Rng + ?Sized>(
    config: &ExchangeConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> BidRequest {
    let (width, height) = SLOT_SIZES.choose(rng).copied().unwrap_or((300, 250));
    let publisher = PUBLISHERS.choose(rng).copied().unwrap_or("unknown");
    let floor = config
        .floor_prices
        .choose(rng)
        .copied()
        .unwrap_or(Decimal::new(50, 2));

    // Some users arrive with a cookie, some only with a device id.
    let user = rng.gen_range(0..USER_POOL);
    let (cookie_id, device_id) = if rng.gen_bool(0.7) {
        (Some(format!("cookie_{user}")), Some(format!("device_{user}")))
    } else {
        (None, Some(format!("device_{user}")))
    };

    BidRequest {
        request_id: Uuid::new_v4().to_string(),
        exchange_id: config.exchange_id.clone(),
        device_id,
        cookie_id,
        geo_region: GEO_REGIONS.choose(rng).map(|g| g.to_string()),
        publisher_domain: publisher.to_string(),
        ad_slot_id: format!("{publisher}_{width}x{height}"),
        ad_slot_width: width,
        ad_slot_height: height,
        ad_slot_floor_price: floor,
        timestamp: now,
    }
}
