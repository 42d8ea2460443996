//! Ad campaign bidding engine.
//!
//! Architecture:
//! - Tokio async runtime; a mock exchange task feeds bid requests over mpsc
//! - Closed-form bid simulation model logged at startup
//! - Nash equilibrium bid pricing with heuristic CTR/CVR predictions
//! - Second-price auction resolution against simulated competitors
//! - Periodic bid optimization with small changes auto-applied

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use adopt_bidder::config::Settings;
use adopt_bidder::data::models::{BidRequest, BidResponse};
use adopt_bidder::exchange::{resolve_auction, MockExchange};
use adopt_bidder::services::bid_optimizer::BidOptimizer;
use adopt_bidder::services::scheduler::OptimizationScheduler;
use adopt_bidder::simulation::{
    simulate_checked, sweep, SLIDER_MAX_BID, SLIDER_MIN_BID, SLIDER_STEP,
};
use adopt_bidder::state::CampaignStore;

/// Requests between periodic performance logs.
const SUMMARY_EVERY: u64 = 100;

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    bids: u64,
    wins: u64,
    clicks: u64,
    conversions: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== Ad Campaign Bidding Engine ===");

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }

    let policy = settings.simulation_policy();
    info!(policy = ?policy, nash = ?settings.nash_config(), "Configuration loaded");

    // =========================================================================
    // Startup bid simulation
    // =========================================================================
    let input = settings.startup_simulation();
    let result = simulate_checked(&input, &policy)?;
    info!(
        bid = input.bid_amount,
        floor = input.floor_price,
        max = input.max_bid,
        win_probability = %format!("{:.4}", result.win_probability),
        ctr = %format!("{:.4}", result.expected_click_through_rate),
        cvr = %format!("{:.4}", result.expected_conversion_rate),
        cpa = %format!("{:.2}", result.expected_cost_per_acquisition),
        roi = %format!("{:.4}", result.expected_return_on_investment),
        "Bid simulation"
    );
    let points = sweep(
        input.floor_price,
        input.max_bid,
        SLIDER_MIN_BID,
        SLIDER_MAX_BID,
        SLIDER_STEP,
        &policy,
    )?;
    for (bid, r) in points {
        debug!(
            bid,
            win_probability = %format!("{:.4}", r.win_probability),
            cpa = %format!("{:.2}", r.expected_cost_per_acquisition),
            "Simulation sweep"
        );
    }

    // =========================================================================
    // Components
    // =========================================================================
    let store = CampaignStore::with_sample_campaigns();
    let optimizer = BidOptimizer::with_nash(settings.nash_config(), policy);
    let scheduler = OptimizationScheduler::new(store.clone(), settings.auto_apply_max_change_pct);
    let mut rng = match settings.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut request_rx = MockExchange::new(settings.exchange_config()).start();

    // Shutdown signal.
    let shutdown = Arc::new(Notify::new());
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        info!("Shutdown signal received");
        shutdown_clone.notify_waiters();
    });

    let mut optimize_tick =
        tokio::time::interval(Duration::from_secs(settings.optimize_interval_secs));
    let mut auto_apply_tick =
        tokio::time::interval(Duration::from_secs(settings.auto_apply_interval_secs));
    // First ticks complete immediately; there is no data yet.
    optimize_tick.tick().await;
    auto_apply_tick.tick().await;

    info!(
        campaigns = store.find_all().len(),
        optimize_interval_secs = settings.optimize_interval_secs,
        auto_apply_interval_secs = settings.auto_apply_interval_secs,
        "Starting bidding loop"
    );

    let mut counters = Counters::default();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Shutting down bidding loop...");
                break;
            }
            maybe_request = request_rx.recv() => {
                let Some(request) = maybe_request else {
                    warn!("Exchange feed closed");
                    break;
                };
                handle_request(&request, &store, &optimizer, &mut counters, &mut rng);

                if counters.requests % SUMMARY_EVERY == 0 {
                    info!(
                        requests = counters.requests,
                        bids = counters.bids,
                        wins = counters.wins,
                        clicks = counters.clicks,
                        conversions = counters.conversions,
                        users = optimizer.profiles().len(),
                        "Bidding update"
                    );
                }
            }
            _ = optimize_tick.tick() => {
                let created = scheduler.generate_optimizations(Utc::now(), &mut rng);
                debug!(count = created.len(), "Optimization pass complete");
            }
            _ = auto_apply_tick.tick() => {
                scheduler.auto_apply(Utc::now());
            }
        }
    }

    // Graceful shutdown.
    info!("Shutting down...");
    for campaign in store.find_all() {
        if let Some(summary) = store.performance_summary(campaign.id) {
            info!(
                campaign_id = summary.campaign_id,
                name = %summary.name,
                impressions = summary.impressions,
                clicks = summary.clicks,
                conversions = summary.conversions,
                spend = %summary.spend,
                remaining_budget = %summary.remaining_budget,
                ctr = ?summary.ctr,
                cpc = ?summary.cpc,
                cpa = ?summary.cpa,
                "Final campaign performance"
            );
        }
    }
    info!(
        pending_optimizations = store.pending_optimizations().len(),
        responses = store.bid_response_count(),
        "Engine shutdown complete."
    );

    Ok(())
}

/// Bid every eligible campaign, enter the best bid into the auction, and
/// record the outcome.
fn handle_request(
    request: &BidRequest,
    store: &CampaignStore,
    optimizer: &BidOptimizer,
    counters: &mut Counters,
    rng: &mut StdRng,
) {
    counters.requests += 1;
    let now = Utc::now();

    let mut best: Option<BidResponse> = None;
    for campaign in store.find_eligible(request, now) {
        match optimizer.generate_bid_response(request, &campaign, rng) {
            Ok(response) if response.is_bid() => {
                if best.as_ref().map_or(true, |b| response.bid_price > b.bid_price) {
                    best = Some(response);
                }
            }
            Ok(_) => {}
            Err(e) if e.is_recoverable() => {
                warn!(campaign_id = campaign.id, error = %e, "Bid generation failed")
            }
            Err(e) => error!(campaign_id = campaign.id, error = %e, "Bidding model unavailable"),
        }
    }

    let Some(response) = best else {
        debug!(request_id = %request.request_id, "No eligible bid");
        return;
    };
    counters.bids += 1;

    let Some(campaign) = store.find(response.campaign_id) else {
        warn!(campaign_id = response.campaign_id, "Campaign disappeared before auction");
        return;
    };

    let competitors = optimizer.competitors().cached_profiles(&request.ad_slot_id);
    let outcome = resolve_auction(&response, &competitors, request.ad_slot_floor_price, rng);

    let processed = match optimizer.process_auction_result(
        &response, request, &campaign, &outcome, now, rng,
    ) {
        Ok(processed) => processed,
        Err(e) => {
            warn!(response_id = %response.response_id, error = %e, "Auction processing failed");
            return;
        }
    };

    if let Err(e) = store.record_auction_result(
        &processed,
        outcome.won,
        processed.is_clicked == Some(true),
        processed.is_converted == Some(true),
        now.date_naive(),
    ) {
        warn!(error = %e, "Failed to record auction result");
    }

    if outcome.won {
        counters.wins += 1;
    }
    if processed.is_clicked == Some(true) {
        counters.clicks += 1;
    }
    if processed.is_converted == Some(true) {
        counters.conversions += 1;
    }
    store.save_bid_response(processed);
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
