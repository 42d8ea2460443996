//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::exchange::ExchangeConfig;
use crate::game_theory::NashConfig;
use crate::simulation::{BidSimulationInput, SimulationPolicy};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // Logging
    pub log_level: String,
    pub log_json: bool,

    // Startup simulation
    pub sim_bid_amount: f64,
    pub sim_floor_price: f64,
    pub sim_max_bid: f64,

    // Simulation policy
    pub sim_steepness: f64,
    pub sim_win_cap: f64,
    pub sim_base_ctr: f64,
    pub sim_ctr_lift: f64,
    pub sim_base_cvr: f64,
    pub sim_cvr_lift: f64,
    pub sim_efficiency_lift: f64,
    pub sim_roi_multiplier: f64,

    // Nash model
    pub nash_bid_levels: usize,
    pub nash_learning_rate: f64,

    // Mock exchange
    pub exchange_request_interval_ms: u64,
    pub exchange_floor_prices: Vec<Decimal>,

    // Scheduler
    pub optimize_interval_secs: u64,
    pub auto_apply_interval_secs: u64,
    pub auto_apply_max_change_pct: Decimal,

    pub rng_seed: Option<u64>,
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();

        let policy = SimulationPolicy::default();

        Self {
            log_level: env_str("LOG_LEVEL", "info"),
            log_json: env_bool("LOG_JSON", false),

            sim_bid_amount: env_f64("SIM_BID_AMOUNT", 1.0),
            sim_floor_price: env_f64("SIM_FLOOR_PRICE", 0.5),
            sim_max_bid: env_f64("SIM_MAX_BID", 3.0),

            sim_steepness: env_f64("SIM_STEEPNESS", policy.steepness),
            sim_win_cap: env_f64("SIM_WIN_CAP", policy.win_cap),
            sim_base_ctr: env_f64("SIM_BASE_CTR", policy.base_ctr),
            sim_ctr_lift: env_f64("SIM_CTR_LIFT", policy.ctr_lift),
            sim_base_cvr: env_f64("SIM_BASE_CVR", policy.base_cvr),
            sim_cvr_lift: env_f64("SIM_CVR_LIFT", policy.cvr_lift),
            sim_efficiency_lift: env_f64("SIM_EFFICIENCY_LIFT", policy.efficiency_lift),
            sim_roi_multiplier: env_f64("SIM_ROI_MULTIPLIER", policy.roi_multiplier),

            nash_bid_levels: env_usize("NASH_BID_LEVELS", 10),
            nash_learning_rate: env_f64("NASH_LEARNING_RATE", 0.1),

            exchange_request_interval_ms: env_u64("EXCHANGE_REQUEST_INTERVAL_MS", 500),
            exchange_floor_prices: env_decimal_csv_default("EXCHANGE_FLOOR_PRICES", "0.25,0.5,1.0"),

            optimize_interval_secs: env_u64("OPTIMIZE_INTERVAL_SECS", 60),
            auto_apply_interval_secs: env_u64("AUTO_APPLY_INTERVAL_SECS", 300),
            auto_apply_max_change_pct: env_decimal("AUTO_APPLY_MAX_CHANGE_PCT", Decimal::new(5, 0)),

            rng_seed: std::env::var("RNG_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }

    pub fn simulation_policy(&self) -> SimulationPolicy {
        SimulationPolicy {
            steepness: self.sim_steepness,
            win_cap: self.sim_win_cap,
            base_ctr: self.sim_base_ctr,
            ctr_lift: self.sim_ctr_lift,
            base_cvr: self.sim_base_cvr,
            cvr_lift: self.sim_cvr_lift,
            efficiency_lift: self.sim_efficiency_lift,
            roi_multiplier: self.sim_roi_multiplier,
        }
    }

    pub fn startup_simulation(&self) -> BidSimulationInput {
        BidSimulationInput::new(self.sim_bid_amount, self.sim_floor_price, self.sim_max_bid)
    }

    pub fn nash_config(&self) -> NashConfig {
        NashConfig {
            bid_levels: self.nash_bid_levels,
            learning_rate: self.nash_learning_rate,
        }
    }

    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            request_interval_ms: self.exchange_request_interval_ms,
            floor_prices: self.exchange_floor_prices.clone(),
            seed: self.rng_seed,
            ..ExchangeConfig::default()
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.startup_simulation().validate() {
            errors.push(format!("SIM_BID_AMOUNT / SIM_FLOOR_PRICE / SIM_MAX_BID: {e}"));
        }

        if !self.sim_steepness.is_finite() || self.sim_steepness <= 0.0 {
            errors.push("SIM_STEEPNESS must be finite and > 0".to_string());
        }

        if !self.sim_win_cap.is_finite() || self.sim_win_cap <= 0.0 || self.sim_win_cap > 1.0 {
            errors.push("SIM_WIN_CAP must be in (0, 1]".to_string());
        }

        let base_rates = [
            ("SIM_BASE_CTR", self.sim_base_ctr),
            ("SIM_BASE_CVR", self.sim_base_cvr),
        ];
        for (key, value) in base_rates {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                errors.push(format!("{key} must be in (0, 1)"));
            }
        }

        if self.nash_bid_levels < 2 {
            errors.push("NASH_BID_LEVELS must be >= 2".to_string());
        }

        let lifts = [
            ("SIM_CTR_LIFT", self.sim_ctr_lift),
            ("SIM_CVR_LIFT", self.sim_cvr_lift),
            ("SIM_EFFICIENCY_LIFT", self.sim_efficiency_lift),
            ("SIM_ROI_MULTIPLIER", self.sim_roi_multiplier),
        ];
        for (key, value) in lifts {
            if !value.is_finite() {
                errors.push(format!("{key} must be finite"));
            }
        }

        let lr = self.nash_learning_rate;
        if !lr.is_finite() || lr <= 0.0 || lr > 1.0 {
            errors.push("NASH_LEARNING_RATE must be in (0, 1]".to_string());
        }

        if self.exchange_floor_prices.is_empty()
            || self.exchange_floor_prices.iter().any(|f| *f <= Decimal::ZERO)
        {
            errors.push(
                "EXCHANGE_FLOOR_PRICES must be a non-empty list of positive prices".to_string(),
            );
        }

        if self.optimize_interval_secs == 0 || self.auto_apply_interval_secs == 0 {
            errors.push(
                "OPTIMIZE_INTERVAL_SECS and AUTO_APPLY_INTERVAL_SECS must be > 0".to_string(),
            );
        }

        if self.auto_apply_max_change_pct < Decimal::ZERO {
            errors.push("AUTO_APPLY_MAX_CHANGE_PCT must be >= 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for Settings {
    /// Built-in defaults, ignoring the environment.
    fn default() -> Self {
        let policy = SimulationPolicy::default();
        let nash = NashConfig::default();
        let exchange = ExchangeConfig::default();
        Self {
            log_level: "info".to_string(),
            log_json: false,
            sim_bid_amount: 1.0,
            sim_floor_price: 0.5,
            sim_max_bid: 3.0,
            sim_steepness: policy.steepness,
            sim_win_cap: policy.win_cap,
            sim_base_ctr: policy.base_ctr,
            sim_ctr_lift: policy.ctr_lift,
            sim_base_cvr: policy.base_cvr,
            sim_cvr_lift: policy.cvr_lift,
            sim_efficiency_lift: policy.efficiency_lift,
            sim_roi_multiplier: policy.roi_multiplier,
            nash_bid_levels: nash.bid_levels,
            nash_learning_rate: nash.learning_rate,
            exchange_request_interval_ms: exchange.request_interval_ms,
            exchange_floor_prices: exchange.floor_prices,
            optimize_interval_secs: 60,
            auto_apply_interval_secs: 300,
            auto_apply_max_change_pct: Decimal::new(5, 0),
            rng_seed: None,
        }
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated decimals; unparseable entries are dropped.
fn env_decimal_csv_default(key: &str, default: &str) -> Vec<Decimal> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| Decimal::from_str(s).ok())
        .collect()
}
