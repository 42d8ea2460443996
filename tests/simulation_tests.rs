//! Bid simulation model tests.
//!
//! Every test includes a hand-calculated expected value comment so that any
//! formula regression is caught before it reaches the dashboard.

use adopt_bidder::simulation::{
    simulate, simulate_checked, sweep, win_probability, BidSimulationInput, SimulationError,
    SimulationPolicy, SLIDER_MAX_BID, SLIDER_MIN_BID, SLIDER_STEP,
};

const EPS: f64 = 1e-6;

fn run(bid: f64, floor: f64, max: f64) -> adopt_bidder::simulation::BidSimulationResult {
    simulate(
        &BidSimulationInput::new(bid, floor, max),
        &SimulationPolicy::default(),
    )
}

// =============================================================================
// Win probability
// =============================================================================

#[test]
fn test_below_floor_never_wins() {
    let policy = SimulationPolicy::default();
    assert_eq!(win_probability(0.49, 0.5, 3.0, &policy), 0.0);
    assert_eq!(win_probability(0.0, 0.5, 3.0, &policy), 0.0);
}

#[test]
fn test_at_or_above_max_is_capped() {
    let policy = SimulationPolicy::default();
    assert_eq!(win_probability(3.0, 0.5, 3.0, &policy), 0.95);
    assert_eq!(win_probability(10.0, 0.5, 3.0, &policy), 0.95);
}

#[test]
fn test_midpoint_is_one_half() {
    // normalized = (1.75 - 0.5) / 2.5 = 0.5  =>  1 / (1 + e^0) = 0.5
    let policy = SimulationPolicy::default();
    assert!((win_probability(1.75, 0.5, 3.0, &policy) - 0.5).abs() < 1e-12);
}

#[test]
fn test_midpoint_is_one_half_for_zero_floor() {
    // normalized = (1.0 - 0.0) / 2.0 = 0.5  =>  0.5
    let policy = SimulationPolicy::default();
    assert!((win_probability(1.0, 0.0, 2.0, &policy) - 0.5).abs() < 1e-12);
    assert!((run(1.0, 0.0, 2.0).win_probability - 0.5).abs() < 1e-12);
}

#[test]
fn test_at_floor_uses_curve_not_zero() {
    // normalized = 0  =>  1 / (1 + e^5) = 0.0066929
    let policy = SimulationPolicy::default();
    let p = win_probability(0.5, 0.5, 3.0, &policy);
    assert!((p - 0.0066929).abs() < EPS);
}

#[test]
fn test_win_probability_is_monotone_over_range() {
    let policy = SimulationPolicy::default();
    let mut last = -1.0;
    for i in 0..=100 {
        let bid = 0.5 + 2.5 * i as f64 / 100.0;
        let p = win_probability(bid, 0.5, 3.0, &policy);
        assert!(p >= last, "not monotone at bid {bid}");
        assert!((0.0..=1.0).contains(&p));
        last = p;
    }
}

// =============================================================================
// Full simulation
// =============================================================================

#[test]
fn test_dashboard_default_inputs() {
    // bid 1.0, floor 0.5, max 3.0, r = 1/3
    // win = 1 / (1 + e^(-10 * (0.2 - 0.5))) = 1 / (1 + e^3) = 0.0474259
    // ctr = 0.025 * (1 + 0.2/3)            = 0.0266667
    // cvr = 0.12  * (1 + 0.1/3)            = 0.124
    // cpa = 1 / (0.003 * 1.1)              = 303.0303
    // roi = 1.1 * 2 - 1                    = 1.2
    let r = run(1.0, 0.5, 3.0);
    assert!((r.win_probability - 0.0474259).abs() < EPS);
    assert!((r.expected_click_through_rate - 0.0266667).abs() < EPS);
    assert!((r.expected_conversion_rate - 0.124).abs() < EPS);
    assert!((r.expected_cost_per_acquisition - 303.0303).abs() < 1e-3);
    assert!((r.expected_return_on_investment - 1.2).abs() < EPS);
}

#[test]
fn test_bid_at_max() {
    // r = 1: ctr 0.03, cvr 0.132, cpa 3 / (0.003 * 1.3) = 769.2308, roi 2.6 - 3 = -0.4
    let r = run(3.0, 0.5, 3.0);
    assert_eq!(r.win_probability, 0.95);
    assert!((r.expected_click_through_rate - 0.03).abs() < EPS);
    assert!((r.expected_conversion_rate - 0.132).abs() < EPS);
    assert!((r.expected_cost_per_acquisition - 769.2308).abs() < 1e-3);
    assert!((r.expected_return_on_investment + 0.4).abs() < EPS);
}

#[test]
fn test_small_bid_with_zero_floor() {
    // ctr = 0.025 * (1 + (0.1 / 3) * 0.2) = 0.0251667
    let r = run(0.1, 0.0, 3.0);
    assert!((r.expected_click_through_rate - 0.0251667).abs() < EPS);
}

#[test]
fn test_below_floor_still_reports_rates() {
    // win is zero but the rate estimates only depend on bid / max.
    // ctr = 0.025 * (1 + (0.4 / 3) * 0.2) = 0.0256667
    let r = run(0.4, 0.5, 3.0);
    assert_eq!(r.win_probability, 0.0);
    assert!((r.expected_click_through_rate - 0.0256667).abs() < EPS);
}

#[test]
fn test_rates_strictly_increase_with_bid() {
    let low = run(1.0, 0.5, 3.0);
    let high = run(2.0, 0.5, 3.0);
    assert!(high.expected_click_through_rate > low.expected_click_through_rate);
    assert!(high.expected_conversion_rate > low.expected_conversion_rate);
    assert!(high.expected_cost_per_acquisition > low.expected_cost_per_acquisition);
}

#[test]
fn test_simulation_is_pure() {
    assert_eq!(run(1.3, 0.5, 3.0), run(1.3, 0.5, 3.0));
}

#[test]
fn test_custom_policy() {
    // Flat logistic and no lifts: midpoint still 0.5, rates equal base.
    let policy = SimulationPolicy {
        steepness: 1.0,
        win_cap: 1.0,
        base_ctr: 0.05,
        ctr_lift: 0.0,
        base_cvr: 0.2,
        cvr_lift: 0.0,
        efficiency_lift: 0.0,
        roi_multiplier: 1.0,
    };
    let r = simulate(&BidSimulationInput::new(2.0, 1.0, 3.0), &policy);
    assert!((r.win_probability - 0.5).abs() < 1e-12);
    assert!((r.expected_click_through_rate - 0.05).abs() < 1e-12);
    assert!((r.expected_conversion_rate - 0.2).abs() < 1e-12);
    // cpa = 2 / (0.05 * 0.2) = 200, roi = 1 - 2 = -1
    assert!((r.expected_cost_per_acquisition - 200.0).abs() < 1e-9);
    assert!((r.expected_return_on_investment + 1.0).abs() < 1e-12);
    assert_eq!(
        simulate(&BidSimulationInput::new(3.0, 1.0, 3.0), &policy).win_probability,
        1.0
    );
}

// =============================================================================
// Validation and sweeps
// =============================================================================

#[test]
fn test_checked_rejects_max_not_above_floor() {
    let err = simulate_checked(
        &BidSimulationInput::new(1.0, 2.0, 2.0),
        &SimulationPolicy::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SimulationError::InvalidRange {
            floor_price: 2.0,
            max_bid: 2.0
        }
    );
}

#[test]
fn test_sweep_covers_inclusive_range() {
    // 0.5, 0.75, ..., 3.0  =>  11 points
    let points = sweep(0.5, 3.0, 0.5, 3.0, 0.25, &SimulationPolicy::default()).unwrap();
    assert_eq!(points.len(), 11);
    assert_eq!(points[0].0, 0.5);
    assert_eq!(points[10].0, 3.0);
    assert_eq!(points[10].1.win_probability, 0.95);
    // 0.5 + 5 * 0.25 = 1.75 is the midpoint.
    assert!((points[5].1.win_probability - 0.5).abs() < 1e-12);
}

#[test]
fn test_dashboard_slider_sweep() {
    // 0.1, 0.2, ..., 5.0  =>  50 points against floor 0.5, max 3.0.
    let points = sweep(
        0.5,
        3.0,
        SLIDER_MIN_BID,
        SLIDER_MAX_BID,
        SLIDER_STEP,
        &SimulationPolicy::default(),
    )
    .unwrap();
    assert_eq!(points.len(), 50);
    assert_eq!(points[0].0, 0.1);
    assert_eq!(points[49].0, 5.0);

    // 0.1 ..= 0.4 sit below the floor.
    for (bid, r) in &points[..4] {
        assert_eq!(r.win_probability, 0.0, "bid {bid} below floor");
    }

    // Bid 0.5 is on the floor: 1 / (1 + e^5) = 0.0066929
    assert_eq!(points[4].0, 0.5);
    assert!((points[4].1.win_probability - 0.0066929).abs() < EPS);

    // 3.0 ..= 5.0 (21 points) are capped.
    assert_eq!(points[29].0, 3.0);
    for (bid, r) in &points[29..] {
        assert_eq!(r.win_probability, 0.95, "bid {bid} at or above max");
    }
}

#[test]
fn test_sweep_rejects_unbounded_range() {
    let err = sweep(0.5, 3.0, 0.1, f64::INFINITY, 0.1, &SimulationPolicy::default()).unwrap_err();
    assert!(matches!(err, SimulationError::InvalidSweepBounds { .. }));
}

#[test]
fn test_sweep_with_empty_range() {
    let points = sweep(0.5, 3.0, 2.0, 1.0, 0.1, &SimulationPolicy::default()).unwrap();
    assert!(points.is_empty());
}
