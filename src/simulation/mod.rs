pub mod bid_simulator;

pub use bid_simulator::{
    simulate, simulate_checked, sweep, win_probability, BidSimulationInput, BidSimulationResult,
    SimulationError, SimulationPolicy, MAX_SWEEP_POINTS, SLIDER_MAX_BID, SLIDER_MIN_BID,
    SLIDER_STEP,
};
