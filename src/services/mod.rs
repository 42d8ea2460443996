pub mod bid_optimizer;
pub mod competitor_analysis;
pub mod prediction;
pub mod scheduler;
pub mod user_profile;
