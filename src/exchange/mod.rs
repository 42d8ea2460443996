//! Simulated ad exchange: a bid request feed and second-price auctions.

pub mod auction;
pub mod mock_exchange;

pub use auction::resolve_auction;
pub use mock_exchange::{ExchangeConfig, MockExchange};
