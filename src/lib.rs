//! Library entrypoint for adopt-bidder.
//!
//! Exposes all modules so integration tests can import them.

pub mod config;
pub mod data;
pub mod errors;
pub mod exchange;
pub mod game_theory;
pub mod services;
pub mod simulation;
pub mod state;
