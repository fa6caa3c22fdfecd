//! orderpoint: indicator-fusion order point analyzer and backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`monitor`] drives the domain
//! from polled market data.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod monitor;
pub mod ports;
