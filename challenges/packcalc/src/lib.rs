//! Pack calculator.
//!
//! [`solver::solve`] picks the packs to ship for an order: never fewer items than asked for, as
//! few items as possible beyond that, and as few packs as possible among those. [`server`]
//! exposes it over HTTP.

pub mod api;
mod connection;
pub mod config;
pub mod protocol;
pub mod server;
pub mod solver;

pub use solver::{solve, SolveError, Solution};
