//! Fleet unit replicator - keeps one fleet unit per machine.
//!
//! Each reconcile cycle lists machines and units from the fleet API, creates
//! a unit for every machine that lacks one, re-creates units whose definition
//! drifted from the template (at most one per cooldown window), and destroys
//! units whose machine has been gone longer than a grace period.

pub mod config;
pub mod fleet;
pub mod operator;
pub mod reconcile;
pub mod server;
pub mod service;
pub mod stats;
pub mod template;
pub mod types;

#[cfg(test)]
pub mod test_utils;
