//! Deterministic contextual pricing.
//!
//! A record of category values (customer, device, calendar, weather, demand,
//! inventory, locale) is merged with defaults, every factor is turned into a
//! multiplier through the markup tables and the two composite formulas, and
//! the composed price is clamped to the configured band around the base price.

pub mod config;
pub mod error;
pub mod pricing;
pub mod telemetry;
