//! Solar, battery and inverter sizing from utility bill history.
//!
//! The pipeline runs load profile → targets → equipment → production →
//! finance → recommendation; see [`sizing::SizingEngine`].

pub mod config;
pub mod domain;
pub mod equipment;
pub mod finance;
pub mod load_profile;
pub mod production;
pub mod repo;
pub mod sizing;
pub mod tariff;
pub mod telemetry;
