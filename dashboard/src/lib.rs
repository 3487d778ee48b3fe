//! Silo telemetry dashboard: binning engine, reading store, and HTTP surface.

pub mod background;
pub mod charts;
pub mod config;
pub mod dashboard_config;
pub mod readings;
pub mod routes;
pub mod settings;
pub mod state;
pub mod styles;
pub mod views;
