pub mod adapters;
pub mod config;
pub mod lotl;
pub mod pki;
pub mod report;
pub mod telemetry;
