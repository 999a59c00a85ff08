//! Port traits: how the domain reaches prices, configuration and report sinks.

pub mod config_port;
pub mod data_port;
pub mod report_port;
