//! Port traits for the collaborators the backtester talks to.

pub mod config_port;
pub mod data_port;
pub mod report_port;
