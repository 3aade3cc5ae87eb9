//! # Screener Service
//!
//! Configuration, logging setup and the command line front end for the fair
//! value screener. The valuation math lives in `valuation-engine` and the
//! record collection in `company-store`; this crate wires them together.

pub mod cli;
pub mod config;
pub mod logging;

// Re-export main types for easy usage
pub use cli::{Cli, CliHandler, Commands};
pub use config::{load_config, ScreenerConfig};
pub use logging::initialize_logging;
