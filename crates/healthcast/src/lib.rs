//! Command-line front end for the healthcast forecasting engine
//!
//! Loads an assumptions document, reads the intake workbook it points at and
//! writes one result workbook per scenario.

pub mod config_file;
mod logging;
mod runner;

pub use logging::init_logging;
pub use runner::{RunOptions, ScenarioSelection, run};
