//! Health-metric forecasting library
//!
//! This crate projects a client's physiological test results 5 and 10 years
//! ahead with a Monte Carlo simulation. It supports:
//! - Relative (compounding) and absolute (z-score) decline per decade
//! - Age-segmented decline with an acceleration age and post rate
//! - Correlated rate shocks across tests via a Cholesky factor
//! - Log-normal or additive measurement noise, inverted before projection
//! - An improvement scenario with per-test gain models
//! - Practice effects at a configured horizon
//! - A minimal OOXML reader and writer for intake and output workbooks
//!
//! # Builder DSL
//!
//! ```ignore
//! use healthcast_core::config::ForecastBuilder;
//! use healthcast_core::model::{Client, Scenario};
//! use healthcast_core::pipeline::simulate_and_write;
//!
//! let model = ForecastBuilder::new()
//!     .test("VO2 max", |t| t.higher_is_better().base_rate(0.05).rate_cv(0.2).noise_cv(0.05))
//!     .test("HbA1c", |t| t.lower_is_better().base_rate(0.03).noise_cv(0.02))
//!     .correlate("VO2 max", "HbA1c", -0.3)
//!     .n_sim(1000)
//!     .seed(42)
//!     .build()?;
//!
//! let clients = vec![Client::new("Ada", Some(45.0)).with_baseline("VO2 max", 40.0)];
//! simulate_and_write(&clients, &model, Scenario::Decline, "decline.xlsx".as_ref())?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod correlation;
pub mod error;
pub mod pipeline;
pub mod projector;
pub mod sanity;
pub mod shock;
pub mod simulation;
pub mod workbook;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{ForecastBuilder, ForecastConfig, ForecastModel};
pub use error::{ConfigError, ForecastError, WorkbookError};
pub use model::{Client, ClientProjection, Scenario};
pub use pipeline::{RunSummary, read_clients, read_clients_with, simulate_and_write};
