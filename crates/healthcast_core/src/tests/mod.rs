//! Integration tests for the healthcast forecasting engine
//!
//! Tests are organized by topic:
//! - `scenarios` - End-to-end decline and improvement projections
//! - `determinism` - Seeding, parallel execution and reproducibility
//! - `workbook_roundtrip` - Writing and reading workbooks on disk

mod determinism;
mod scenarios;
