mod client;
mod definition;
mod ids;
mod projection;
mod scenario;

pub use client::Client;
pub use definition::{Direction, Magnitude, TestDefinition};
pub use ids::TestId;
pub use projection::{ClientProjection, HORIZONS, ProjectionStats, SimulationAccumulator};
pub use scenario::Scenario;
