// simulation_engine/mod.rs
pub mod simulation;

pub use simulation::{SimulationDriver, SimulationState, SimulationSummary};
