mod orchestrator;
mod runtime;
mod scenario;
mod shutdown;
mod startup;
mod types;


pub use orchestrator::PreviewOrchestrator;
pub use scenario::{Scenario, ScenarioPlayer, ScenarioStep};
pub use types::{ComponentState, ShutdownReason};
