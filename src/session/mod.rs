mod builder;
mod machine;
mod state;
#[cfg(test)]
mod tests;

pub use builder::SessionStateMachineBuilder;
pub use machine::SessionStateMachine;
pub use state::{SessionSnapshot, SessionState};
