//! Upload-triggered image processing workflow
//!
//! - `flows`: the orchestrator driving each durable pipeline instance
//! - `state`: the `{state -> action, next}` transition table
//! - `tasks`: transform worker invocation and its retry policy
//! - `processors`: image codec and startup setup
//! - `types`: in-process guard against driving an instance twice

pub mod flows;
pub mod processors;
pub mod state;
pub mod tasks;
pub mod types;

pub use flows::Orchestrator;
