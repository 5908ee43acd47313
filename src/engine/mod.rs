//! Training-loop side of the system: coordinator, bridge, tables, config.

mod bridge;
mod config;
mod coordinator;
mod tables;

pub use bridge::{StepBridge, StepEvent, StepSender};
pub use config::EngineConfig;
pub use coordinator::{Engine, SpaceDescription, StepReply};
pub use tables::{HistoryTable, QTable, VisitCounter};

#[cfg(test)]
mod tests;
