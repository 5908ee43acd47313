//! # envlink: Subprocess-Backed Tabular RL Optimization
//!
//! Tabular reinforcement-learning training loop whose environment dynamics
//! run out-of-process in a supervised subprocess. Host and subprocess talk
//! over TCP with a line-framed text protocol; a transition cache reconciles
//! the subprocess's asynchronous transition reports into the single canonical
//! transition the training loop consumes per step.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          one optimization run                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  training thread           worker thread          subprocess    │
//! │  ┌─────────────┐           ┌───────────┐          ┌──────────┐  │
//! │  │   Engine    │           │  Worker   │          │ wrapped  │  │
//! │  │ cache/table │◀──bridge──│ read loop │◀───TCP───│  script  │  │
//! │  │ rng/history │───reply──▶│  (send)   │────TCP──▶│          │  │
//! │  └──────┬──────┘           └─────▲─────┘          └────▲─────┘  │
//! │         │                        │                     │        │
//! │         │  bind + accept   ┌─────┴──────┐   spawn  ┌───┴─────┐  │
//! │         └─────────────────▶│EventServer │          │Launcher │  │
//! │                            └────────────┘          └─────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never touch training state: inbound `step` frames cross to the
//! training thread through a channel bridge, and the training thread does
//! every mutation itself.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use envlink::{Engine, EngineConfig, Enumeration, StateSpace};
//!
//! let space = StateSpace::new(state_axes, action_axes);
//! let config = EngineConfig::default()
//!     .with_save_dir("run_out")
//!     .with_script("environment.py");
//!
//! let mut engine = Engine::new(space, config);
//! while engine.continue_iterating() {
//!     let (state, action) = engine.select_next_state()?;
//!     let outcome = evaluate(state, action);
//!     engine.process_results(
//!         &outcome.old_state,
//!         &outcome.action,
//!         &outcome.new_state,
//!         outcome.probability,
//!         outcome.score,
//!     )?;
//! }
//! engine.finish_optimization()?;
//! let policy = engine.get_results()?;
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod net;
pub mod protocol;
pub mod sampling;
pub mod space;
pub mod subprocess;

pub use cache::{Transition, TransitionCache, TransitionKey};
pub use engine::{Engine, EngineConfig, HistoryTable, QTable, SpaceDescription, StepReply, VisitCounter};
pub use error::{Error, Result};
pub use net::{Event, EventServer, Worker};
pub use sampling::WeightedSampler;
pub use space::{Enumeration, StateSpace};
pub use subprocess::{SubprocessLauncher, WrapperTemplate, TEMPLATE_VERSION};
