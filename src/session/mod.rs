//! Broadcast session
//!
//! The session is the orchestrator: it owns the pipeline state and the one
//! active pump, and turns listener commands into transitions.
//!
//! # State machine
//!
//! ```text
//!            start()               inject_effect()
//!   Idle ─────────────► Playing ─────────────────► Mixing ◄─┐
//!    ▲                    │                         │  │    │ inject_effect()
//!    │       stop()       │                         │  └────┘ (layers)
//!    ├────────────────────┘                         │
//!    │       stop()                                 │
//!    └──────────────────────────────────────────────┘
//! ```
//!
//! Every transition, including the pump swap of an effect splice, runs
//! under one async mutex. Commands that arrive together are applied one
//! after another, each seeing the state the previous one left behind.

pub mod broadcast;
pub mod command;
pub mod config;
pub mod state;

pub use broadcast::{BroadcastSession, SoxSession};
pub use command::{Command, CommandReply, CommandStatus};
pub use config::BroadcastConfig;
pub use state::PipelineState;
