//! Shell-session instrumentation and safety gating for shai.
//!
//! The library holds everything but argument parsing: the per-shell session
//! log, the lifecycle state machine behind the shell hooks, feedback
//! correlation, the staging policy for generated commands and the context
//! handed to the generator.

pub mod assistant;
pub mod context;
pub mod feedback;
pub mod generator;
pub mod init;
pub mod logging;
pub mod metadata;
pub mod preferences;
pub mod safety;
pub mod session;
pub mod session_log;
