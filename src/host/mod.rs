//! Host framework collaborators - module state machine and operator log

pub mod log;
pub mod module;

pub use log::{MemoryLog, OperatorLog, TracingLog};
pub use module::{ModuleBase, ModuleState};
