//! Base system module state
//!
//! Every host module walks `Disconnected -> Pending -> Running` on init and
//! returns to `Disconnected` on shutdown.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Disconnected,
    Pending,
    Running,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Identity and state shared by all host modules
#[derive(Debug, Clone, Default)]
pub struct ModuleBase {
    serial: u32,
    name: String,
    state: ModuleState,
}

impl ModuleBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base initialization. Returns false if the module is not disconnected.
    pub fn init(&mut self, serial: u32, name: &str) -> bool {
        if self.state != ModuleState::Disconnected {
            return false;
        }
        self.serial = serial;
        self.name = name.to_string();
        self.state = ModuleState::Pending;
        true
    }

    /// Undo a base initialization whose module-specific part failed
    pub fn abort_init(&mut self) {
        if self.state == ModuleState::Pending {
            self.state = ModuleState::Disconnected;
        }
    }

    pub fn set_running(&mut self) {
        self.state = ModuleState::Running;
    }

    pub fn shutdown(&mut self) {
        self.state = ModuleState::Disconnected;
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
