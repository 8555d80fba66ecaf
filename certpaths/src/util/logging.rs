//! Logging support

use log::Level;

/// Level at which path building and validation diagnostics are emitted
#[derive(Debug, Eq, PartialEq)]
pub enum PeLogLevels {
    /// Failures that end processing of a path
    PeError,
    /// Path set milestones
    PeInfo,
    /// Conditions that do not fail a path
    PeWarn,
    /// Per-certificate detail
    PeDebug,
}

impl From<&PeLogLevels> for Level {
    fn from(level: &PeLogLevels) -> Self {
        match level {
            PeLogLevels::PeError => Level::Error,
            PeLogLevels::PeWarn => Level::Warn,
            PeLogLevels::PeInfo => Level::Info,
            PeLogLevels::PeDebug => Level::Debug,
        }
    }
}

/// `log_message` emits a message via the `log` facade at the indicated level. No logger is
/// installed by this crate.
pub fn log_message(level: &PeLogLevels, message: &str) {
    log::log!(Level::from(level), "{}", message);
}
