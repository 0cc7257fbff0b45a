//! Broadcaster Configuration
//!
//! Controls how a notification round dispatches to its snapshot of
//! subscribers. Loaded from the `[broadcaster]` section of the config file by
//! [`ConfigManager::get_broadcaster_config`](crate::config::ConfigManager::get_broadcaster_config).

use serde::{Deserialize, Serialize};

/// How `notify` walks the subscriber snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One subscriber at a time, in registration order
    #[default]
    Sequential,
    /// All subscribers on the rayon pool; `notify` waits for every one of them
    Parallel,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(DispatchMode::Sequential),
            "parallel" => Ok(DispatchMode::Parallel),
            _ => Err(format!("Invalid dispatch mode: {}. Valid options: sequential, parallel", s)),
        }
    }
}

/// Broadcaster behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    pub dispatch: DispatchMode,

    /// Catch subscriber panics and report them instead of unwinding out of `notify`
    pub isolate_panics: bool,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Sequential,
            isolate_panics: true,
        }
    }
}

impl BroadcasterConfig {
    pub fn parallel() -> Self {
        Self {
            dispatch: DispatchMode::Parallel,
            ..Self::default()
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_isolate_panics(mut self, isolate_panics: bool) -> Self {
        self.isolate_panics = isolate_panics;
        self
    }
}
