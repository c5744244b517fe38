// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for keeping the permission registry in sync with the document store.
use serde::{Deserialize, Serialize};

/// Default capacity of the group change feed channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration parameters of the permission service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of group change events buffered before slow listeners start missing events.
    pub event_capacity: usize,

    /// Rebuild the registry from the store after missed change events. When disabled missed
    /// changes are only picked up on the next restart.
    pub rebuild_on_lag: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            rebuild_on_lag: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_EVENT_CAPACITY};

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{ "rebuild_on_lag": false }"#).unwrap();
        assert_eq!(
            config,
            Config {
                event_capacity: DEFAULT_EVENT_CAPACITY,
                rebuild_on_lag: false,
            }
        );
    }
}
