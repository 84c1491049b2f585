//! Hub configuration.

use serde::{Deserialize, Serialize};

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default size of each room's control channel.
pub const DEFAULT_COMMAND_CHANNEL_SIZE: usize = 64;

/// Settings shared by every room the hub creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// How many encoded messages may wait for one connection's writer.
    /// Once full, further messages for that connection are dropped.
    pub outbound_capacity: usize,

    /// How many join/leave/deliver events may queue for one room's
    /// control loop before senders wait.
    pub command_channel_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            command_channel_size: DEFAULT_COMMAND_CHANNEL_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.outbound_capacity, 256);
        assert_eq!(config.command_channel_size, 64);
    }

    #[test]
    fn test_hub_config_partial_override_from_json() {
        let config: HubConfig =
            serde_json::from_str(r#"{"outbound_capacity": 8}"#).unwrap();
        assert_eq!(config.outbound_capacity, 8);
        assert_eq!(config.command_channel_size, 64);
    }
}
