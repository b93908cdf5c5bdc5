//! The inter-worker mailbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recipient name that delivers a message to every worker.
pub const BROADCAST: &str = "all";

/// One mailbox message. Immutable once posted except for `read`, which
/// flips only when a recipient drains its mailbox with marking enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub from: String,
    pub to: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl AgentMessage {
    /// Whether `worker` should see this message (addressed directly or via
    /// [`BROADCAST`]).
    pub fn addressed_to(&self, worker: &str) -> bool {
        self.to == worker || self.to == BROADCAST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> AgentMessage {
        AgentMessage {
            from: "supervisor".to_string(),
            to: to.to_string(),
            message: "hello".to_string(),
            payload: None,
            timestamp: Utc::now(),
            read: false,
        }
    }

    #[test]
    fn test_direct_addressing() {
        assert!(message("intake").addressed_to("intake"));
        assert!(!message("intake").addressed_to("extraction"));
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        assert!(message(BROADCAST).addressed_to("intake"));
        assert!(message(BROADCAST).addressed_to("extraction"));
    }
}
