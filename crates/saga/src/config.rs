//! Saga configuration.

use crate::order_fulfillment::DEFAULT_PICK_PRIORITY;

/// Tuning for the saga orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    /// Priority of the pick task created in phase 1 (1..=10).
    pub pick_priority: u8,

    /// Whether `send_notification` runs. When off, the step is skipped.
    pub send_notifications: bool,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            pick_priority: DEFAULT_PICK_PRIORITY,
            send_notifications: true,
        }
    }
}
