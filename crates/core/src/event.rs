//! Notification payload for computation state changes.

use crate::computation::ComputationState;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A committed state transition, as delivered to live subscribers.
///
/// Events are published after the registry write commits and are never
/// backfilled: a subscriber only observes transitions that happen while
/// its connection is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub correlation_id: Uuid,
    pub state: ComputationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StateEvent {
    pub fn new(
        correlation_id: Uuid,
        state: ComputationState,
        error_message: Option<String>,
    ) -> Self {
        Self {
            correlation_id,
            state,
            error_message,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
