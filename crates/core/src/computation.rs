//! Computation lifecycle state machine and cache classification.

use serde::{Deserialize, Serialize};

/// State of a computation tracked by the correlation registry.
///
/// The only legal transitions are `Queued -> Running` and
/// `Running -> {Succeeded, Failed, Cancelled}`, plus `Queued -> Cancelled`
/// for work revoked before a worker picked it up. Terminal states admit
/// no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ComputationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a state string as stored in the registry.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Validate a transition against the state machine.
    pub fn can_transition_to(&self, next: ComputationState) -> bool {
        match (self, next) {
            (Self::Queued, Self::Running) => true,
            (Self::Queued, Self::Cancelled) => true,
            (Self::Running, Self::Succeeded) => true,
            (Self::Running, Self::Failed) => true,
            (Self::Running, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ComputationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache classification of a computation record.
///
/// Governs whether a terminal `succeeded` record may be reused to answer
/// an identical later submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheClass {
    /// Reusable until the configured retention window elapses.
    Normal,
    /// Demo computations are precomputed previews; they never expire.
    Demo,
    /// Created while caching was disabled; never reused.
    Disabled,
}

impl CacheClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Demo => "demo",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "demo" => Some(Self::Demo),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_admit_no_transitions() {
        for terminal in [
            ComputationState::Succeeded,
            ComputationState::Failed,
            ComputationState::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                ComputationState::Queued,
                ComputationState::Running,
                ComputationState::Succeeded,
                ComputationState::Failed,
                ComputationState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn queued_to_running_to_terminal() {
        assert!(ComputationState::Queued.can_transition_to(ComputationState::Running));
        assert!(ComputationState::Queued.can_transition_to(ComputationState::Cancelled));
        assert!(!ComputationState::Queued.can_transition_to(ComputationState::Succeeded));
        assert!(!ComputationState::Queued.can_transition_to(ComputationState::Failed));
        assert!(ComputationState::Running.can_transition_to(ComputationState::Succeeded));
        assert!(ComputationState::Running.can_transition_to(ComputationState::Failed));
        assert!(ComputationState::Running.can_transition_to(ComputationState::Cancelled));
        assert!(!ComputationState::Running.can_transition_to(ComputationState::Queued));
    }

    #[test]
    fn state_string_roundtrip() {
        for state in [
            ComputationState::Queued,
            ComputationState::Running,
            ComputationState::Succeeded,
            ComputationState::Failed,
            ComputationState::Cancelled,
        ] {
            assert_eq!(ComputationState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ComputationState::parse("pending"), None);
    }

    #[test]
    fn cache_class_string_roundtrip() {
        for class in [CacheClass::Normal, CacheClass::Demo, CacheClass::Disabled] {
            assert_eq!(CacheClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(CacheClass::parse(""), None);
    }
}
