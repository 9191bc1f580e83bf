//! Per-session generation state, exposed for status polling.
//!
//! ```text
//! pending ─► generating ─► merging ─► converting ─► complete
//!    │           │            │            │
//!    └───────────┴────────────┴────────────┴──► error ─► merging | converting | complete
//! ```
//!
//! `error` is reachable from every state. It is not terminal: when partial
//! results exist the pipeline moves on to assemble them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Generating,
    Merging,
    Converting,
    Complete,
    Error,
}

impl GenerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Merging => "merging",
            Self::Converting => "converting",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        if self == next || next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Merging)
                | (Merging, Converting)
                | (Converting, Complete)
                | (Error, Merging)
                | (Error, Converting)
                | (Error, Complete)
        )
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the session error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub at: DateTime<Utc>,
    /// Pipeline stage or section id the error belongs to.
    pub scope: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub session_id: String,
    pub status: GenerationStatus,
    pub sections_completed: usize,
    pub total_sections: usize,
    /// Token size of the current rolling context.
    pub cumulative_context: usize,
    /// Tokens charged to the session budget so far.
    pub token_usage: u64,
    #[serde(default)]
    pub error_log: Vec<ErrorEntry>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationState {
    pub fn new(session_id: impl Into<String>, total_sections: usize) -> Self {
        Self {
            session_id: session_id.into(),
            status: GenerationStatus::Pending,
            sections_completed: 0,
            total_sections,
            cumulative_context: 0,
            token_usage: 0,
            error_log: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: GenerationStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::validation(format!(
                "illegal status transition {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Set the section count once the outline is known. Never lowers it
    /// below the sections already completed.
    pub fn set_total_sections(&mut self, total: usize) {
        self.total_sections = total.max(self.sections_completed);
        self.touch();
    }

    /// Record one more finished section. Saturates at `total_sections`.
    pub fn advance(&mut self) {
        if self.sections_completed < self.total_sections {
            self.sections_completed += 1;
        }
        self.touch();
    }

    pub fn record_error(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.error_log.push(ErrorEntry {
            at: Utc::now(),
            scope: scope.into(),
            message: message.into(),
        });
        self.touch();
    }

    /// Completion ratio, 0.0–100.0.
    pub fn percent_complete(&self) -> f32 {
        if self.total_sections == 0 {
            return 0.0;
        }
        (self.sections_completed as f32 / self.total_sections as f32) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.status == GenerationStatus::Complete
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut state = GenerationState::new("s1", 3);
        for next in [
            GenerationStatus::Generating,
            GenerationStatus::Merging,
            GenerationStatus::Converting,
            GenerationStatus::Complete,
        ] {
            state.transition(next).unwrap();
        }
        assert!(state.is_complete());
    }

    #[test]
    fn skipping_stages_is_rejected() {
        let mut state = GenerationState::new("s1", 3);
        assert!(state.transition(GenerationStatus::Complete).is_err());
        assert_eq!(state.status, GenerationStatus::Pending);
    }

    #[test]
    fn error_is_recoverable_into_assembly() {
        let mut state = GenerationState::new("s1", 3);
        state.transition(GenerationStatus::Generating).unwrap();
        state.transition(GenerationStatus::Error).unwrap();
        state.transition(GenerationStatus::Merging).unwrap();
        assert_eq!(state.status, GenerationStatus::Merging);
        assert!(state.transition(GenerationStatus::Generating).is_err());
    }

    #[test]
    fn advance_never_exceeds_total() {
        let mut state = GenerationState::new("s1", 2);
        for _ in 0..5 {
            state.advance();
        }
        assert_eq!(state.sections_completed, 2);
        assert!((state.percent_complete() - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn total_never_drops_below_completed() {
        let mut state = GenerationState::new("s1", 4);
        state.advance();
        state.advance();
        state.set_total_sections(1);
        assert_eq!(state.total_sections, 2);
    }

    #[test]
    fn empty_outline_reports_zero_percent() {
        let state = GenerationState::new("s1", 0);
        assert_eq!(state.percent_complete(), 0.0);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&GenerationStatus::Converting).unwrap();
        assert_eq!(json, "\"converting\"");
    }
}
