use crate::domain::ports::PipelineObserver;
use crate::utils::error::{Result, ScaffoldError};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Resolving,
    Rendering,
    Packaging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "Received",
            Stage::Validating => "Validating",
            Stage::Resolving => "Resolving",
            Stage::Rendering => "Rendering",
            Stage::Packaging => "Packaging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Active(Stage),
    Complete,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Active(stage) => write!(f, "{}", stage),
            PipelineState::Complete => f.write_str("Complete"),
            PipelineState::Failed { stage, reason } => write!(f, "Failed({}, {})", stage, reason),
        }
    }
}

/// Drives `Received -> Validating -> Resolving -> Rendering -> Packaging -> Complete`.
///
/// `Failed` is absorbing: once entered, every further transition is refused.
pub struct PipelineTracker<'a> {
    state: PipelineState,
    history: Vec<PipelineState>,
    observer: Option<&'a dyn PipelineObserver>,
}

impl<'a> PipelineTracker<'a> {
    pub fn new() -> Self {
        let state = PipelineState::Active(Stage::Received);
        Self {
            history: vec![state.clone()],
            state,
            observer: None,
        }
    }

    pub fn with_observer(observer: &'a dyn PipelineObserver) -> Self {
        let tracker = Self {
            observer: Some(observer),
            ..Self::new()
        };
        observer.on_transition(&tracker.state);
        tracker
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Stage currently running, if any.
    pub fn current_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Active(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn advance(&mut self, next: Stage) -> Result<()> {
        let current = self.current_stage().ok_or_else(|| {
            ScaffoldError::internal(format!("cannot enter {} from {}", next, self.state))
        })?;
        if successor(current) != Some(next) {
            return Err(ScaffoldError::internal(format!(
                "invalid pipeline transition {} -> {}",
                current, next
            )));
        }
        self.transition(PipelineState::Active(next));
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Active(Stage::Packaging) => {
                self.transition(PipelineState::Complete);
                Ok(())
            }
            _ => Err(ScaffoldError::internal(format!(
                "cannot complete from {}",
                self.state
            ))),
        }
    }

    /// Moves to `Failed` unless already terminal. Returns the error unchanged
    /// so callers can write `Err(tracker.fail(err))`.
    pub fn fail(&mut self, error: ScaffoldError) -> ScaffoldError {
        if let Some(stage) = self.current_stage() {
            self.transition(PipelineState::Failed {
                stage,
                reason: error.to_string(),
            });
        }
        error
    }

    fn transition(&mut self, next: PipelineState) {
        match &next {
            PipelineState::Failed { stage, reason } => {
                tracing::warn!("Pipeline failed during {}: {}", stage, reason)
            }
            other => tracing::debug!("Pipeline -> {}", other),
        }
        if let Some(observer) = self.observer {
            observer.on_transition(&next);
        }
        self.history.push(next.clone());
        self.state = next;
    }
}

impl Default for PipelineTracker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn successor(stage: Stage) -> Option<Stage> {
    match stage {
        Stage::Received => Some(Stage::Validating),
        Stage::Validating => Some(Stage::Resolving),
        Stage::Resolving => Some(Stage::Rendering),
        Stage::Rendering => Some(Stage::Packaging),
        Stage::Packaging => None,
    }
}

/// Wall-clock budget for one generation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Option<Duration>,
    started: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            budget: Some(budget),
            started: Instant::now(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            budget: None,
            started: Instant::now(),
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub fn is_expired(&self) -> bool {
        self.budget
            .map(|budget| self.started.elapsed() >= budget)
            .unwrap_or(false)
    }

    pub fn check(&self, stage: Stage) -> Result<()> {
        match self.budget {
            Some(budget) if self.started.elapsed() >= budget => {
                Err(ScaffoldError::GenerationTimeout {
                    stage: stage.to_string(),
                    deadline: budget,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<String>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_transition(&self, state: &PipelineState) {
            self.seen.lock().unwrap().push(state.to_string());
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let observer = RecordingObserver::default();
        let mut tracker = PipelineTracker::with_observer(&observer);
        for stage in [Stage::Validating, Stage::Resolving, Stage::Rendering, Stage::Packaging] {
            tracker.advance(stage).unwrap();
        }
        tracker.complete().unwrap();

        assert_eq!(tracker.state(), &PipelineState::Complete);
        assert_eq!(tracker.history().len(), 6);
        assert_eq!(
            *observer.seen.lock().unwrap(),
            vec!["Received", "Validating", "Resolving", "Rendering", "Packaging", "Complete"]
        );
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut tracker = PipelineTracker::new();
        tracker.advance(Stage::Validating).unwrap();
        assert!(tracker.advance(Stage::Rendering).is_err());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut tracker = PipelineTracker::new();
        tracker.advance(Stage::Validating).unwrap();
        let _ = tracker.fail(ScaffoldError::validation(vec![]));

        assert!(matches!(
            tracker.state(),
            PipelineState::Failed {
                stage: Stage::Validating,
                ..
            }
        ));
        assert!(tracker.advance(Stage::Resolving).is_err());
        assert!(tracker.complete().is_err());

        // A second failure does not overwrite the first.
        let _ = tracker.fail(ScaffoldError::internal("later"));
        assert_eq!(tracker.history().len(), 3);
    }

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::after(Duration::ZERO);
        let err = deadline.check(Stage::Rendering).unwrap_err();
        assert!(matches!(err, ScaffoldError::GenerationTimeout { .. }));

        assert!(Deadline::unbounded().check(Stage::Rendering).is_ok());
        assert!(Deadline::after(Duration::from_secs(60)).check(Stage::Packaging).is_ok());
    }
}
