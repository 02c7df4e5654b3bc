use thiserror::Error;

/// Phases a trivia round can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No round is running.
    Idle,
    /// The round was announced and the first question is pending.
    Starting,
    /// A question is open and accepts answers.
    QuestionOpen,
    /// The current question was answered; the next one is pending.
    AnswerAccepted,
    /// The current question timed out or was skipped; the next one is pending.
    Skipped,
    /// Results are being announced before returning to idle.
    Ended,
}

impl RoundPhase {
    /// Whether a round is in progress.
    pub fn is_active(self) -> bool {
        !matches!(self, RoundPhase::Idle)
    }

    /// Whether the current question accepts answers.
    pub fn is_question_open(self) -> bool {
        matches!(self, RoundPhase::QuestionOpen)
    }

    /// Whether the current question has been closed and the index is waiting to advance.
    pub fn is_question_closed(self) -> bool {
        matches!(self, RoundPhase::AnswerAccepted | RoundPhase::Skipped)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// A fresh round was requested.
    Start,
    /// A round is restored from a backup snapshot.
    Resume,
    /// The next question is asked.
    AskQuestion,
    /// A participant answered the open question.
    AcceptAnswer,
    /// The open question is skipped.
    Skip,
    /// The quiz set is exhausted or the round was ended early.
    Finish,
    /// Results were announced; go back to idle.
    Reset,
    /// Administrative stop without results.
    Abort,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoundPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoundEvent,
}

/// State machine implementing the round flow
/// `Idle -> Starting -> QuestionOpen -> (AnswerAccepted | Skipped) -> QuestionOpen | Ended -> Idle`.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    phase: RoundPhase,
    version: usize,
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
            version: 0,
        }
    }
}

impl RoundStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Whether `event` would be accepted from the current phase.
    pub fn can_apply(&self, event: RoundEvent) -> bool {
        self.compute_transition(event).is_ok()
    }

    fn compute_transition(&self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        use RoundPhase::*;

        let next = match (self.phase, event) {
            (Idle, RoundEvent::Start | RoundEvent::Resume) => Starting,
            (Starting | AnswerAccepted | Skipped, RoundEvent::AskQuestion) => QuestionOpen,
            (QuestionOpen, RoundEvent::AcceptAnswer) => AnswerAccepted,
            (QuestionOpen, RoundEvent::Skip) => Skipped,
            (Starting | QuestionOpen | AnswerAccepted | Skipped, RoundEvent::Finish) => Ended,
            (Ended, RoundEvent::Reset) => Idle,
            (from, RoundEvent::Abort) if from != Idle => Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoundStateMachine, event: RoundEvent) -> RoundPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = RoundStateMachine::new();
        assert_eq!(sm.phase(), RoundPhase::Idle);
        assert!(!sm.phase().is_active());
    }

    #[test]
    fn full_happy_path_through_round() {
        let mut sm = RoundStateMachine::new();

        assert_eq!(apply(&mut sm, RoundEvent::Start), RoundPhase::Starting);
        assert_eq!(apply(&mut sm, RoundEvent::AskQuestion), RoundPhase::QuestionOpen);
        assert_eq!(
            apply(&mut sm, RoundEvent::AcceptAnswer),
            RoundPhase::AnswerAccepted
        );
        assert_eq!(apply(&mut sm, RoundEvent::AskQuestion), RoundPhase::QuestionOpen);
        assert_eq!(apply(&mut sm, RoundEvent::Skip), RoundPhase::Skipped);
        assert_eq!(apply(&mut sm, RoundEvent::Finish), RoundPhase::Ended);
        assert_eq!(apply(&mut sm, RoundEvent::Reset), RoundPhase::Idle);
        assert_eq!(sm.version(), 7);
    }

    #[test]
    fn answers_are_rejected_once_the_question_closed() {
        let mut sm = RoundStateMachine::new();
        apply(&mut sm, RoundEvent::Start);
        apply(&mut sm, RoundEvent::AskQuestion);
        apply(&mut sm, RoundEvent::AcceptAnswer);

        let err = sm.apply(RoundEvent::AcceptAnswer).unwrap_err();
        assert_eq!(err.from, RoundPhase::AnswerAccepted);
        assert_eq!(err.event, RoundEvent::AcceptAnswer);
        assert_eq!(sm.phase(), RoundPhase::AnswerAccepted);
    }

    #[test]
    fn start_is_only_valid_from_idle() {
        let mut sm = RoundStateMachine::new();
        apply(&mut sm, RoundEvent::Start);
        assert!(!sm.can_apply(RoundEvent::Start));
        assert!(!sm.can_apply(RoundEvent::Resume));
    }

    #[test]
    fn abort_returns_to_idle_from_any_active_phase() {
        let mut sm = RoundStateMachine::new();
        assert!(sm.apply(RoundEvent::Abort).is_err());

        apply(&mut sm, RoundEvent::Resume);
        apply(&mut sm, RoundEvent::AskQuestion);
        assert_eq!(apply(&mut sm, RoundEvent::Abort), RoundPhase::Idle);
    }
}
