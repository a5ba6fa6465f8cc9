//! Link State Machine
//!
//! Defines the session states, the retry budget and the valid transitions
//! between them. The machine is pure: it never performs I/O or sleeps, it
//! only tells the caller what to do next.

use std::fmt;
use std::time::Duration;

use crate::link;

/// Connection state of the vehicle session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No link and nothing scheduled
    Disconnected,
    /// First attempt after a caller request is in flight
    Connecting,
    /// Link is up; sends and the listen loop are permitted
    Connected,
    /// Automatic retry `attempt` is scheduled or in flight
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted; only an explicit connect leaves this state
    Failed,
}

impl SessionState {
    /// Whether commands may be written in this state
    pub fn is_send_permitted(self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Reconnecting { attempt } => write!(f, "reconnecting ({})", attempt),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Attempt counter plus the fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    attempt: u32,
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(link::MAX_RETRIES, Duration::from_millis(link::RETRY_DELAY_MS))
    }
}

impl RetryBudget {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_retries,
            delay,
        }
    }

    /// Retries used so far in this episode
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_retries
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consume one retry, returning its number, or `None` when exhausted
    fn next_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }
}

/// Events that drive the link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Caller asked for a connection
    ConnectRequested,
    /// A connect attempt produced a stream
    AttemptSucceeded,
    /// A connect attempt failed
    AttemptFailed,
    /// An established link failed on read or write
    ConnectionLost,
    /// Caller asked for teardown
    DisconnectRequested,
}

/// Result of feeding an event to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// State changed (or was re-entered) as requested
    Success(SessionState),
    /// Event has no meaning in the current state; nothing changed
    Ignored { from: SessionState, event: LinkEvent },
    /// Schedule retry `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Retry budget exhausted; the session is now Failed
    Exhausted,
}

/// The session state machine
#[derive(Debug)]
pub struct SessionStateMachine {
    current_state: SessionState,
    budget: RetryBudget,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new(RetryBudget::default())
    }
}

impl SessionStateMachine {
    /// Create a new machine in the Disconnected state
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            current_state: SessionState::Disconnected,
            budget,
        }
    }

    pub fn state(&self) -> SessionState {
        self.current_state
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent) -> TransitionResult {
        use SessionState::*;

        match (self.current_state, event) {
            // Teardown is valid from anywhere
            (_, LinkEvent::DisconnectRequested) => {
                self.budget.reset();
                self.current_state = Disconnected;
                TransitionResult::Success(Disconnected)
            }

            (Disconnected | Failed, LinkEvent::ConnectRequested) => {
                self.budget.reset();
                self.current_state = Connecting;
                TransitionResult::Success(Connecting)
            }

            (Connecting | Reconnecting { .. }, LinkEvent::AttemptSucceeded) => {
                self.budget.reset();
                self.current_state = Connected;
                TransitionResult::Success(Connected)
            }

            (Connecting | Reconnecting { .. }, LinkEvent::AttemptFailed)
            | (Connected, LinkEvent::ConnectionLost) => self.schedule_retry(),

            (from, event) => TransitionResult::Ignored { from, event },
        }
    }

    fn schedule_retry(&mut self) -> TransitionResult {
        match self.budget.next_attempt() {
            Some(attempt) => {
                self.current_state = SessionState::Reconnecting { attempt };
                TransitionResult::Retry {
                    attempt,
                    delay: self.budget.delay,
                }
            }
            None => {
                self.current_state = SessionState::Failed;
                TransitionResult::Exhausted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> SessionStateMachine {
        SessionStateMachine::new(RetryBudget::new(3, Duration::from_millis(2000)))
    }

    #[test]
    fn test_initial_state() {
        let fsm = fsm();
        assert_eq!(fsm.state(), SessionState::Disconnected);
        assert_eq!(fsm.budget().attempt(), 0);
    }

    #[test]
    fn test_connect_then_success() {
        let mut fsm = fsm();

        let result = fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(result, TransitionResult::Success(SessionState::Connecting));

        let result = fsm.process_event(LinkEvent::AttemptSucceeded);
        assert_eq!(result, TransitionResult::Success(SessionState::Connected));
        assert!(fsm.state().is_send_permitted());
    }

    #[test]
    fn test_failures_exhaust_budget() {
        let mut fsm = fsm();
        fsm.process_event(LinkEvent::ConnectRequested);

        for expected in 1..=3 {
            let result = fsm.process_event(LinkEvent::AttemptFailed);
            assert_eq!(
                result,
                TransitionResult::Retry {
                    attempt: expected,
                    delay: Duration::from_millis(2000),
                }
            );
            assert_eq!(fsm.state(), SessionState::Reconnecting { attempt: expected });
        }

        let result = fsm.process_event(LinkEvent::AttemptFailed);
        assert_eq!(result, TransitionResult::Exhausted);
        assert_eq!(fsm.state(), SessionState::Failed);

        // Failed never retries by itself
        let result = fsm.process_event(LinkEvent::AttemptFailed);
        assert!(matches!(result, TransitionResult::Ignored { .. }));
        assert_eq!(fsm.state(), SessionState::Failed);
    }

    #[test]
    fn test_failed_requires_explicit_connect() {
        let mut fsm = SessionStateMachine::new(RetryBudget::new(0, Duration::ZERO));
        fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(fsm.process_event(LinkEvent::AttemptFailed), TransitionResult::Exhausted);

        let result = fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(result, TransitionResult::Success(SessionState::Connecting));
    }

    #[test]
    fn test_success_resets_budget() {
        let mut fsm = fsm();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::AttemptFailed);
        fsm.process_event(LinkEvent::AttemptFailed);
        assert_eq!(fsm.budget().attempt(), 2);

        fsm.process_event(LinkEvent::AttemptSucceeded);
        assert_eq!(fsm.budget().attempt(), 0);

        // A later loss starts a fresh episode at attempt 1
        let result = fsm.process_event(LinkEvent::ConnectionLost);
        assert!(matches!(result, TransitionResult::Retry { attempt: 1, .. }));
    }

    #[test]
    fn test_connection_lost_only_once() {
        let mut fsm = fsm();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::AttemptSucceeded);

        let first = fsm.process_event(LinkEvent::ConnectionLost);
        assert!(matches!(first, TransitionResult::Retry { attempt: 1, .. }));

        // A second detector of the same failure is ignored
        let second = fsm.process_event(LinkEvent::ConnectionLost);
        assert!(matches!(second, TransitionResult::Ignored { .. }));
        assert_eq!(fsm.state(), SessionState::Reconnecting { attempt: 1 });
    }

    #[test]
    fn test_duplicate_connect_is_ignored() {
        let mut fsm = fsm();
        fsm.process_event(LinkEvent::ConnectRequested);

        let result = fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(
            result,
            TransitionResult::Ignored {
                from: SessionState::Connecting,
                event: LinkEvent::ConnectRequested,
            }
        );
    }

    #[test]
    fn test_disconnect_from_any_state() {
        let mut fsm = fsm();
        fsm.process_event(LinkEvent::ConnectRequested);
        fsm.process_event(LinkEvent::AttemptFailed);

        let result = fsm.process_event(LinkEvent::DisconnectRequested);
        assert_eq!(result, TransitionResult::Success(SessionState::Disconnected));
        assert_eq!(fsm.budget().attempt(), 0);

        // Stale attempt results after teardown change nothing
        let result = fsm.process_event(LinkEvent::AttemptSucceeded);
        assert!(matches!(result, TransitionResult::Ignored { .. }));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Reconnecting { attempt: 2 }.to_string(), "reconnecting (2)");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }
}
