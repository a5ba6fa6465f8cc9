//! Session manager with bounded automatic reconnection

use super::event::{SessionEvent, SessionEvents};
use super::{listener, writer};
use crate::transport::TransportConnector;
use carlink_shared::{
    link, InboundMessage, Intent, LinkEvent, RetryBudget, SessionError, SessionState,
    SessionStateMachine, TransitionResult, TransportError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for the session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Vehicle address, interpreted by the connector
    pub address: String,
    /// Automatic retries after a failure before giving up
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: link::DEFAULT_DEVICE_ADDRESS.into(),
            max_retries: link::MAX_RETRIES,
            retry_delay: Duration::from_millis(link::RETRY_DELAY_MS),
        }
    }
}

/// Outbound side of the current link
struct Outbound {
    /// Queue drained by the link's writer task
    commands: mpsc::UnboundedSender<Intent>,
    /// Accepted commands not yet confirmed written, oldest first
    unsent: VecDeque<Intent>,
    close: oneshot::Sender<()>,
}

impl Outbound {
    /// Stop the writer task, returning the commands it never wrote
    fn close(self) -> VecDeque<Intent> {
        let _ = self.close.send(());
        self.unsent
    }
}

/// Everything guarded by the state-transition lock
struct Link {
    fsm: SessionStateMachine,
    /// Bumped for every new link and every teardown; tasks started for an
    /// older epoch have their results discarded
    epoch: u64,
    outbound: Option<Outbound>,
    listener: Option<JoinHandle<()>>,
    /// Connect attempt or retry delay in progress
    pending: Option<JoinHandle<()>>,
}

impl Link {
    fn cancel_tasks(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        if let Some(task) = self.listener.take() {
            task.abort();
        }
    }
}

/// State shared between the manager and its tasks
pub(super) struct Shared<C: TransportConnector> {
    connector: C,
    config: SessionConfig,
    runtime: Handle,
    events: mpsc::UnboundedSender<SessionEvent>,
    link: Mutex<Link>,
}

/// Owns the vehicle link and its lifecycle
///
/// All operations return immediately; I/O runs on the Tokio runtime the
/// manager was created on and results arrive as [`SessionEvent`]s.
pub struct SessionManager<C: TransportConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: TransportConnector> SessionManager<C> {
    /// Create a new session manager
    ///
    /// Must be called from within a Tokio runtime. The returned receiver is
    /// the event sink; the manager never waits on it.
    pub fn new(connector: C, config: SessionConfig) -> (Self, SessionEvents) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let budget = RetryBudget::new(config.max_retries, config.retry_delay);

        let shared = Arc::new(Shared {
            connector,
            config,
            runtime: Handle::current(),
            events: event_tx,
            link: Mutex::new(Link {
                fsm: SessionStateMachine::new(budget),
                epoch: 0,
                outbound: None,
                listener: None,
                pending: None,
            }),
        });

        (Self { shared }, event_rx)
    }

    /// Start connecting, unless a connection is already active
    ///
    /// Returns the state after the call: `Connecting` when an attempt was
    /// started, otherwise the unchanged current state.
    pub fn connect(&self) -> SessionState {
        self.shared.connect()
    }

    /// Queue one command for the vehicle
    ///
    /// Fails with [`SessionError::NotConnected`] (and a matching event) when
    /// the link is not up. Commands are written in the order they were
    /// accepted; a command that is accepted but never written is reported
    /// with a `SendError` event.
    pub fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.shared.send(intent)
    }

    /// Tear the session down; safe from any state
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    pub fn state(&self) -> SessionState {
        self.shared.link().fsm.state()
    }

    pub fn address(&self) -> &str {
        &self.shared.config.address
    }

    pub fn transport_name(&self) -> &'static str {
        self.shared.connector.name()
    }
}

impl<C: TransportConnector> Drop for SessionManager<C> {
    fn drop(&mut self) {
        self.shared.disconnect();
    }
}

impl<C: TransportConnector> Shared<C> {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.events.send(event);
    }

    fn connect(self: &Arc<Self>) -> SessionState {
        let mut link = self.link();

        match link.fsm.process_event(LinkEvent::ConnectRequested) {
            TransitionResult::Success(state) => {
                link.cancel_tasks();
                link.epoch += 1;
                info!(
                    "[LINK] Connecting to {} via {}",
                    self.config.address,
                    self.connector.name()
                );
                let task = run_attempts(self.clone(), link.epoch, None);
                link.pending = Some(self.runtime.spawn(task));
                state
            }
            _ => {
                let state = link.fsm.state();
                debug!("[LINK] Connect ignored, session is {}", state);
                state
            }
        }
    }

    fn send(&self, intent: Intent) -> Result<(), SessionError> {
        let mut link = self.link();
        let state = link.fsm.state();

        if state.is_send_permitted() {
            if let Some(outbound) = link.outbound.as_mut() {
                if outbound.commands.send(intent).is_ok() {
                    outbound.unsent.push_back(intent);
                    return Ok(());
                }
            }
        }

        debug!("[LINK] Dropping {} while {}", intent, state);
        self.emit(SessionEvent::NotConnected { intent });
        Err(SessionError::NotConnected)
    }

    fn disconnect(&self) {
        let mut link = self.link();
        let previous = link.fsm.state();

        link.fsm.process_event(LinkEvent::DisconnectRequested);
        link.epoch += 1;
        link.cancel_tasks();
        if let Some(outbound) = link.outbound.take() {
            let dropped = outbound.close();
            if !dropped.is_empty() {
                debug!("[LINK] Discarding {} unsent command(s)", dropped.len());
            }
        }

        if previous != SessionState::Disconnected {
            info!("[LINK] Disconnected from {} (was {})", self.config.address, previous);
            self.emit(SessionEvent::Disconnected);
        }
    }

    /// Handle the outcome of one connect attempt
    ///
    /// Returns the delay before the next attempt, or `None` when the attempt
    /// task is done.
    fn finish_attempt(
        self: &Arc<Self>,
        epoch: u64,
        result: Result<C::Stream, TransportError>,
    ) -> Option<Duration> {
        let mut link = self.link();
        if link.epoch != epoch {
            debug!("[LINK] Discarding result of a cancelled attempt");
            return None;
        }

        match result {
            Ok(stream) => {
                if !matches!(
                    link.fsm.process_event(LinkEvent::AttemptSucceeded),
                    TransitionResult::Success(_)
                ) {
                    return None;
                }

                let (reader, write_half) = tokio::io::split(stream);
                let (commands, queued) = mpsc::unbounded_channel();
                let (close, closed) = oneshot::channel();
                self.runtime.spawn(writer::run(
                    self.clone(),
                    epoch,
                    write_half,
                    queued,
                    closed,
                ));
                link.outbound = Some(Outbound {
                    commands,
                    unsent: VecDeque::new(),
                    close,
                });
                link.listener = Some(
                    self.runtime
                        .spawn(listener::run(self.clone(), epoch, reader)),
                );
                link.pending = None;

                info!("[LINK] Connected to {}", self.config.address);
                self.emit(SessionEvent::Connected);
                None
            }
            Err(e) => {
                warn!("[LINK] Connection attempt failed: {}", e);
                match link.fsm.process_event(LinkEvent::AttemptFailed) {
                    TransitionResult::Retry { attempt, delay } => {
                        info!(
                            "[LINK] Retrying in {:?} (attempt {}/{})",
                            delay,
                            attempt,
                            link.fsm.budget().max_retries()
                        );
                        self.emit(SessionEvent::ReconnectAttempt(attempt));
                        Some(delay)
                    }
                    TransitionResult::Exhausted => {
                        link.pending = None;
                        error!("[LINK] Giving up on {}", self.config.address);
                        self.emit(SessionEvent::ConnectionFailed);
                        None
                    }
                    _ => None,
                }
            }
        }
    }

    /// Deliver inbound text if it belongs to the current link
    pub(super) fn deliver(&self, epoch: u64, message: InboundMessage) {
        let link = self.link();
        if link.epoch == epoch {
            self.emit(SessionEvent::MessageReceived(message.into_text()));
        }
    }

    /// Report a read-side failure of the link started at `epoch`
    pub(super) fn connection_lost(self: &Arc<Self>, epoch: u64, reason: String) {
        let mut link = self.link();
        if link.epoch != epoch || !link.fsm.state().is_send_permitted() {
            debug!("[LINK] Ignoring stale loss report: {}", reason);
            return;
        }

        self.begin_recovery(&mut link, reason);
    }

    /// The oldest queued command of the link started at `epoch` is on the wire
    pub(super) fn command_written(&self, epoch: u64) {
        let mut link = self.link();
        if link.epoch == epoch {
            if let Some(outbound) = link.outbound.as_mut() {
                outbound.unsent.pop_front();
            }
        }
    }

    /// Report a failed write of the oldest queued command
    pub(super) fn write_failed(
        self: &Arc<Self>,
        epoch: u64,
        intent: Intent,
        err: std::io::Error,
    ) {
        let mut link = self.link();
        if link.epoch != epoch || !link.fsm.state().is_send_permitted() {
            // Accounted for when the link was torn down
            debug!("[LINK] Write of {} failed on a stale link: {}", intent, err);
            return;
        }

        if let Some(outbound) = link.outbound.as_mut() {
            outbound.unsent.pop_front();
        }
        warn!("[LINK] Failed to send {}: {}", intent, err);
        self.emit(SessionEvent::SendError {
            intent,
            reason: err.to_string(),
        });

        self.begin_recovery(&mut link, format!("write failed: {}", err));
    }

    /// Leave Connected and schedule the first retry
    ///
    /// Caller holds the lock and has checked the link is current, so this
    /// runs at most once per link. Commands still queued on the link are
    /// reported as send errors before the loss itself.
    fn begin_recovery(self: &Arc<Self>, link: &mut Link, reason: String) {
        let result = link.fsm.process_event(LinkEvent::ConnectionLost);
        link.epoch += 1;
        link.cancel_tasks();

        if let Some(outbound) = link.outbound.take() {
            for intent in outbound.close() {
                warn!("[LINK] {} was not sent", intent);
                self.emit(SessionEvent::SendError {
                    intent,
                    reason: format!("not sent: {}", reason),
                });
            }
        }

        warn!("[LINK] Connection lost: {}", reason);
        self.emit(SessionEvent::ConnectionLost { reason });

        match result {
            TransitionResult::Retry { attempt, delay } => {
                info!("[LINK] Reconnecting in {:?} (attempt {})", delay, attempt);
                self.emit(SessionEvent::ReconnectAttempt(attempt));
                let task = run_attempts(self.clone(), link.epoch, Some(delay));
                link.pending = Some(self.runtime.spawn(task));
            }
            TransitionResult::Exhausted => {
                error!("[LINK] Reconnection disabled, giving up");
                self.emit(SessionEvent::ConnectionFailed);
            }
            _ => {}
        }
    }
}

/// Connect attempts for one episode, sleeping between retries
async fn run_attempts<C: TransportConnector>(
    shared: Arc<Shared<C>>,
    epoch: u64,
    mut delay: Option<Duration>,
) {
    loop {
        if let Some(delay) = delay.take() {
            tokio::time::sleep(delay).await;
        }

        let result = shared.connector.connect(&shared.config.address).await;
        match shared.finish_attempt(epoch, result) {
            Some(next) => delay = Some(next),
            None => return,
        }
    }
}
