//! Workspace session actor and its public handle.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use rdlink_core::constants::{ADAPT_SAMPLE_THRESHOLD, AUTO_RELEASE_TICK};
use rdlink_core::control::{
    ControlActor, ControlArbitrator, ControlOwner, PendingControlRequest, RequestOutcome,
};
use rdlink_core::error::{Error, Result};
use rdlink_core::handshake::{perform_handshake, HandshakeOutcome};
use rdlink_core::input::{InputEvent, InputTranslator, ShortcutAction, Translation};
use rdlink_core::metrics::{ConnectionQuality, MetricsSnapshot, SessionMetrics};
use rdlink_core::protocol::{
    Message, SessionId, SetQualityPayload, ShutdownPayload, ShutdownReason,
};
use rdlink_core::quality::QualitySettings;
use rdlink_core::session::{BackoffPolicy, ConnectionState, SessionConfig};
use rdlink_core::transport::{Channel, Connector};

/// Command queue depth; callers briefly backpressure when the actor is busy.
const COMMAND_QUEUE_DEPTH: usize = 64;

// =============================================================================
// Commands
// =============================================================================

enum SessionCommand {
    Connect,
    Disconnect,
    RequestControl {
        actor: ControlActor,
        reason: Option<String>,
        reply: oneshot::Sender<Result<RequestOutcome>>,
    },
    GrantControl {
        auto_release_secs: Option<u32>,
        reply: oneshot::Sender<Result<ControlActor>>,
    },
    DenyControl {
        reply: oneshot::Sender<Result<PendingControlRequest>>,
    },
    ReleaseControl {
        actor: ControlActor,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAutoRelease {
        secs: u32,
        reply: oneshot::Sender<Result<()>>,
    },
    ImproveQuality {
        reply: oneshot::Sender<bool>,
    },
    ImprovePerformance {
        reply: oneshot::Sender<bool>,
    },
    DispatchInput {
        event: InputEvent,
        reply: oneshot::Sender<Result<Option<ShortcutAction>>>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle to a running session actor.
///
/// Mutations are posted to the actor's command queue; reads come from `watch`
/// channels, so holders never observe a half-applied transition.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    connection_state: watch::Receiver<ConnectionState>,
    control_owner: watch::Receiver<ControlOwner>,
    pending_request: watch::Receiver<Option<PendingControlRequest>>,
    metrics: watch::Receiver<MetricsSnapshot>,
    quality: watch::Receiver<QualitySettings>,
    workspace: watch::Receiver<Option<HandshakeOutcome>>,
}

impl SessionHandle {
    /// Begin connecting. Idempotent while a connection attempt or live
    /// connection exists; from any state it resets the reconnect budget.
    pub async fn connect(&self) -> Result<()> {
        self.post(SessionCommand::Connect).await
    }

    /// Disconnect and stop reconnecting. Clears control ownership, any
    /// pending request, and the auto-release timer.
    pub async fn disconnect(&self) -> Result<()> {
        self.post(SessionCommand::Disconnect).await
    }

    /// Request input control for an actor.
    pub async fn request_control(
        &self,
        actor: ControlActor,
        reason: Option<String>,
    ) -> Result<RequestOutcome> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::RequestControl {
            actor,
            reason,
            reply,
        })
        .await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Grant the pending control request, optionally arming auto-release.
    pub async fn grant_control(&self, auto_release_secs: Option<u32>) -> Result<ControlActor> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::GrantControl {
            auto_release_secs,
            reply,
        })
        .await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Deny the pending control request.
    pub async fn deny_control(&self) -> Result<PendingControlRequest> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::DenyControl { reply }).await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Release control; only the current owner may release.
    pub async fn release_control(&self, actor: ControlActor) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::ReleaseControl { actor, reply })
            .await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Arm (or with 0, disarm) the auto-release countdown on a human grant.
    pub async fn set_auto_release(&self, secs: u32) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::SetAutoRelease { secs, reply })
            .await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Step toward fidelity. Returns whether anything changed.
    pub async fn improve_quality(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::ImproveQuality { reply }).await?;
        rx.await.map_err(|_| session_gone())
    }

    /// Step toward performance. Returns whether anything changed.
    pub async fn improve_performance(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::ImprovePerformance { reply })
            .await?;
        rx.await.map_err(|_| session_gone())
    }

    /// Dispatch a frontend input event.
    ///
    /// Returns a shortcut action for the frontend when the event was consumed
    /// locally. Events are silently dropped unless the human owns control.
    pub async fn dispatch_input(&self, event: InputEvent) -> Result<Option<ShortcutAction>> {
        let (reply, rx) = oneshot::channel();
        self.post(SessionCommand::DispatchInput { event, reply })
            .await?;
        rx.await.map_err(|_| session_gone())?
    }

    /// Watch the connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.clone()
    }

    /// Watch the control owner.
    pub fn control_owner(&self) -> watch::Receiver<ControlOwner> {
        self.control_owner.clone()
    }

    /// Watch the pending control request.
    pub fn pending_request(&self) -> watch::Receiver<Option<PendingControlRequest>> {
        self.pending_request.clone()
    }

    /// Watch the connection metrics snapshot.
    pub fn metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        self.metrics.clone()
    }

    /// Watch the quality settings.
    pub fn quality(&self) -> watch::Receiver<QualitySettings> {
        self.quality.clone()
    }

    /// Watch the negotiated workspace description.
    pub fn workspace(&self) -> watch::Receiver<Option<HandshakeOutcome>> {
        self.workspace.clone()
    }

    /// Current connection state without subscribing.
    pub fn current_state(&self) -> ConnectionState {
        *self.connection_state.borrow()
    }

    /// Current control owner without subscribing.
    pub fn current_owner(&self) -> ControlOwner {
        *self.control_owner.borrow()
    }

    async fn post(&self, cmd: SessionCommand) -> Result<()> {
        self.commands.send(cmd).await.map_err(|_| session_gone())
    }
}

fn session_gone() -> Error {
    Error::InvalidState {
        expected: "running session".to_string(),
        actual: "session task stopped".to_string(),
    }
}

// =============================================================================
// Actor
// =============================================================================

type DialResult<C> = Result<(C, HandshakeOutcome)>;

/// Where the gateway link currently is.
enum LinkState<C: Channel> {
    /// No connection and none wanted.
    Idle,
    /// Backoff delay before the next dial.
    Waiting {
        sleep: std::pin::Pin<Box<tokio::time::Sleep>>,
    },
    /// Connect + handshake running in a spawned task so commands (notably
    /// disconnect) stay responsive.
    Dialing { task: JoinHandle<DialResult<C>> },
    /// Live connection.
    Up { channel: C },
}

enum LinkEvent<C: Channel> {
    DialTime,
    DialDone(DialResult<C>),
    Incoming(Result<Message>),
}

/// The session actor: one task owning all mutable session state.
pub struct WorkspaceSession<C: Connector> {
    config: SessionConfig,
    connector: Arc<C>,
    commands: mpsc::Receiver<SessionCommand>,

    state: ConnectionState,
    link: LinkState<C::Channel>,
    session_id: Option<SessionId>,
    ever_connected: bool,

    arbitrator: ControlArbitrator,
    translator: InputTranslator,
    quality: QualitySettings,
    metrics: SessionMetrics,
    backoff: BackoffPolicy,
    epoch: Instant,

    degraded_streak: u32,
    excellent_streak: u32,

    state_tx: watch::Sender<ConnectionState>,
    owner_tx: watch::Sender<ControlOwner>,
    pending_tx: watch::Sender<Option<PendingControlRequest>>,
    metrics_tx: watch::Sender<MetricsSnapshot>,
    quality_tx: watch::Sender<QualitySettings>,
    workspace_tx: watch::Sender<Option<HandshakeOutcome>>,
}

impl<C: Connector> WorkspaceSession<C> {
    /// Spawn the session actor and return its handle.
    ///
    /// The actor stops when the last handle is dropped.
    pub fn spawn(config: SessionConfig, connector: C) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let quality = config.quality;
        let metrics = SessionMetrics::new();

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (owner_tx, owner_rx) = watch::channel(ControlOwner::None);
        let (pending_tx, pending_rx) = watch::channel(None);
        let (metrics_tx, metrics_rx) = watch::channel(metrics.snapshot());
        let (quality_tx, quality_rx) = watch::channel(quality);
        let (workspace_tx, workspace_rx) = watch::channel(None);

        let actor = WorkspaceSession {
            config,
            connector: Arc::new(connector),
            commands: command_rx,
            state: ConnectionState::Disconnected,
            link: LinkState::Idle,
            session_id: None,
            ever_connected: false,
            arbitrator: ControlArbitrator::new(),
            translator: InputTranslator::new(),
            quality,
            metrics,
            backoff: BackoffPolicy::new(),
            epoch: Instant::now(),
            degraded_streak: 0,
            excellent_streak: 0,
            state_tx,
            owner_tx,
            pending_tx,
            metrics_tx,
            quality_tx,
            workspace_tx,
        };
        tokio::spawn(actor.run());

        SessionHandle {
            commands: command_tx,
            connection_state: state_rx,
            control_owner: owner_rx,
            pending_request: pending_rx,
            metrics: metrics_rx,
            quality: quality_rx,
            workspace: workspace_rx,
        }
    }

    async fn run(mut self) {
        let mut ping_timer = interval(self.config.ping_interval);
        let mut metrics_timer = interval(self.config.metrics_interval);
        let mut release_timer = interval(AUTO_RELEASE_TICK);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        metrics_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        release_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut release_was_armed = false;
        loop {
            let connected = self.state.is_connected();
            let sampling = self.state.is_active();
            let release_armed = self.arbitrator.auto_release_armed();
            if release_armed && !release_was_armed {
                // Discard any tick accrued while disarmed so the first
                // countdown tick lands a full period after arming.
                release_timer.reset();
            }
            release_was_armed = release_armed;

            tokio::select! {
                maybe_cmd = self.commands.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            // Last handle dropped; tear down and exit.
                            self.shutdown_link(ShutdownReason::UserRequested).await;
                            return;
                        }
                    }
                }
                event = Self::drive_link(&mut self.link) => {
                    self.handle_link_event(event).await;
                }
                _ = ping_timer.tick(), if connected => {
                    self.send_ping().await;
                }
                _ = metrics_timer.tick(), if sampling => {
                    self.metrics_tick().await;
                }
                _ = release_timer.tick(), if release_armed => {
                    if self.arbitrator.tick_auto_release() {
                        self.publish_control();
                    }
                }
            }
        }
    }

    /// Resolve the next link event; pends forever while idle so the select
    /// loop stays command-driven.
    async fn drive_link(link: &mut LinkState<C::Channel>) -> LinkEvent<C::Channel> {
        match link {
            LinkState::Idle => std::future::pending().await,
            LinkState::Waiting { sleep } => {
                sleep.as_mut().await;
                LinkEvent::DialTime
            }
            LinkState::Dialing { task } => {
                let result = match (&mut *task).await {
                    Ok(result) => result,
                    Err(join_err) => Err(Error::Transport {
                        message: format!("connection task failed: {join_err}"),
                    }),
                };
                LinkEvent::DialDone(result)
            }
            LinkState::Up { channel } => LinkEvent::Incoming(channel.recv().await),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect => {
                // Manual connect always restores the full retry budget.
                self.backoff.reset();
                match self.state {
                    ConnectionState::Connecting | ConnectionState::Connected => {}
                    ConnectionState::Disconnected
                    | ConnectionState::Reconnecting
                    | ConnectionState::Error => {
                        self.set_state(ConnectionState::Connecting);
                        self.start_dial();
                    }
                }
            }

            SessionCommand::Disconnect => {
                self.shutdown_link(ShutdownReason::UserRequested).await;
                self.arbitrator.system_release();
                self.translator.reset();
                self.publish_control();
                self.set_state(ConnectionState::Disconnected);
            }

            SessionCommand::RequestControl {
                actor,
                reason,
                reply,
            } => {
                let result = self.arbitrator.request_control(actor, reason);
                self.publish_control();
                let _ = reply.send(result);
            }

            SessionCommand::GrantControl {
                auto_release_secs,
                reply,
            } => {
                let result = self.arbitrator.grant_control(auto_release_secs);
                self.publish_control();
                let _ = reply.send(result);
            }

            SessionCommand::DenyControl { reply } => {
                let result = self.arbitrator.deny_control();
                self.publish_control();
                let _ = reply.send(result);
            }

            SessionCommand::ReleaseControl { actor, reply } => {
                let result = self.arbitrator.release_control(actor);
                self.publish_control();
                let _ = reply.send(result);
            }

            SessionCommand::SetAutoRelease { secs, reply } => {
                let _ = reply.send(self.arbitrator.set_auto_release(secs));
            }

            SessionCommand::ImproveQuality { reply } => {
                let changed = self.quality.improve_quality();
                let _ = reply.send(changed);
                if changed {
                    self.quality_changed().await;
                }
            }

            SessionCommand::ImprovePerformance { reply } => {
                let changed = self.quality.improve_performance();
                let _ = reply.send(changed);
                if changed {
                    self.quality_changed().await;
                }
            }

            SessionCommand::DispatchInput { event, reply } => {
                let result = self.dispatch_input(event).await;
                let _ = reply.send(result);
            }
        }
    }

    /// Translate and forward one input event, gated on ownership at dispatch
    /// time, never on a cached value.
    async fn dispatch_input(&mut self, event: InputEvent) -> Result<Option<ShortcutAction>> {
        if self.arbitrator.owner() != ControlOwner::Human {
            tracing::trace!(owner = %self.arbitrator.owner(), "input dropped, human does not own control");
            return Ok(None);
        }

        match self.translator.translate(event) {
            Ok(Translation::Local(action)) => Ok(Some(action)),
            Ok(Translation::Wire(messages)) => {
                if self.state.is_connected() {
                    for msg in &messages {
                        if let Err(e) = self.send_message(msg).await {
                            tracing::warn!(error = %e, "send failed, dropping input");
                            self.link_lost(e);
                            break;
                        }
                    }
                }
                Ok(None)
            }
            Err(e) => {
                // Per-event failure: the stream continues.
                tracing::warn!(error = %e, "input translation failed, event dropped");
                Ok(None)
            }
        }
    }

    async fn quality_changed(&mut self) {
        self.set_watch_quality();
        if self.state.is_connected() {
            let msg = Message::SetQuality(SetQualityPayload {
                quality_level: self.quality.quality_level(),
                compression_level: self.quality.compression_level(),
            });
            if let Err(e) = self.send_message(&msg).await {
                self.link_lost(e);
            }
        }
    }

    // =========================================================================
    // Link lifecycle
    // =========================================================================

    fn start_dial(&mut self) {
        if let LinkState::Dialing { task } = &self.link {
            task.abort();
        }
        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();
        let resume = self.session_id;

        let task = tokio::spawn(async move {
            let mut channel = connector.connect(&config.gateway_addr).await?;
            match perform_handshake(&mut channel, &config, resume).await {
                Ok(outcome) => Ok((channel, outcome)),
                Err(e) => {
                    channel.close();
                    Err(e)
                }
            }
        });
        self.link = LinkState::Dialing { task };
    }

    async fn handle_link_event(&mut self, event: LinkEvent<C::Channel>) {
        match event {
            LinkEvent::DialTime => {
                self.start_dial();
            }

            LinkEvent::DialDone(Ok((channel, outcome))) => {
                self.link = LinkState::Up { channel };
                self.session_id = Some(outcome.session_id);
                self.metrics.reset();
                if self.ever_connected {
                    self.metrics.record_reconnect();
                } else {
                    self.ever_connected = true;
                }
                self.backoff.reset();
                self.translator.reset();
                self.degraded_streak = 0;
                self.excellent_streak = 0;
                self.set_watch(&self.workspace_tx, Some(outcome));
                self.metrics_tx.send_replace(self.metrics.snapshot());
                self.set_state(ConnectionState::Connected);

                // Quality settings survive reconnects; re-assert them so the
                // gateway encoder starts from where the user left it.
                let msg = Message::SetQuality(SetQualityPayload {
                    quality_level: self.quality.quality_level(),
                    compression_level: self.quality.compression_level(),
                });
                if let Err(e) = self.send_message(&msg).await {
                    self.link_lost(e);
                }
            }

            LinkEvent::DialDone(Err(e)) => {
                if e.is_fatal() {
                    tracing::error!(error = %e, "connection failed fatally");
                    self.link = LinkState::Idle;
                    self.set_state(ConnectionState::Error);
                } else {
                    tracing::warn!(error = %e, "connection attempt failed");
                    self.schedule_retry();
                }
            }

            LinkEvent::Incoming(Ok(msg)) => self.handle_message(msg).await,

            LinkEvent::Incoming(Err(e)) => {
                tracing::warn!(error = %e, "gateway link lost");
                self.link_lost(e);
            }
        }
    }

    async fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::FrameUpdate(frame) => {
                self.metrics.record_frame(frame.payload.len());
            }
            Message::Pong { timestamp_ms } => {
                let now = self.now_ms();
                if now >= timestamp_ms {
                    self.metrics
                        .update_latency(std::time::Duration::from_millis(now - timestamp_ms));
                }
            }
            Message::Ping { timestamp_ms } => {
                if let Err(e) = self.send_message(&Message::Pong { timestamp_ms }).await {
                    self.link_lost(e);
                }
            }
            Message::Shutdown(payload) => {
                tracing::info!(reason = %payload.reason, "gateway closed the session");
                // Graceful close: the workspace is gone, do not reconnect.
                if let LinkState::Up { channel } = &mut self.link {
                    channel.close();
                }
                self.link = LinkState::Idle;
                self.session_id = None;
                self.arbitrator.system_release();
                self.translator.reset();
                self.publish_control();
                self.set_watch(&self.workspace_tx, None);
                self.set_state(ConnectionState::Disconnected);
            }
            other => {
                tracing::debug!(message = other.name(), "ignoring unexpected message");
            }
        }
    }

    /// Transition after an unexpected link failure: release control, reset
    /// input state, and enter the backoff schedule.
    fn link_lost(&mut self, _error: Error) {
        if let LinkState::Up { channel } = &mut self.link {
            channel.close();
        }
        self.arbitrator.system_release();
        self.translator.reset();
        self.publish_control();
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        match self.backoff.next_delay() {
            Some(delay) => {
                tracing::info!(
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.link = LinkState::Waiting {
                    sleep: Box::pin(tokio::time::sleep(delay)),
                };
                self.set_state(ConnectionState::Reconnecting);
            }
            None => {
                tracing::error!("reconnect attempts exhausted");
                self.link = LinkState::Idle;
                self.set_state(ConnectionState::Error);
            }
        }
    }

    /// Close whatever the link is doing, with a best-effort goodbye.
    async fn shutdown_link(&mut self, reason: ShutdownReason) {
        match &mut self.link {
            LinkState::Up { channel } => {
                let _ = channel
                    .send(&Message::Shutdown(ShutdownPayload {
                        reason,
                        message: None,
                    }))
                    .await;
                channel.close();
            }
            LinkState::Dialing { task } => task.abort(),
            LinkState::Waiting { .. } | LinkState::Idle => {}
        }
        self.link = LinkState::Idle;
    }

    // =========================================================================
    // Timers
    // =========================================================================

    async fn send_ping(&mut self) {
        let msg = Message::Ping {
            timestamp_ms: self.now_ms(),
        };
        if let Err(e) = self.send_message(&msg).await {
            self.link_lost(e);
        }
    }

    async fn metrics_tick(&mut self) {
        self.metrics_tx.send_replace(self.metrics.snapshot());

        if self.config.auto_adapt && self.state.is_connected() {
            self.adapt_quality().await;
        }
    }

    /// Adaptive policy: one bounded step after a sustained run of degraded
    /// or excellent samples.
    async fn adapt_quality(&mut self) {
        match self.metrics.quality() {
            quality if quality.is_degraded() => {
                self.degraded_streak += 1;
                self.excellent_streak = 0;
            }
            ConnectionQuality::Excellent => {
                self.excellent_streak += 1;
                self.degraded_streak = 0;
            }
            _ => {
                self.degraded_streak = 0;
                self.excellent_streak = 0;
            }
        }

        if self.degraded_streak >= ADAPT_SAMPLE_THRESHOLD {
            self.degraded_streak = 0;
            if self.quality.improve_performance() {
                tracing::info!(
                    quality_level = self.quality.quality_level(),
                    "degraded link, stepping toward performance"
                );
                self.quality_changed().await;
            }
        } else if self.excellent_streak >= ADAPT_SAMPLE_THRESHOLD {
            self.excellent_streak = 0;
            if self.quality.improve_quality() {
                tracing::info!(
                    quality_level = self.quality.quality_level(),
                    "excellent link, stepping toward fidelity"
                );
                self.quality_changed().await;
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn send_message(&mut self, msg: &Message) -> Result<()> {
        match &mut self.link {
            LinkState::Up { channel } => {
                channel.send(msg).await?;
                self.metrics.record_send();
                Ok(())
            }
            _ => Err(Error::ConnectionClosed),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "connection state change");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn publish_control(&self) {
        let owner = self.arbitrator.owner();
        if *self.owner_tx.borrow() != owner {
            self.owner_tx.send_replace(owner);
        }
        let pending = self.arbitrator.pending_request().cloned();
        if *self.pending_tx.borrow() != pending {
            self.pending_tx.send_replace(pending);
        }
    }

    fn set_watch_quality(&self) {
        if *self.quality_tx.borrow() != self.quality {
            self.quality_tx.send_replace(self.quality);
        }
    }

    fn set_watch<T: PartialEq>(&self, tx: &watch::Sender<T>, value: T) {
        if *tx.borrow() != value {
            tx.send_replace(value);
        }
    }
}
