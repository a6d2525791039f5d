//! Run Orchestration
//!
//! This module drives the "run a skill and wait for it to finish" workflow on
//! top of an event stream. A session:
//!
//! 1. subscribes to its watched event types,
//! 2. optionally issues a start request (the skill-start HTTP call),
//! 3. forwards every envelope to a caller-supplied sink, including frames
//!    whose payload matches no known shape (logged, then skipped),
//! 4. stops as soon as the terminal predicate matches, the stream ends or
//!    fails, or the caller's cancellation future resolves,
//! 5. unsubscribes from the watched types on every one of those exit paths.
//!
//! The event stream is abstracted behind `EventSource` and opened through a
//! `Connector`, so the orchestration can be exercised without a robot.

use crate::{api::RobotApi, error::SessionError, skills::find_skill_id};
use async_trait::async_trait;
use misty_realtime::{Connection, RealtimeError};
use misty_types::{ClassificationError, EventEnvelope, EventType};
use serde_json::Value;
use std::future::Future;
use tracing::{error, info, instrument, warn};

/// Event types watched while a skill runs.
pub const SKILL_WATCH: [EventType; 2] = [EventType::SkillData, EventType::SkillSystemStateChange];

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The terminal event was observed.
    Stopped,
    /// The stream closed before any terminal event. For a skill run this is
    /// an incomplete result, not a confirmed stop.
    StreamClosed,
    /// The caller's cancellation future resolved first.
    Cancelled,
}

/// Something the session hands to its sink.
#[derive(Debug)]
pub enum SessionEvent<'a> {
    /// Response body of the start request.
    Started(&'a Value),
    Event(&'a EventEnvelope),
    /// A frame that could not be classified. The session keeps draining.
    Unclassified(&'a ClassificationError),
}

/// A subscribable, single-consumer stream of classified envelopes.
#[async_trait]
pub trait EventSource: Send {
    async fn subscribe(&mut self, types: &[EventType]) -> Result<(), RealtimeError>;

    /// Best-effort; never fails.
    async fn unsubscribe(&mut self, types: &[EventType]);

    /// `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<Result<EventEnvelope, RealtimeError>>;

    async fn close(&mut self) {}
}

#[async_trait]
impl EventSource for Connection {
    async fn subscribe(&mut self, types: &[EventType]) -> Result<(), RealtimeError> {
        Connection::subscribe(self, types).await
    }

    async fn unsubscribe(&mut self, types: &[EventType]) {
        Connection::unsubscribe(self, types).await
    }

    async fn next_event(&mut self) -> Option<Result<EventEnvelope, RealtimeError>> {
        Connection::next_event(self).await
    }

    async fn close(&mut self) {
        Connection::close(self).await
    }
}

/// Opens a fresh `EventSource` for each session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Source: EventSource;

    async fn connect(&self) -> Result<Self::Source, RealtimeError>;
}

/// Connects to the robot's `pubsub` WebSocket.
#[derive(Clone, Debug)]
pub struct WsConnector {
    address: String,
}

impl WsConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Source = Connection;

    async fn connect(&self) -> Result<Connection, RealtimeError> {
        Connection::connect(&self.address).await
    }
}

/// Runs one session on an already open `source`.
///
/// The unsubscribe cleanup for `watched` always runs before this returns,
/// whether the session stopped, the stream closed, an error occurred, or
/// `cancel` resolved. Cleanup never changes the returned outcome.
pub async fn run_session<S, St, T, F, C>(
    source: &mut S,
    watched: &[EventType],
    start: Option<St>,
    terminal: T,
    mut sink: F,
    cancel: C,
) -> Result<SessionOutcome, SessionError>
where
    S: EventSource + ?Sized,
    St: Future<Output = Result<Value, SessionError>>,
    T: Fn(&EventEnvelope) -> bool,
    F: FnMut(SessionEvent<'_>),
    C: Future<Output = ()>,
{
    let outcome = tokio::select! {
        result = subscribe_and_drain(&mut *source, watched, start, &terminal, &mut sink) => result,
        _ = cancel => {
            info!("Session interrupted; cleaning up subscriptions.");
            Ok(SessionOutcome::Cancelled)
        }
    };

    source.unsubscribe(watched).await;
    outcome
}

async fn subscribe_and_drain<S, St, T, F>(
    source: &mut S,
    watched: &[EventType],
    start: Option<St>,
    terminal: &T,
    sink: &mut F,
) -> Result<SessionOutcome, SessionError>
where
    S: EventSource + ?Sized,
    St: Future<Output = Result<Value, SessionError>>,
    T: Fn(&EventEnvelope) -> bool,
    F: FnMut(SessionEvent<'_>),
{
    source.subscribe(watched).await?;

    if let Some(start) = start {
        let response = start.await?;
        sink(SessionEvent::Started(&response));
    }

    while let Some(item) = source.next_event().await {
        let envelope = match item {
            Ok(envelope) => envelope,
            Err(RealtimeError::Protocol(err)) => {
                error!(error = %err, "Received an event with an unrecognised payload.");
                sink(SessionEvent::Unclassified(&err));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        sink(SessionEvent::Event(&envelope));
        if terminal(&envelope) {
            info!(event = %envelope.event_name, "Terminal event received.");
            return Ok(SessionOutcome::Stopped);
        }
    }

    info!("Event stream ended.");
    Ok(SessionOutcome::StreamClosed)
}

/// Resolves skills, opens event streams, and runs sessions against one robot.
pub struct RunOrchestrator<A, C> {
    api: A,
    connector: C,
}

impl<A, C> RunOrchestrator<A, C>
where
    A: RobotApi,
    C: Connector,
{
    pub fn new(api: A, connector: C) -> Self {
        Self { api, connector }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Starts the skill named `name` and blocks until it reports `Stopped`.
    ///
    /// An unknown name fails with [`SessionError::SkillNotFound`] before any
    /// connection is opened. There is no timeout: only the terminal event,
    /// the stream closing, or `cancel` end the wait.
    #[instrument(name = "run_skill", skip_all, fields(skill = %name))]
    pub async fn run_skill<F, Cn>(
        &self,
        name: &str,
        sink: F,
        cancel: Cn,
    ) -> Result<SessionOutcome, SessionError>
    where
        F: FnMut(SessionEvent<'_>),
        Cn: Future<Output = ()>,
    {
        let skill_id = find_skill_id(&self.api, name)
            .await?
            .ok_or_else(|| SessionError::SkillNotFound(name.to_string()))?;

        let mut source = self.connector.connect().await?;
        info!(%skill_id, "Starting skill.");

        let start = async {
            self.api
                .start_skill(&skill_id)
                .await
                .map_err(SessionError::from)
        };
        let outcome = run_session(
            &mut source,
            &SKILL_WATCH,
            Some(start),
            EventEnvelope::is_skill_stopped,
            sink,
            cancel,
        )
        .await;
        source.close().await;

        if let Ok(SessionOutcome::StreamClosed) = outcome {
            warn!("Event stream closed before the skill reported it had stopped.");
        }
        outcome
    }

    /// Forwards every event of the given types, classified or not, until the
    /// stream closes or `cancel` resolves.
    #[instrument(name = "stream_events", skip_all, fields(types = types.len()))]
    pub async fn stream_events<F, Cn>(
        &self,
        types: &[EventType],
        sink: F,
        cancel: Cn,
    ) -> Result<SessionOutcome, SessionError>
    where
        F: FnMut(SessionEvent<'_>),
        Cn: Future<Output = ()>,
    {
        let mut source = self.connector.connect().await?;
        let outcome = run_session(
            &mut source,
            types,
            None::<std::future::Ready<Result<Value, SessionError>>>,
            |_: &EventEnvelope| false,
            sink,
            cancel,
        )
        .await;
        source.close().await;
        outcome
    }
}
