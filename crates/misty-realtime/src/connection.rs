//! Manages the lifecycle of one `pubsub` WebSocket connection.

use crate::{
    error::{RealtimeError, Result},
    subscriptions::SubscriptionSet,
};
use futures::Stream;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use misty_types::{ControlFrame, EventEnvelope, EventType, events::decode_envelope};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type EventItem = Result<EventEnvelope>;

/// Number of decoded envelopes buffered between the reader task and the consumer.
pub const EVENT_BUFFER: usize = 128;

/// Builds the event stream URL for a robot address such as `192.168.1.20`.
pub fn pubsub_url(address: &str) -> String {
    format!("ws://{}/pubsub", address)
}

/// Lifecycle of a connection once the handshake has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// One live socket to the robot plus the subscriptions made on it.
///
/// The inbound side is single-consumer: [`Connection::next_event`] and
/// [`Connection::events`] both take `&mut self`, so only one reader can drain
/// the queue at a time.
pub struct Connection {
    url: String,
    sink: SplitSink<WsStream, Message>,
    events_rx: mpsc::Receiver<EventItem>,
    subscriptions: SubscriptionSet,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connects to `ws://<address>/pubsub` and waits for the handshake.
    pub async fn connect(address: &str) -> Result<Self> {
        Self::connect_url(&pubsub_url(address)).await
    }

    /// Connects to an explicit WebSocket URL.
    pub async fn connect_url(url: &str) -> Result<Self> {
        let (ws_stream, _) =
            connect_async(url)
                .await
                .map_err(|source| RealtimeError::Connect {
                    url: url.to_string(),
                    source,
                })?;
        info!(%url, "Connected to robot event stream.");

        let (sink, stream) = ws_stream.split();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let open = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(stream, events_tx, open.clone()));

        Ok(Self {
            url: url.to_string(),
            sink,
            events_rx,
            subscriptions: SubscriptionSet::new(),
            open,
            reader,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `Open` until the reader task has seen the socket close or fail.
    pub fn state(&self) -> ConnectionState {
        if self.open.load(Ordering::SeqCst) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Sends one subscribe frame per type.
    ///
    /// No acknowledgement is awaited and repeated types are sent again. A type
    /// is recorded in the subscription set only once its frame was written.
    pub async fn subscribe(&mut self, types: &[EventType]) -> Result<()> {
        for &event_type in types {
            self.send_control(ControlFrame::subscribe(event_type), "subscribe", event_type)
                .await?;
            self.subscriptions.insert(event_type);
            debug!(%event_type, "Subscribed to event.");
        }
        Ok(())
    }

    /// Sends one unsubscribe frame per type, best-effort.
    ///
    /// Write failures (including an already closed socket) are logged and
    /// ignored; the types are removed from the subscription set either way.
    pub async fn unsubscribe(&mut self, types: &[EventType]) {
        for &event_type in types {
            self.subscriptions.remove(event_type);
            match self
                .send_control(ControlFrame::unsubscribe(event_type), "unsubscribe", event_type)
                .await
            {
                Ok(()) => debug!(%event_type, "Unsubscribed from event."),
                Err(e) => warn!(%event_type, error = %e, "Unsubscribe frame not delivered."),
            }
        }
    }

    /// Waits for the next envelope.
    ///
    /// Returns `None` once the socket has closed and every buffered envelope
    /// has been delivered. A transport failure is yielded as an error item
    /// before the sequence ends.
    pub async fn next_event(&mut self) -> Option<EventItem> {
        self.events_rx.recv().await
    }

    /// The inbound envelopes as a `Stream`, borrowing the connection.
    pub fn events(&mut self) -> impl Stream<Item = EventItem> + '_ {
        futures::stream::poll_fn(move |cx| self.events_rx.poll_recv(cx))
    }

    /// Sends a close frame, best-effort.
    ///
    /// The reader task stops once the robot answers the close, or when the
    /// connection is dropped.
    pub async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "Close frame not delivered.");
        }
        info!(url = %self.url, "Event stream connection closed.");
    }

    async fn send_control(
        &mut self,
        frame: ControlFrame,
        operation: &'static str,
        event_type: EventType,
    ) -> Result<()> {
        let payload = frame.to_json()?;
        self.sink
            .send(Message::Text(payload.into()))
            .await
            .map_err(|source| RealtimeError::Send {
                operation,
                event_type,
                source,
            })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reads frames until the socket closes, the consumer goes away, or the
/// transport fails. Exactly one of these tasks runs per connection.
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    events_tx: mpsc::Sender<EventItem>,
    open: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next().await {
        let item = match frame {
            Ok(Message::Text(text)) => decode_envelope(&text).map_err(RealtimeError::from),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => decode_envelope(text).map_err(RealtimeError::from),
                Err(_) => {
                    warn!(len = bytes.len(), "Ignoring non UTF-8 binary frame.");
                    continue;
                }
            },
            Ok(Message::Close(close_frame)) => {
                info!(?close_frame, "Robot closed the event stream.");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "Error reading from robot event stream.");
                let _ = events_tx.send(Err(RealtimeError::Transport(e))).await;
                break;
            }
        };

        if events_tx.send(item).await.is_err() {
            debug!("Event consumer dropped; stopping reader.");
            break;
        }
    }
    open.store(false, Ordering::SeqCst);
}
