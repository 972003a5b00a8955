//! Realtime connection to the Socket.IO collaborator.
//!
//! The connection handle is built eagerly without touching the network and
//! only dials out on [`RealtimeLink::connect`]. One spawned task owns the
//! `rust_socketio` client: it opens the socket, writes queued outbound events
//! in order, and disconnects once the handle lets go of the queue. Socket
//! callbacks are forwarded to the event loop as [`TransportEvent`]s.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use rust_socketio::{
    Event, Payload, TransportType,
    asynchronous::{Client, ClientBuilder},
};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::ClientError;

/// Namespace the chat events live on
pub const DEFAULT_NAMESPACE: &str = "/";

/// How long a graceful close may take before the task is aborted
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Transport-level notifications delivered to the event loop
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The namespace connect was acknowledged
    Connected,
    /// The connection dropped or was closed
    Disconnected(String),
    /// A named event arrived
    Event { name: String, data: Value },
}

/// An outbound realtime channel with an explicit open/close lifecycle
#[async_trait]
pub trait RealtimeLink: Send {
    /// Open the connection with the given auth metadata
    fn connect(&mut self, auth: Value) -> Result<(), ClientError>;

    /// Queue one event for delivery; fire-and-forget
    fn emit(&self, event: &str, data: Value) -> Result<(), ClientError>;

    /// Close the connection, releasing the background task
    async fn close(&mut self);
}

#[derive(Debug)]
struct Outbound {
    event: String,
    data: Value,
}

/// Socket.IO connection backed by `rust_socketio`
pub struct SocketIoConnection {
    url: String,
    websocket_only: bool,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
}

impl SocketIoConnection {
    /// Build the handle; no I/O happens until `connect`
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            url: url.into(),
            websocket_only: false,
            events,
            outbound: None,
            task: None,
        }
    }

    /// Open the WebSocket directly instead of starting on long-polling
    pub fn websocket_only(mut self, websocket_only: bool) -> Self {
        self.websocket_only = websocket_only;
        self
    }

    pub fn is_open(&self) -> bool {
        self.outbound.is_some()
    }
}

#[async_trait]
impl RealtimeLink for SocketIoConnection {
    fn connect(&mut self, auth: Value) -> Result<(), ClientError> {
        if self.is_open() {
            tracing::warn!("Realtime connection already open, ignoring connect");
            return Ok(());
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let builder = socket_builder(&self.url, self.websocket_only, auth, &self.events);

        tracing::info!("Connecting to {}", self.url);
        self.task = Some(tokio::spawn(drive(builder, outbound_rx, self.events.clone())));
        self.outbound = Some(outbound_tx);
        Ok(())
    }

    fn emit(&self, event: &str, data: Value) -> Result<(), ClientError> {
        let outbound = self.outbound.as_ref().ok_or(ClientError::NotConnected)?;
        outbound
            .send(Outbound {
                event: event.to_string(),
                data,
            })
            .map_err(|_| ClientError::NotConnected)?;
        tracing::debug!("Queued '{}' event", event);
        Ok(())
    }

    async fn close(&mut self) {
        // Dropping the sender lets the task disconnect the socket.
        self.outbound = None;
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err()
        {
            tracing::debug!("Realtime task did not close in time, aborting");
            task.abort();
        }
    }
}

impl Drop for SocketIoConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Configure the socket and wire its callbacks into the event channel
fn socket_builder(
    url: &str,
    websocket_only: bool,
    auth: Value,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> ClientBuilder {
    let on_connect = events.clone();
    let on_close = events.clone();
    let on_event = events.clone();

    let builder = ClientBuilder::new(url)
        .namespace(DEFAULT_NAMESPACE)
        .auth(auth)
        .on(Event::Connect, move |_payload: Payload, _socket: Client| {
            let events = on_connect.clone();
            async move {
                events.send(TransportEvent::Connected).ok();
            }
            .boxed()
        })
        .on(Event::Close, move |_payload: Payload, _socket: Client| {
            let events = on_close.clone();
            async move {
                events
                    .send(TransportEvent::Disconnected("server closed the connection".into()))
                    .ok();
            }
            .boxed()
        })
        .on(Event::Error, |payload: Payload, _socket: Client| {
            async move {
                tracing::warn!("Realtime transport error: {:?}", payload);
            }
            .boxed()
        })
        .on_any(move |event: Event, payload: Payload, _socket: Client| {
            let events = on_event.clone();
            async move {
                let name = String::from(event);
                match first_argument(payload) {
                    Some(data) => {
                        events.send(TransportEvent::Event { name, data }).ok();
                    }
                    None => tracing::debug!("Ignoring '{}' without a JSON payload", name),
                }
            }
            .boxed()
        });

    if websocket_only {
        builder.transport_type(TransportType::Websocket)
    } else {
        builder
    }
}

/// The first JSON argument of an event; binary payloads carry none
fn first_argument(payload: Payload) -> Option<Value> {
    match payload {
        Payload::Text(values) => Some(values.into_iter().next().unwrap_or(Value::Null)),
        _ => None,
    }
}

/// Open the socket, then write queued events until the queue is dropped
async fn drive(
    builder: ClientBuilder,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let socket = match builder.connect().await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!("Realtime connection error: {}", e);
            events.send(TransportEvent::Disconnected(e.to_string())).ok();
            return;
        }
    };

    while let Some(Outbound { event, data }) = outbound.recv().await {
        if let Err(e) = socket.emit(event.as_str(), Payload::Text(vec![data])).await {
            tracing::warn!("Could not send '{}': {}", event, e);
        }
    }

    if let Err(e) = socket.disconnect().await {
        tracing::debug!("Disconnect failed: {}", e);
    }
    events
        .send(TransportEvent::Disconnected("connection closed".into()))
        .ok();
}
