//! One Breeze socket channel: transport, authentication, watch set and read
//! loop.
//!
//! # Lifecycle
//!
//! ```text
//!  Disconnected ──connect──▶ Connecting ──dial ok──▶ Authenticating ──auth sent──▶ Open
//!       ▲                        │                          │                      │
//!       └──────── error ─────────┴──────────────────────────┘                      │
//!       ▲                                                                          │
//!       └──────────────── disconnect / transport drop ────────────────────────────┘
//! ```
//!
//! `connect` on a channel that is not `Disconnected` is a no-op, so racing
//! callers never open a second transport. `disconnect` is valid in every
//! state and cancels a dial or handshake that has not finished.
//!
//! A transport drop leaves the watch set in place for
//! [`rewatch`](ChannelConnection::rewatch) /
//! [`rewatch_ohlc`](ChannelConnection::rewatch_ohlc) after the caller
//! reconnects; an explicit [`disconnect`](ChannelConnection::disconnect)
//! clears it.
//!
//! # Frames
//!
//! Outbound control frames are JSON text:
//!
//! ```text
//! {"user":"<id>","token":"<session key>"}           authentication
//! {"type":"join","data":"4.1!2885"}                  watch one token
//! {"type":"join","data":["4.1!2885","4.2!2885"]}     watch several
//! {"type":"join","data":"4.1!2885","channel":"1MIN"} OHLC room
//! {"type":"leave", ...}                              mirror of join
//! {"type":"notify"}                                  order notifications
//! ```
//!
//! Inbound frames are either bare positional arrays (quotes, depth, order
//! events) or an `{"event":"order"|"ohlc","data":...}` envelope. Every decoded
//! record is delivered synchronously to the registered [`StreamHandlers`]
//! from the read loop, so handlers must return promptly.

use std::fmt;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::error::{BreezeError, Result};
use crate::instruments::TokenRegistry;
use crate::instruments::codec;
use crate::types::enums::{ChannelKind, Interval};
use crate::types::instrument::SessionCredentials;
use crate::ws::decoder::{self, DecodedRecord};
use crate::ws::watch_set::WatchSet;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`ChannelConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Dialing the endpoint.
    Connecting,
    /// Transport open, authentication frame in flight.
    Authenticating,
    /// Authenticated; read loop running.
    Open,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Authenticating => "Authenticating",
            Self::Open => "Open",
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Callback receiving every decoded, enriched record.
pub type TickHandler = Arc<dyn Fn(&DecodedRecord) + Send + Sync>;

/// Callback receiving non-fatal per-frame errors.
pub type ErrorHandler = Arc<dyn Fn(&BreezeError) + Send + Sync>;

/// Host callbacks shared by all channels of a subscription manager.
#[derive(Clone, Default)]
pub struct StreamHandlers {
    on_ticks: Option<TickHandler>,
    on_ticks2: Option<TickHandler>,
    on_error: Option<ErrorHandler>,
}

impl StreamHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary tick callback.
    pub fn on_ticks(mut self, f: impl Fn(&DecodedRecord) + Send + Sync + 'static) -> Self {
        self.on_ticks = Some(Arc::new(f));
        self
    }

    /// Secondary tick callback, invoked after the primary one.
    pub fn on_ticks2(mut self, f: impl Fn(&DecodedRecord) + Send + Sync + 'static) -> Self {
        self.on_ticks2 = Some(Arc::new(f));
        self
    }

    /// Callback for decode and enrichment failures.
    pub fn on_error(mut self, f: impl Fn(&BreezeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_ticks", &self.on_ticks.is_some())
            .field("on_ticks2", &self.on_ticks2.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Handler table shared between the facade and every read loop.
pub type SharedHandlers = Arc<parking_lot::RwLock<StreamHandlers>>;

// ---------------------------------------------------------------------------
// Control frames
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AuthFrame<'a> {
    user: &'a str,
    token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum TokenData<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
}

impl<'a> TokenData<'a> {
    fn from_tokens<S: AsRef<str>>(tokens: &'a [S]) -> Self {
        match tokens {
            [one] => Self::One(one.as_ref()),
            many => Self::Many(many.iter().map(|t| t.as_ref()).collect()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<TokenData<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'static str>,
}

impl<'a> ControlFrame<'a> {
    fn join(data: TokenData<'a>) -> Self {
        Self {
            kind: "join",
            data: Some(data),
            channel: None,
        }
    }

    fn leave(data: TokenData<'a>) -> Self {
        Self {
            kind: "leave",
            data: Some(data),
            channel: None,
        }
    }

    fn notify() -> Self {
        Self {
            kind: "notify",
            data: None,
            channel: None,
        }
    }

    fn with_interval(mut self, interval: Interval) -> Self {
        self.channel = Some(interval.channel_code());
        self
    }
}

/// Inbound `{"event": ..., "data": ...}` envelope.
#[derive(Debug, serde::Deserialize)]
struct EventEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

// ---------------------------------------------------------------------------
// Frame dispatch
// ---------------------------------------------------------------------------

/// Decodes inbound frames, enriches tick records and invokes the handlers.
pub(crate) struct FrameDispatcher {
    kind: ChannelKind,
    registry: Arc<TokenRegistry>,
    handlers: SharedHandlers,
}

impl FrameDispatcher {
    pub(crate) fn new(
        kind: ChannelKind,
        registry: Arc<TokenRegistry>,
        handlers: SharedHandlers,
    ) -> Self {
        Self {
            kind,
            registry,
            handlers,
        }
    }

    pub(crate) fn dispatch_text(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.dispatch_value(value),
            Err(e) => self.report(BreezeError::Json(e)),
        }
    }

    fn dispatch_value(&self, value: Value) {
        let decoded = match value {
            Value::Array(items) => decoder::decode(&items),
            Value::Object(_) => match serde_json::from_value::<EventEnvelope>(value) {
                Ok(envelope) => match self.decode_envelope(envelope) {
                    Some(result) => result,
                    None => return,
                },
                Err(_) => {
                    tracing::debug!(channel = %self.kind, "Ignoring frame without event");
                    return;
                }
            },
            other => {
                tracing::debug!(channel = %self.kind, frame = %other, "Ignoring scalar frame");
                return;
            }
        };

        match decoded {
            Ok(mut record) => {
                self.enrich(&mut record);
                self.deliver(&record);
            }
            Err(e) => self.report(e),
        }
    }

    fn decode_envelope(&self, envelope: EventEnvelope) -> Option<Result<DecodedRecord>> {
        match (envelope.event.as_str(), envelope.data) {
            ("order", Value::String(raw)) => Some(
                serde_json::from_str::<Value>(&raw)
                    .map_err(BreezeError::from)
                    .and_then(|v| decoder::decode_value(&v)),
            ),
            ("order", data) => Some(decoder::decode_value(&data)),
            ("ohlc", Value::String(csv)) => Some(decoder::decode_ohlc(&csv)),
            ("ohlc", other) => Some(Err(BreezeError::Decode(format!(
                "OHLC payload is not text: {other}"
            )))),
            (event, _) => {
                tracing::debug!(channel = %self.kind, event, "Ignoring unhandled event");
                None
            }
        }
    }

    /// Merge instrument metadata into tick records. A miss is reported but
    /// the record is still delivered.
    fn enrich(&self, record: &mut DecodedRecord) {
        if !record.kind.is_tick() {
            return;
        }
        let Some(symbol) = record.symbol().map(str::to_owned) else {
            return;
        };
        match codec::parse_stream_symbol(&self.registry, &symbol) {
            Ok(meta) => record.merge_metadata(&meta),
            Err(e) => self.report(e),
        }
    }

    fn deliver(&self, record: &DecodedRecord) {
        let (primary, secondary) = {
            let handlers = self.handlers.read();
            (handlers.on_ticks.clone(), handlers.on_ticks2.clone())
        };
        if let Some(f) = primary {
            f(record);
        }
        if let Some(f) = secondary {
            f(record);
        }
    }

    fn report(&self, error: BreezeError) {
        tracing::warn!(channel = %self.kind, error = %error, "Frame handling failed");
        let handler = self.handlers.read().on_error.clone();
        if let Some(f) = handler {
            f(&error);
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// State shared with the read loop, guarded by one short sync lock.
///
/// Lives outside the session lock so `disconnect` can cancel a dial or
/// handshake that is still in flight.
struct Lifecycle {
    state: ConnectionState,
    /// Bumped on every connect attempt and disconnect. A read loop only marks
    /// the channel dropped while its generation is still current.
    generation: u64,
    /// Cancels the current connect attempt and the read loop it starts.
    cancel: CancellationToken,
}

type SharedLifecycle = Arc<parking_lot::Mutex<Lifecycle>>;

/// Mutable per-connection state, serialised by one async mutex.
#[derive(Default)]
struct Session {
    writer: Option<WsWriter>,
    watch: WatchSet,
    reader: Option<JoinHandle<()>>,
    connect_count: u32,
    /// Order notifications were requested and must be renewed on rewatch.
    notify: bool,
}

/// One logical Breeze socket channel.
pub struct ChannelConnection {
    kind: ChannelKind,
    credentials: SessionCredentials,
    dispatcher: Arc<FrameDispatcher>,
    lifecycle: SharedLifecycle,
    session: tokio::sync::Mutex<Session>,
}

impl fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ChannelConnection {
    /// Create a disconnected channel.
    pub fn new(
        kind: ChannelKind,
        credentials: SessionCredentials,
        registry: Arc<TokenRegistry>,
        handlers: SharedHandlers,
    ) -> Self {
        Self {
            kind,
            credentials,
            dispatcher: Arc::new(FrameDispatcher::new(kind, registry, handlers)),
            lifecycle: Arc::new(parking_lot::Mutex::new(Lifecycle {
                state: ConnectionState::Disconnected,
                generation: 0,
                cancel: CancellationToken::new(),
            })),
            session: tokio::sync::Mutex::new(Session::default()),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Transports opened since the last explicit disconnect.
    pub async fn connect_count(&self) -> u32 {
        self.session.lock().await.connect_count
    }

    /// Currently watched tokens.
    pub async fn watched_tokens(&self) -> Vec<String> {
        self.session.lock().await.watch.tokens().map(str::to_owned).collect()
    }

    /// Currently joined OHLC rooms.
    pub async fn rooms(&self) -> Vec<(String, Interval)> {
        self.session
            .lock()
            .await
            .watch
            .rooms()
            .map(|(t, i)| (t.to_owned(), i))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Connect / disconnect
    // -----------------------------------------------------------------------

    /// Open the transport, authenticate and start the read loop.
    ///
    /// Returns immediately if the channel is already connecting or open. A
    /// [`disconnect`](Self::disconnect) issued while the dial or handshake is
    /// pending aborts it and this call fails with
    /// [`BreezeError::NotConnected`].
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let (generation, cancel) = {
            let mut life = self.lifecycle.lock();
            if life.state != ConnectionState::Disconnected {
                tracing::debug!(channel = %self.kind, state = %life.state, "Connect skipped");
                return Ok(());
            }
            life.state = ConnectionState::Connecting;
            life.generation += 1;
            life.cancel = CancellationToken::new();
            (life.generation, life.cancel.clone())
        };

        let opened = tokio::select! {
            () = cancel.cancelled() => Err(BreezeError::NotConnected(self.kind)),
            res = self.open(endpoint, generation) => res,
        };

        let (writer, reader) = match opened {
            Ok(halves) => halves,
            Err(e) => {
                {
                    let mut life = self.lifecycle.lock();
                    if life.generation == generation {
                        life.state = ConnectionState::Disconnected;
                    }
                }
                tracing::error!(channel = %self.kind, error = %e, "Connect failed");
                return Err(e);
            }
        };

        {
            let mut life = self.lifecycle.lock();
            if life.generation != generation {
                tracing::debug!(channel = %self.kind, "Connect superseded by disconnect");
                return Err(BreezeError::NotConnected(self.kind));
            }
            life.state = ConnectionState::Open;
        }

        session.writer = Some(writer);
        session.connect_count += 1;
        session.reader = Some(tokio::spawn(read_loop(ReadLoop {
            kind: self.kind,
            reader,
            cancel,
            dispatcher: Arc::clone(&self.dispatcher),
            lifecycle: Arc::clone(&self.lifecycle),
            generation,
        })));

        tracing::info!(channel = %self.kind, "Connected");
        Ok(())
    }

    /// Dial and authenticate. Returns the split transport.
    async fn open(&self, endpoint: &str, generation: u64) -> Result<(WsWriter, WsReader)> {
        let url = url::Url::parse(endpoint)?;
        tracing::info!(channel = %self.kind, %url, "Connecting");

        let (ws, _response) = connect_async(url.as_str()).await?;
        let (mut writer, reader) = ws.split();

        {
            let mut life = self.lifecycle.lock();
            if life.generation == generation {
                life.state = ConnectionState::Authenticating;
            }
        }
        let auth = serde_json::to_string(&AuthFrame {
            user: &self.credentials.user_id,
            token: &self.credentials.session_key,
        })?;
        writer.send(Message::Text(auth.into())).await?;

        Ok((writer, reader))
    }

    /// Stop the read loop, close the transport and clear the watch set.
    ///
    /// Cancels a connect that is still dialing or authenticating. Always
    /// succeeds, including on a channel that was never connected.
    pub async fn disconnect(&self) -> Result<()> {
        let (previous, generation) = {
            let mut life = self.lifecycle.lock();
            life.generation += 1;
            life.cancel.cancel();
            let previous = std::mem::replace(&mut life.state, ConnectionState::Disconnected);
            (previous, life.generation)
        };

        let mut session = self.session.lock().await;
        if self.lifecycle.lock().generation != generation {
            // A newer connect ran while this call waited for the session.
            tracing::debug!(channel = %self.kind, "Disconnect superseded by connect");
            return Ok(());
        }

        let reader = session.reader.take();
        if let Some(mut writer) = session.writer.take() {
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "transport close".into(),
            }));
            if let Err(e) = writer.send(close).await {
                tracing::debug!(channel = %self.kind, error = %e, "Close frame not sent");
            }
        }

        session.watch.clear();
        session.connect_count = 0;
        session.notify = false;
        drop(session);

        if let Some(handle) = reader {
            if let Err(e) = handle.await {
                tracing::warn!(channel = %self.kind, error = %e, "Read loop ended abnormally");
            }
        }

        if previous != ConnectionState::Disconnected {
            tracing::info!(channel = %self.kind, "Disconnected");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Watch / unwatch
    // -----------------------------------------------------------------------

    /// Join one or more tokens in a single frame.
    pub async fn watch<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        let mut session = self.open_session().await?;
        if tokens.is_empty() {
            return Ok(());
        }

        let added = session.watch.watch(tokens);
        tracing::debug!(channel = %self.kind, requested = tokens.len(), added, "Watch");
        let frame = ControlFrame::join(TokenData::from_tokens(tokens));
        self.send(&mut session, &frame).await
    }

    /// Leave one or more tokens in a single frame. Tokens that were never
    /// watched are still sent.
    pub async fn unwatch<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        let mut session = self.open_session().await?;
        if tokens.is_empty() {
            return Ok(());
        }

        session.watch.unwatch(tokens);
        tracing::debug!(channel = %self.kind, count = tokens.len(), "Unwatch");
        let frame = ControlFrame::leave(TokenData::from_tokens(tokens));
        self.send(&mut session, &frame).await
    }

    /// Join an OHLC room.
    pub async fn watch_stream_data(&self, token: &str, interval: Interval) -> Result<()> {
        let mut session = self.open_session().await?;

        session.watch.join_room(token, interval);
        tracing::debug!(channel = %self.kind, token, %interval, "Join room");
        let frame = ControlFrame::join(TokenData::One(token)).with_interval(interval);
        self.send(&mut session, &frame).await
    }

    /// Leave an OHLC room.
    pub async fn unwatch_stream_data(&self, token: &str, interval: Interval) -> Result<()> {
        let mut session = self.open_session().await?;

        session.watch.leave_room(token, interval);
        tracing::debug!(channel = %self.kind, token, %interval, "Leave room");
        let frame = ControlFrame::leave(TokenData::One(token)).with_interval(interval);
        self.send(&mut session, &frame).await
    }

    /// Ask the order channel to push order notifications.
    pub async fn notify(&self) -> Result<()> {
        let mut session = self.open_session().await?;
        self.send(&mut session, &ControlFrame::notify()).await?;
        session.notify = true;
        Ok(())
    }

    /// Replay every watched token as its own join frame. Returns the number
    /// of joins sent.
    ///
    /// If order notifications were requested, that request is replayed first.
    pub async fn rewatch(&self) -> Result<usize> {
        let mut session = self.open_session().await?;

        if session.notify {
            self.send(&mut session, &ControlFrame::notify()).await?;
        }

        let tokens: Vec<String> = session.watch.tokens().map(str::to_owned).collect();
        for token in &tokens {
            let frame = ControlFrame::join(TokenData::One(token));
            self.send(&mut session, &frame).await?;
        }
        tracing::info!(channel = %self.kind, tokens = tokens.len(), "Rewatched tokens");
        Ok(tokens.len())
    }

    /// Replay every joined OHLC room. Returns the number of joins sent.
    pub async fn rewatch_ohlc(&self) -> Result<usize> {
        let mut session = self.open_session().await?;

        let rooms: Vec<(String, Interval)> = session
            .watch
            .rooms()
            .map(|(t, i)| (t.to_owned(), i))
            .collect();
        for (token, interval) in &rooms {
            let frame = ControlFrame::join(TokenData::One(token)).with_interval(*interval);
            self.send(&mut session, &frame).await?;
        }
        tracing::info!(channel = %self.kind, rooms = rooms.len(), "Rewatched rooms");
        Ok(rooms.len())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure_open(&self) -> Result<()> {
        if self.state().is_open() {
            Ok(())
        } else {
            Err(BreezeError::NotConnected(self.kind))
        }
    }

    /// Lock the session of an open channel. Fails fast while a connect is
    /// still pending instead of queueing behind it.
    async fn open_session(&self) -> Result<tokio::sync::MutexGuard<'_, Session>> {
        self.ensure_open()?;
        let session = self.session.lock().await;
        self.ensure_open()?;
        Ok(session)
    }

    async fn send(&self, session: &mut Session, frame: &ControlFrame<'_>) -> Result<()> {
        let writer = session
            .writer
            .as_mut()
            .ok_or(BreezeError::NotConnected(self.kind))?;
        let json = serde_json::to_string(frame)?;
        writer.send(Message::Text(json.into())).await?;
        Ok(())
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        self.lifecycle.lock().cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

struct ReadLoop {
    kind: ChannelKind,
    reader: WsReader,
    cancel: CancellationToken,
    dispatcher: Arc<FrameDispatcher>,
    lifecycle: SharedLifecycle,
    generation: u64,
}

async fn read_loop(mut ctx: ReadLoop) {
    use tokio_tungstenite::tungstenite::Error as WsError;

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => {
                tracing::debug!(channel = %ctx.kind, "Read loop cancelled");
                return;
            }
            msg = ctx.reader.next() => match msg {
                Some(Ok(Message::Text(text))) => ctx.dispatcher.dispatch_text(&text),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => ctx.dispatcher.dispatch_text(text),
                    Err(e) => {
                        tracing::warn!(channel = %ctx.kind, error = %e, "Non-UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(channel = %ctx.kind, ?frame, "Server closed the channel");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
                Some(Err(WsError::Io(e))) => {
                    tracing::error!(channel = %ctx.kind, error = %e, "Transport I/O error");
                    break;
                }
                Some(Err(e)) => {
                    tracing::error!(channel = %ctx.kind, error = %e, "Read error");
                }
                None => break,
            },
        }
    }

    let dropped = {
        let mut life = ctx.lifecycle.lock();
        let current = life.generation == ctx.generation;
        if current {
            life.state = ConnectionState::Disconnected;
        }
        current
    };
    if dropped {
        tracing::warn!(channel = %ctx.kind, "Transport closed; watch set kept for rewatch");
    }
}
