//! Subscription facade over the three Breeze socket channels.
//!
//! [`SubscriptionManager`] owns one [`ChannelConnection`] per
//! [`ChannelKind`] and decides, per request, which one to use:
//!
//! | Request                                   | Channel          |
//! |-------------------------------------------|------------------|
//! | token in the strategy allow-list          | `OrderRefresh`   |
//! | `get_order_notification`                  | `OrderRefresh`   |
//! | `interval` set                            | `OhlcStream`     |
//! | anything else                             | `RateRefresh`    |
//!
//! The rate-refresh channel must be opened with
//! [`ws_connect`](SubscriptionManager::ws_connect) first; the OHLC and
//! order channels connect on demand.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use breeze_rs::instruments::TokenRegistry;
//! use breeze_rs::types::{Exchange, InstrumentKey, SessionCredentials};
//! use breeze_rs::ws::connection::StreamHandlers;
//! use breeze_rs::ws::subscription::{FeedRequest, SubscriptionManagerBuilder};
//!
//! # #[tokio::main]
//! # async fn main() -> breeze_rs::Result<()> {
//! let registry = Arc::new(TokenRegistry::new());
//! let manager = SubscriptionManagerBuilder::new(SessionCredentials::new("user", "key"), registry)
//!     .handlers(StreamHandlers::new().on_ticks(|tick| println!("{:?}", tick.fields)))
//!     .build();
//!
//! manager.ws_connect().await?;
//! let request = FeedRequest::instrument(InstrumentKey::cash(Exchange::Nse, "RELIND")).depth(true);
//! manager.subscribe_feeds(&request).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::constants::{self, STRATEGY_SUBSCRIPTION, messages};
use crate::error::{Result, ValidationError};
use crate::instruments::{TokenRegistry, codec};
use crate::types::enums::{ChannelKind, Interval};
use crate::types::instrument::{InstrumentKey, SessionCredentials};
use crate::ws::connection::{ChannelConnection, ConnectionState, SharedHandlers, StreamHandlers};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Socket endpoints used by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Rate-refresh (quotes and depth) endpoint.
    pub live_stream_url: String,
    /// Order-refresh and strategy endpoint.
    pub live_feeds_url: String,
    /// OHLC stream endpoint.
    pub ohlc_stream_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            live_stream_url: constants::LIVE_STREAM_URL.to_owned(),
            live_feeds_url: constants::LIVE_FEEDS_URL.to_owned(),
            ohlc_stream_url: constants::LIVE_OHLC_STREAM_URL.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// A subscribe or unsubscribe request.
///
/// Either a raw `stock_token` (a channel id such as `4.1!2885`, or a
/// strategy name) or an [`InstrumentKey`] to resolve through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub stock_token: Option<String>,
    pub instrument: Option<InstrumentKey>,
    /// OHLC interval label (`"1minute"`); routes to the OHLC stream.
    pub interval: Option<String>,
    pub get_exchange_quotes: bool,
    pub get_market_depth: bool,
    pub get_order_notification: bool,
}

impl Default for FeedRequest {
    fn default() -> Self {
        Self {
            stock_token: None,
            instrument: None,
            interval: None,
            get_exchange_quotes: true,
            get_market_depth: false,
            get_order_notification: false,
        }
    }
}

impl FeedRequest {
    /// Request for a raw stream token or strategy name.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            stock_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Request for an instrument resolved through the registry.
    pub fn instrument(key: InstrumentKey) -> Self {
        Self {
            instrument: Some(key),
            ..Default::default()
        }
    }

    /// Request for order notifications.
    pub fn order_notification() -> Self {
        Self {
            get_order_notification: true,
            ..Default::default()
        }
    }

    /// Stream OHLC bars at `interval` instead of ticks.
    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    pub fn quotes(mut self, enabled: bool) -> Self {
        self.get_exchange_quotes = enabled;
        self
    }

    pub fn depth(mut self, enabled: bool) -> Self {
        self.get_market_depth = enabled;
        self
    }

    fn subject(&self) -> &str {
        self.stock_token
            .as_deref()
            .or(self.instrument.as_ref().map(|k| k.stock_code.as_str()))
            .unwrap_or_default()
    }
}

/// Acknowledgement returned by the facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamResponse {
    pub message: String,
}

impl StreamResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Target channel of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Strategy,
    OrderNotification,
    Ohlc(Interval),
    RateRefresh,
}

impl Route {
    pub fn channel(self) -> ChannelKind {
        match self {
            Self::Strategy | Self::OrderNotification => ChannelKind::OrderRefresh,
            Self::Ohlc(_) => ChannelKind::OhlcStream,
            Self::RateRefresh => ChannelKind::RateRefresh,
        }
    }
}

/// Decide where a request goes. An interval, when present, is validated
/// even if another rule wins.
pub fn route(request: &FeedRequest) -> Result<Route> {
    let interval = request
        .interval
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<Interval>)
        .transpose()?;

    let strategy = request
        .stock_token
        .as_deref()
        .is_some_and(|t| STRATEGY_SUBSCRIPTION.contains(&t));

    Ok(if strategy {
        Route::Strategy
    } else if request.get_order_notification {
        Route::OrderNotification
    } else if let Some(interval) = interval {
        Route::Ohlc(interval)
    } else {
        Route::RateRefresh
    })
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`SubscriptionManager`].
pub struct SubscriptionManagerBuilder {
    credentials: SessionCredentials,
    registry: Arc<TokenRegistry>,
    handlers: StreamHandlers,
    config: StreamConfig,
}

impl SubscriptionManagerBuilder {
    pub fn new(credentials: SessionCredentials, registry: Arc<TokenRegistry>) -> Self {
        Self {
            credentials,
            registry,
            handlers: StreamHandlers::default(),
            config: StreamConfig::default(),
        }
    }

    /// Host callbacks.
    pub fn handlers(mut self, handlers: StreamHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace all endpoints at once.
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn live_stream_url(mut self, url: impl Into<String>) -> Self {
        self.config.live_stream_url = url.into();
        self
    }

    pub fn live_feeds_url(mut self, url: impl Into<String>) -> Self {
        self.config.live_feeds_url = url.into();
        self
    }

    pub fn ohlc_stream_url(mut self, url: impl Into<String>) -> Self {
        self.config.ohlc_stream_url = url.into();
        self
    }

    pub fn build(self) -> SubscriptionManager {
        let handlers: SharedHandlers = Arc::new(parking_lot::RwLock::new(self.handlers));
        let channel = |kind| {
            ChannelConnection::new(
                kind,
                self.credentials.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&handlers),
            )
        };

        SubscriptionManager {
            rate_refresh: channel(ChannelKind::RateRefresh),
            ohlc_stream: channel(ChannelKind::OhlcStream),
            order_refresh: channel(ChannelKind::OrderRefresh),
            config: self.config,
            registry: self.registry,
            handlers,
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Routes subscribe / unsubscribe requests onto the three socket channels.
#[derive(Debug)]
pub struct SubscriptionManager {
    config: StreamConfig,
    registry: Arc<TokenRegistry>,
    handlers: SharedHandlers,
    rate_refresh: ChannelConnection,
    ohlc_stream: ChannelConnection,
    order_refresh: ChannelConnection,
}

impl SubscriptionManager {
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    /// Replace the host callbacks. Takes effect for the next frame on every
    /// channel.
    pub fn set_handlers(&self, handlers: StreamHandlers) {
        *self.handlers.write() = handlers;
    }

    /// The connection for a channel kind.
    pub fn channel(&self, kind: ChannelKind) -> &ChannelConnection {
        match kind {
            ChannelKind::RateRefresh => &self.rate_refresh,
            ChannelKind::OhlcStream => &self.ohlc_stream,
            ChannelKind::OrderRefresh => &self.order_refresh,
        }
    }

    /// Open the rate-refresh channel.
    pub async fn ws_connect(&self) -> Result<()> {
        self.rate_refresh.connect(&self.config.live_stream_url).await
    }

    /// Subscribe to a feed.
    pub async fn subscribe_feeds(&self, request: &FeedRequest) -> Result<StreamResponse> {
        let route = route(request)?;
        tracing::debug!(?route, subject = request.subject(), "Subscribe");

        match route {
            Route::Strategy => {
                let token = request.subject();
                self.order_refresh.connect(&self.config.live_feeds_url).await?;
                self.order_refresh.watch(&[token]).await?;
                Ok(StreamResponse::new(messages::strategy_subscribed(token)))
            }
            Route::OrderNotification => {
                self.order_refresh.connect(&self.config.live_feeds_url).await?;
                self.order_refresh.notify().await?;
                Ok(StreamResponse::new(messages::ORDER_NOTIFICATION_SUBSCRIBED))
            }
            Route::Ohlc(interval) => {
                let token = self.ohlc_token(request)?;
                self.ohlc_stream.connect(&self.config.ohlc_stream_url).await?;
                self.ohlc_stream.watch_stream_data(&token, interval).await?;
                Ok(StreamResponse::new(messages::stock_subscribed(request.subject())))
            }
            Route::RateRefresh => {
                let tokens = self.stream_tokens(request)?;
                self.rate_refresh.watch(&tokens).await?;
                Ok(StreamResponse::new(messages::stock_subscribed(request.subject())))
            }
        }
    }

    /// Unsubscribe from a feed.
    ///
    /// Unsubscribing order notifications tears the order channel down.
    pub async fn unsubscribe_feeds(&self, request: &FeedRequest) -> Result<StreamResponse> {
        let route = route(request)?;
        tracing::debug!(?route, subject = request.subject(), "Unsubscribe");

        match route {
            Route::OrderNotification => Ok(StreamResponse::new(
                if self.teardown(&self.order_refresh).await? {
                    messages::ORDER_REFRESH_DISCONNECTED
                } else {
                    messages::ORDER_REFRESH_NOT_CONNECTED
                },
            )),
            Route::Strategy => {
                let token = request.subject();
                if !self.order_refresh.is_open() {
                    return Ok(StreamResponse::new(messages::STRATEGY_STREAM_NOT_CONNECTED));
                }
                self.order_refresh.unwatch(&[token]).await?;
                Ok(StreamResponse::new(messages::strategy_unsubscribed(token)))
            }
            Route::Ohlc(interval) => {
                let token = self.ohlc_token(request)?;
                if !self.ohlc_stream.is_open() {
                    return Ok(StreamResponse::new(messages::OHLCV_STREAM_NOT_CONNECTED));
                }
                self.ohlc_stream.unwatch_stream_data(&token, interval).await?;
                Ok(StreamResponse::new(messages::stock_unsubscribed(request.subject())))
            }
            Route::RateRefresh => {
                let tokens = self.stream_tokens(request)?;
                self.rate_refresh.unwatch(&tokens).await?;
                Ok(StreamResponse::new(messages::stock_unsubscribed(request.subject())))
            }
        }
    }

    /// Disconnect every channel, reporting each one.
    pub async fn ws_disconnect(&self) -> Result<Vec<StreamResponse>> {
        let pairs = [
            (
                &self.rate_refresh,
                messages::RATE_REFRESH_DISCONNECTED,
                messages::RATE_REFRESH_NOT_CONNECTED,
            ),
            (
                &self.ohlc_stream,
                messages::OHLCV_STREAM_DISCONNECTED,
                messages::OHLCV_STREAM_NOT_CONNECTED,
            ),
            (
                &self.order_refresh,
                messages::ORDER_REFRESH_DISCONNECTED,
                messages::ORDER_REFRESH_NOT_CONNECTED,
            ),
        ];

        let mut responses = Vec::with_capacity(pairs.len());
        for (channel, done, idle) in pairs {
            let was_connected = self.teardown(channel).await?;
            responses.push(StreamResponse::new(if was_connected { done } else { idle }));
        }
        Ok(responses)
    }

    /// Disconnect the OHLC channel (and the rate-refresh channel with it).
    pub async fn ws_disconnect_ohlc(&self) -> Result<StreamResponse> {
        self.teardown(&self.rate_refresh).await?;
        Ok(StreamResponse::new(if self.teardown(&self.ohlc_stream).await? {
            messages::OHLCV_STREAM_DISCONNECTED
        } else {
            messages::OHLCV_STREAM_NOT_CONNECTED
        }))
    }

    /// Replay rate-refresh subscriptions after a reconnect.
    pub async fn rewatch(&self) -> Result<usize> {
        self.rate_refresh.rewatch().await
    }

    /// Replay OHLC rooms after a reconnect.
    pub async fn rewatch_ohlc(&self) -> Result<usize> {
        self.ohlc_stream.rewatch_ohlc().await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Disconnect a channel. Returns whether it had been connected.
    async fn teardown(&self, channel: &ChannelConnection) -> Result<bool> {
        let was_connected = channel.state() != ConnectionState::Disconnected;
        channel.disconnect().await?;
        Ok(was_connected)
    }

    /// Channel ids to join on the rate-refresh channel.
    fn stream_tokens(&self, request: &FeedRequest) -> Result<Vec<String>> {
        if let Some(token) = request.stock_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(vec![token.to_owned()]);
        }
        let key = request
            .instrument
            .as_ref()
            .ok_or(ValidationError::MissingField("stock_code"))?;
        let ids = codec::channel_ids(
            &self.registry,
            key,
            request.get_exchange_quotes,
            request.get_market_depth,
            false,
        )?;
        Ok(ids.ids().map(ToString::to_string).collect())
    }

    /// Room token for an OHLC request: the raw token, or the instrument's
    /// quote channel id with the OHLC exchange id.
    fn ohlc_token(&self, request: &FeedRequest) -> Result<String> {
        if let Some(token) = request.stock_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_owned());
        }
        let key = request
            .instrument
            .as_ref()
            .ok_or(ValidationError::MissingField("stock_code"))?;
        let ids = codec::channel_ids(&self.registry, key, true, false, true)?;
        ids.quote
            .map(|id| id.to_string())
            .ok_or_else(|| ValidationError::QuoteOrDepthRequired.into())
    }
}
