//! Constants for the Breeze streaming API.
//!
//! Contains base URLs, socket endpoints, the strategy-subscription allow-list
//! and the order-event code tables. These are used internally by
//! [`BreezeClient`](crate::client::BreezeClient) and the WebSocket channel
//! types, but are also exported for advanced usage.

// ---------------------------------------------------------------------------
// Base URLs
// ---------------------------------------------------------------------------

/// Base URL for the Breeze REST API (customer details lives here).
pub const API_BASE_URL: &str = "https://api.icicidirect.com/breezeapi/api/v1";

/// Daily security-master CSV used to build the token registry.
pub const STOCK_SCRIPT_CSV_URL: &str =
    "https://traderweb.icicidirect.com/Content/File/txtFile/ScripFile/StockScriptNew.csv";

// ---------------------------------------------------------------------------
// WebSocket URLs
// ---------------------------------------------------------------------------

/// Socket endpoint for live quotes and market depth (rate refresh).
pub const LIVE_STREAM_URL: &str = "wss://livestream.icicidirect.com";

/// Socket endpoint for order notifications and strategy streams.
pub const LIVE_FEEDS_URL: &str = "wss://livefeeds.icicidirect.com";

/// Socket endpoint for OHLC bar streaming.
pub const LIVE_OHLC_STREAM_URL: &str = "wss://breezeapi.icicidirect.com";

// ---------------------------------------------------------------------------
// Stream tables
// ---------------------------------------------------------------------------

/// Stock tokens that route to the strategy stream on the order channel.
pub const STRATEGY_SUBSCRIPTION: &[&str] = &["one_click_fno", "i_click_2_gain"];

/// Code → label tables applied to order-event fields.
///
/// An unknown code maps to an empty label.
pub mod order_codes {
    /// Buy / sell flow.
    pub const ORDER_FLOW: &[(&str, &str)] = &[("B", "Buy"), ("S", "Sell"), ("N", "NA")];

    /// Limit / market / stop-loss flag.
    pub const LIMIT_MARKET_FLAG: &[(&str, &str)] =
        &[("L", "Limit"), ("M", "Market"), ("S", "StopLoss")];

    /// Order validity type.
    pub const ORDER_TYPE: &[(&str, &str)] = &[("T", "Day"), ("I", "IoC"), ("V", "VTC")];

    /// Product type.
    pub const PRODUCT_TYPE: &[(&str, &str)] = &[
        ("F", "Futures"),
        ("O", "Options"),
        ("P", "FuturePlus"),
        ("U", "FuturePlus_sltp"),
        ("I", "OptionPlus"),
        ("C", "Cash"),
        ("Y", "eATM"),
        ("B", "BTST"),
        ("M", "Margin"),
        ("T", "MarginPlus"),
    ];

    /// Order status.
    pub const ORDER_STATUS: &[(&str, &str)] = &[
        ("A", "All"),
        ("R", "Requested"),
        ("Q", "Queued"),
        ("O", "Ordered"),
        ("P", "Partially Executed"),
        ("E", "Executed"),
        ("J", "Rejected"),
        ("X", "Expired"),
        ("B", "Partially Executed And Expired"),
        ("D", "Partially Executed And Cancelled"),
        ("F", "Freezed"),
        ("C", "Cancelled"),
    ];

    /// Look a code up in one of the tables above.
    pub fn label(table: &[(&str, &'static str)], code: &str) -> &'static str {
        table
            .iter()
            .find(|(c, _)| *c == code)
            .map_or("", |(_, label)| *label)
    }
}

// ---------------------------------------------------------------------------
// Response messages
// ---------------------------------------------------------------------------

/// Human-readable messages returned by the subscription facade.
pub mod messages {
    pub const RATE_REFRESH_DISCONNECTED: &str = "Rate refresh socket disconnected successfully";
    pub const RATE_REFRESH_NOT_CONNECTED: &str = "Rate refresh socket is not connected";
    pub const OHLCV_STREAM_DISCONNECTED: &str = "OHLCV stream socket disconnected successfully";
    pub const OHLCV_STREAM_NOT_CONNECTED: &str = "OHLCV stream socket is not connected";
    pub const ORDER_REFRESH_DISCONNECTED: &str = "Order refresh socket disconnected successfully";
    pub const ORDER_REFRESH_NOT_CONNECTED: &str = "Order refresh socket is not connected";
    pub const ORDER_NOTIFICATION_SUBSCRIBED: &str = "Order notification subscribed successfully";
    pub const STRATEGY_STREAM_NOT_CONNECTED: &str = "Strategy stream socket is not connected";

    pub fn stock_subscribed(subject: &str) -> String {
        format!("Stock {subject} subscribed successfully")
    }

    pub fn stock_unsubscribed(subject: &str) -> String {
        format!("Stock {subject} unsubscribed successfully")
    }

    pub fn strategy_subscribed(token: &str) -> String {
        format!("Strategy stream subscribed for {token}")
    }

    pub fn strategy_unsubscribed(token: &str) -> String {
        format!("Strategy stream unsubscribed for {token}")
    }
}
