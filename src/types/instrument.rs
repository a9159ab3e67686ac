//! Instrument identity types shared by the registry, codec and channels.

use std::fmt;

use serde::Serialize;

use crate::types::enums::{Exchange, OptionRight, ProductType, StreamKind};

// ---------------------------------------------------------------------------
// Instrument key
// ---------------------------------------------------------------------------

/// Human-facing identity of an instrument.
///
/// Cash keys carry only the exchange and symbol. Futures additionally need an
/// expiry; options need expiry, strike and right.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentKey {
    /// Exchange partition.
    pub exchange: Exchange,
    /// Short symbol (`"NIFTY"`, `"RELIND"`).
    pub stock_code: String,
    /// Product type; `None` is treated as cash.
    pub product_type: Option<ProductType>,
    /// Expiry date (`25-Jan-2024`, `2024-01-25` or an ISO-8601 datetime).
    pub expiry_date: Option<String>,
    /// Strike price as published (`"21000"`).
    pub strike_price: Option<String>,
    /// Option right.
    pub right: Option<OptionRight>,
}

impl InstrumentKey {
    /// A cash / equity instrument.
    pub fn cash(exchange: Exchange, stock_code: impl Into<String>) -> Self {
        Self {
            exchange,
            stock_code: stock_code.into(),
            product_type: Some(ProductType::Cash),
            expiry_date: None,
            strike_price: None,
            right: None,
        }
    }

    /// A futures contract.
    pub fn future(
        exchange: Exchange,
        stock_code: impl Into<String>,
        expiry_date: impl Into<String>,
    ) -> Self {
        Self {
            exchange,
            stock_code: stock_code.into(),
            product_type: Some(ProductType::Futures),
            expiry_date: Some(expiry_date.into()),
            strike_price: None,
            right: None,
        }
    }

    /// An options contract.
    pub fn option(
        exchange: Exchange,
        stock_code: impl Into<String>,
        expiry_date: impl Into<String>,
        strike_price: impl Into<String>,
        right: OptionRight,
    ) -> Self {
        Self {
            exchange,
            stock_code: stock_code.into(),
            product_type: Some(ProductType::Options),
            expiry_date: Some(expiry_date.into()),
            strike_price: Some(strike_price.into()),
            right: Some(right),
        }
    }

    /// Whether this key names a futures or options contract.
    pub fn is_derivative(&self) -> bool {
        matches!(
            self.product_type,
            Some(ProductType::Futures | ProductType::Options)
        )
    }
}

// ---------------------------------------------------------------------------
// Instrument metadata
// ---------------------------------------------------------------------------

/// Instrument details recovered from a wire token, merged into decoded ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstrumentMetadata {
    /// Partition the token was found in (`"NSE"`, or `"NFO"` after fallback).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_code: Option<String>,
    /// Display name from the security master.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_name: Option<String>,
    /// Short symbol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<String>,
    /// `"Futures"` or `"Options"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    /// Expiry in `DD-Mon-YYYY` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_price: Option<String>,
    /// `"Call"` or `"Put"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
}

// ---------------------------------------------------------------------------
// Subscription channel id
// ---------------------------------------------------------------------------

/// Stream symbol of the form `<exchangeId>.<stream>!<token>`.
///
/// Used both as the join/leave payload and as the leading field of inbound
/// quote and depth frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionChannelId {
    /// Numeric exchange id (`"4"`).
    pub exchange_id: &'static str,
    /// Quote or depth stream.
    pub stream: StreamKind,
    /// Wire token from the security master.
    pub token: String,
}

impl fmt::Display for SubscriptionChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}!{}", self.exchange_id, self.stream as u8, self.token)
    }
}

// ---------------------------------------------------------------------------
// Session credentials
// ---------------------------------------------------------------------------

/// Opaque credentials produced by the session bootstrap and presented in the
/// socket authentication frame.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Breeze user id.
    pub user_id: String,
    /// Session key.
    pub session_key: String,
}

impl SessionCredentials {
    pub fn new(user_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_key: session_key.into(),
        }
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("user_id", &self.user_id)
            .field("session_key", &"<redacted>")
            .finish()
    }
}
