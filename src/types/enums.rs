//! Shared enum types that map directly to Breeze API string values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BreezeError, ValidationError};

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// Exchange partition of the security master.
///
/// Each variant owns an independent symbol ↔ token index in the
/// [`TokenRegistry`](crate::instruments::TokenRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// BSE cash.
    Bse,
    /// NSE cash.
    Nse,
    /// NSE currency derivatives.
    Ndx,
    /// MCX commodities.
    Mcx,
    /// NSE futures & options.
    Nfo,
    /// BSE futures & options.
    Bfo,
}

impl Exchange {
    /// All six partitions, in security-master order.
    pub const ALL: [Exchange; 6] = [
        Self::Bse,
        Self::Nse,
        Self::Ndx,
        Self::Mcx,
        Self::Nfo,
        Self::Bfo,
    ];

    /// Exchange code as it appears in the security master (`"NSE"`).
    pub fn code(self) -> &'static str {
        match self {
            Self::Bse => "BSE",
            Self::Nse => "NSE",
            Self::Ndx => "NDX",
            Self::Mcx => "MCX",
            Self::Nfo => "NFO",
            Self::Bfo => "BFO",
        }
    }

    /// Whether the partition is keyed by composite contract strings rather
    /// than plain symbols.
    pub fn is_derivative(self) -> bool {
        !matches!(self, Self::Bse | Self::Nse)
    }

    /// Numeric exchange id used in stream symbols.
    ///
    /// BFO is published under `2` on the OHLC stream and `8` on the
    /// rate-refresh stream, so the caller states which one it is building for.
    pub fn stream_id(self, ohlc: bool) -> &'static str {
        match self {
            Self::Bse => "1",
            Self::Nse | Self::Nfo => "4",
            Self::Ndx => "13",
            Self::Mcx => "6",
            Self::Bfo if ohlc => "2",
            Self::Bfo => "8",
        }
    }

    /// Resolve the numeric id found at the head of a stream symbol.
    ///
    /// `4` resolves to NSE; the registry falls back to NFO on a miss.
    pub fn from_stream_id(id: &str) -> Option<Self> {
        match id {
            "1" => Some(Self::Bse),
            "4" => Some(Self::Nse),
            "13" => Some(Self::Ndx),
            "6" => Some(Self::Mcx),
            "2" | "8" => Some(Self::Bfo),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Exchange {
    type Err = BreezeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BreezeError::UnknownExchange(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Product Type
// ---------------------------------------------------------------------------

/// Product type of a streamed instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Futures,
    Options,
    /// Cash / equity.
    Cash,
}

impl ProductType {
    /// Leading segment of a composite contract string.
    pub fn contract_code(self) -> Option<&'static str> {
        match self {
            Self::Futures => Some("FUT"),
            Self::Options => Some("OPT"),
            Self::Cash => None,
        }
    }

    /// Display label used in instrument metadata.
    pub fn label(self) -> &'static str {
        match self {
            Self::Futures => "Futures",
            Self::Options => "Options",
            Self::Cash => "Cash",
        }
    }

    /// Inverse of [`contract_code`](Self::contract_code).
    pub fn from_contract_code(code: &str) -> Option<Self> {
        match code {
            "FUT" => Some(Self::Futures),
            "OPT" => Some(Self::Options),
            _ => None,
        }
    }
}

impl FromStr for ProductType {
    type Err = BreezeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "futures" => Ok(Self::Futures),
            "options" => Ok(Self::Options),
            "cash" | "equity" => Ok(Self::Cash),
            _ => Err(ValidationError::InvalidField {
                field: "product_type",
                value: s.to_owned(),
            }
            .into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Option Right
// ---------------------------------------------------------------------------

/// Option right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
    /// Neither call nor put; not accepted for option subscriptions.
    Others,
}

impl OptionRight {
    /// Two-letter code used in composite contract strings.
    pub fn code(self) -> Option<&'static str> {
        match self {
            Self::Call => Some("CE"),
            Self::Put => Some("PE"),
            Self::Others => None,
        }
    }

    /// Decode a composite right code. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "CE" => Some(Self::Call),
            "PE" => Some(Self::Put),
            _ => None,
        }
    }

    /// Display label used in instrument metadata.
    pub fn label(self) -> &'static str {
        match self {
            Self::Call => "Call",
            Self::Put => "Put",
            Self::Others => "Others",
        }
    }
}

impl FromStr for OptionRight {
    type Err = BreezeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            "others" | "other" => Ok(Self::Others),
            _ => Err(ValidationError::InvalidField {
                field: "right",
                value: s.to_owned(),
            }
            .into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel Kind
// ---------------------------------------------------------------------------

/// The three independent socket channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Live quotes and market depth.
    RateRefresh,
    /// OHLC bar aggregates.
    OhlcStream,
    /// Order notifications and strategy streams.
    OrderRefresh,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RateRefresh => "rate-refresh",
            Self::OhlcStream => "ohlc-stream",
            Self::OrderRefresh => "order-refresh",
        })
    }
}

// ---------------------------------------------------------------------------
// Stream Kind
// ---------------------------------------------------------------------------

/// Stream suffix of a subscription channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamKind {
    /// Top-of-book quote stream.
    Quote = 1,
    /// Market-depth stream.
    Depth = 2,
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// OHLC stream interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    OneSecond,
    OneMinute,
    FiveMinute,
    ThirtyMinute,
}

impl Interval {
    /// Caller-facing label (`"1minute"`).
    pub fn label(self) -> &'static str {
        match self {
            Self::OneSecond => "1second",
            Self::OneMinute => "1minute",
            Self::FiveMinute => "5minute",
            Self::ThirtyMinute => "30minute",
        }
    }

    /// Wire channel code (`"1MIN"`).
    pub fn channel_code(self) -> &'static str {
        match self {
            Self::OneSecond => "1SEC",
            Self::OneMinute => "1MIN",
            Self::FiveMinute => "5MIN",
            Self::ThirtyMinute => "30MIN",
        }
    }

    /// Inverse of [`channel_code`](Self::channel_code).
    pub fn from_channel_code(code: &str) -> Option<Self> {
        match code {
            "1SEC" => Some(Self::OneSecond),
            "1MIN" => Some(Self::OneMinute),
            "5MIN" => Some(Self::FiveMinute),
            "30MIN" => Some(Self::ThirtyMinute),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interval {
    type Err = BreezeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1second" => Ok(Self::OneSecond),
            "1minute" => Ok(Self::OneMinute),
            "5minute" => Ok(Self::FiveMinute),
            "30minute" => Ok(Self::ThirtyMinute),
            other => Err(BreezeError::InvalidInterval(other.to_owned())),
        }
    }
}
