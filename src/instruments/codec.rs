//! Composite contract strings and stream symbols.
//!
//! Derivative partitions of the security master are keyed by a composite
//! string:
//!
//! ```text
//! FUT-<SYMBOL>-<DD-Mon-YYYY>
//! OPT-<SYMBOL>-<DD-Mon-YYYY>-<STRIKE>-<CE|PE>
//! ```
//!
//! Cash partitions use the short symbol as is. Inbound quote and depth
//! frames carry a stream symbol (`4.1!2885`) that is resolved back to
//! [`InstrumentMetadata`] through the [`TokenRegistry`].
//!
//! Everything here is pure apart from the registry reads.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{BreezeError, Result, ValidationError};
use crate::instruments::registry::TokenRegistry;
use crate::types::enums::{Exchange, OptionRight, ProductType, StreamKind};
use crate::types::instrument::{InstrumentKey, InstrumentMetadata, SubscriptionChannelId};

/// Expiry format used inside composite strings (`25-Jan-2024`).
const EXPIRY_FORMAT: &str = "%d-%b-%Y";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Build the registry lookup key for an instrument.
///
/// Cash keys on NSE/BSE return the symbol. Everything else needs a futures
/// or options product type and an expiry; options also need a strike and a
/// call/put right.
pub fn encode(key: &InstrumentKey) -> Result<String> {
    let symbol = key.stock_code.trim();
    if symbol.is_empty() {
        return Err(ValidationError::MissingField("stock_code").into());
    }

    if !key.exchange.is_derivative() && !key.is_derivative() {
        return Ok(symbol.to_owned());
    }

    let expiry = key
        .expiry_date
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or(ValidationError::MissingField("expiry_date"))?;

    let product = match key.product_type {
        Some(p @ (ProductType::Futures | ProductType::Options)) => p,
        Some(ProductType::Cash) => {
            return Err(ValidationError::InvalidField {
                field: "product_type",
                value: ProductType::Cash.label().to_owned(),
            }
            .into());
        }
        None => return Err(ValidationError::MissingField("product_type").into()),
    };

    let expiry = normalize_expiry(expiry)?;
    let prefix = product.contract_code().unwrap_or_default();

    if product == ProductType::Futures {
        return Ok(format!("{prefix}-{symbol}-{expiry}"));
    }

    let strike = key
        .strike_price
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("strike_price"))?;

    let right = key.right.ok_or(ValidationError::MissingField("right"))?;
    let right_code = right.code().ok_or_else(|| ValidationError::InvalidField {
        field: "right",
        value: right.label().to_owned(),
    })?;

    Ok(format!("{prefix}-{symbol}-{expiry}-{strike}-{right_code}"))
}

/// Normalise an expiry to `DD-Mon-YYYY`.
///
/// Accepts `25-Jan-2024` (any month case), `2024-01-25`, and ISO-8601
/// datetimes such as `2024-01-25T06:00:00.000Z`.
pub fn normalize_expiry(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, EXPIRY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .ok_or_else(|| ValidationError::InvalidField {
            field: "expiry_date",
            value: raw.to_owned(),
        })?;

    Ok(date.format(EXPIRY_FORMAT).to_string())
}

/// Check that a security-master contract code is a well-formed composite
/// string. Returns the reason on failure.
pub(crate) fn validate_contract(code: &str) -> std::result::Result<(), String> {
    let parts: Vec<&str> = code.split('-').collect();
    let n = parts.len();
    let (symbol, expiry_parts) = match ProductType::from_contract_code(parts[0]) {
        Some(ProductType::Futures) if n >= 5 => (&parts[1..n - 3], &parts[n - 3..]),
        Some(ProductType::Options) if n >= 7 => (&parts[1..n - 5], &parts[n - 5..n - 2]),
        Some(_) => return Err(format!("truncated contract code {code:?}")),
        None => return Err(format!("unknown contract prefix in {code:?}")),
    };
    if symbol.iter().all(|s| s.is_empty()) {
        return Err(format!("missing symbol in contract code {code:?}"));
    }

    let expiry = expiry_parts.join("-");
    NaiveDate::parse_from_str(&expiry, EXPIRY_FORMAT)
        .map(|_| ())
        .map_err(|_| format!("invalid expiry {expiry:?} in contract code {code:?}"))
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Recover product type, symbol, expiry, strike and right from a composite
/// string.
///
/// Parsing runs from the right so hyphenated symbols survive. Unknown
/// right codes leave `right` unset rather than failing.
pub fn decode_composite(s: &str) -> InstrumentMetadata {
    let parts: Vec<&str> = s.split('-').collect();
    let product = ProductType::from_contract_code(parts[0]);
    let n = parts.len();

    let mut meta = InstrumentMetadata {
        product_type: product.map(|p| p.label().to_owned()),
        ..Default::default()
    };

    let (symbol, expiry, tail) = match product {
        Some(ProductType::Futures) if n >= 5 => (&parts[1..n - 3], &parts[n - 3..], &[][..]),
        Some(ProductType::Options) if n >= 7 => {
            (&parts[1..n - 5], &parts[n - 5..n - 2], &parts[n - 2..])
        }
        // Short or unprefixed strings: take whatever sits at the usual positions.
        _ => (
            parts.get(1..2).unwrap_or_default(),
            parts.get(2..n.min(5)).unwrap_or_default(),
            parts.get(5..n.min(7)).unwrap_or_default(),
        ),
    };

    if !symbol.is_empty() {
        meta.stock_code = Some(symbol.join("-"));
    }
    if !expiry.is_empty() {
        meta.expiry_date = Some(expiry.join("-"));
    }
    if let Some(strike) = tail.first() {
        meta.strike_price = Some((*strike).to_owned());
    }
    meta.right = tail
        .get(1)
        .and_then(|code| OptionRight::from_code(code))
        .map(|r| r.label().to_owned());

    meta
}

/// Split a stream symbol into `(exchange id, stream type, token)`.
///
/// Accepts the channel-id form `4.1!2885` and the short form `4!1`, which
/// carries no token.
pub fn split_stream_symbol(symbol: &str) -> Option<(&str, &str, Option<&str>)> {
    let (head, tail) = symbol.split_once('!')?;
    match head.split_once('.') {
        Some((exchange, stream)) => Some((exchange, stream, Some(tail))),
        None => Some((head, tail, None)),
    }
}

/// Resolve an inbound stream symbol to instrument metadata.
///
/// NSE tokens missing from the NSE partition are looked up in NFO, and the
/// result then reports `exchange_code = "NFO"`.
pub fn parse_stream_symbol(registry: &TokenRegistry, symbol: &str) -> Result<InstrumentMetadata> {
    let unknown_exchange = || BreezeError::UnknownExchange(symbol.to_owned());

    let (exchange_id, _stream, token) = split_stream_symbol(symbol).ok_or_else(unknown_exchange)?;
    let exchange = Exchange::from_stream_id(exchange_id).ok_or_else(unknown_exchange)?;
    let unknown_instrument = || BreezeError::UnknownInstrument {
        exchange: exchange.code().to_owned(),
        token: symbol.to_owned(),
    };

    let token = token.filter(|t| !t.is_empty()).ok_or_else(unknown_instrument)?;
    let (partition, entry) = registry
        .resolve_token(exchange, token)
        .ok_or_else(unknown_instrument)?;

    let mut meta = if partition.is_derivative() {
        decode_composite(&entry.composite)
    } else {
        InstrumentMetadata {
            stock_code: Some(entry.composite.clone()),
            ..Default::default()
        }
    };
    meta.exchange_code = Some(partition.code().to_owned());
    meta.stock_name = Some(entry.display_name);
    Ok(meta)
}

// ---------------------------------------------------------------------------
// Channel ids
// ---------------------------------------------------------------------------

/// Quote and depth channel ids for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChannels {
    pub quote: Option<SubscriptionChannelId>,
    pub depth: Option<SubscriptionChannelId>,
}

impl StreamChannels {
    /// Channel ids in join order (quote first).
    pub fn ids(&self) -> impl Iterator<Item = &SubscriptionChannelId> {
        self.quote.iter().chain(self.depth.iter())
    }
}

/// Resolve an instrument into the channel ids to join.
///
/// `ohlc` selects the BFO exchange id used by the OHLC stream.
pub fn channel_ids(
    registry: &TokenRegistry,
    key: &InstrumentKey,
    quotes: bool,
    depth: bool,
    ohlc: bool,
) -> Result<StreamChannels> {
    if !quotes && !depth {
        return Err(ValidationError::QuoteOrDepthRequired.into());
    }

    let composite = encode(key)?;
    let resolved = registry
        .lookup(key)
        .ok_or_else(|| BreezeError::UnknownInstrument {
            exchange: key.exchange.code().to_owned(),
            token: composite,
        })?;

    let exchange_id = resolved.exchange.stream_id(ohlc);
    let make = |stream| SubscriptionChannelId {
        exchange_id,
        stream,
        token: resolved.token.clone(),
    };

    Ok(StreamChannels {
        quote: quotes.then(|| make(StreamKind::Quote)),
        depth: depth.then(|| make(StreamKind::Depth)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "\
ShortName,DisplayName,ExchangeCode,Symbol,Series,Token,Lot,ContractCode
1,RELIANCE INDUSTRIES,NSE,RELIND,EQ,2885,1,
2,NIFTY 25JAN24 FUT,NFO,,FUT,35001,50,FUT-NIFTY-25-Jan-2024
3,NIFTY 25JAN24 21000 CE,NFO,,OPT,35002,50,OPT-NIFTY-25-Jan-2024-21000-CE
4,SENSEX 26JAN24 FUT,BFO,,FUT,800001,10,FUT-SENSEX-26-Jan-2024
";

    fn registry() -> TokenRegistry {
        TokenRegistry::from_csv(MASTER).unwrap()
    }

    #[test]
    fn cash_encodes_to_symbol() {
        let key = InstrumentKey::cash(Exchange::Nse, "RELIND");
        assert_eq!(encode(&key).unwrap(), "RELIND");
    }

    #[test]
    fn option_encodes_with_normalised_expiry() {
        let key = InstrumentKey::option(
            Exchange::Nfo,
            "NIFTY",
            "2024-01-25T06:00:00.000Z",
            "21000",
            OptionRight::Call,
        );
        assert_eq!(encode(&key).unwrap(), "OPT-NIFTY-25-Jan-2024-21000-CE");
    }

    #[test]
    fn missing_fields_are_named() {
        let mut key = InstrumentKey::future(Exchange::Nfo, "NIFTY", "25-Jan-2024");
        key.expiry_date = None;
        assert!(matches!(
            encode(&key),
            Err(BreezeError::Validation(ValidationError::MissingField("expiry_date")))
        ));

        let mut key = InstrumentKey::option(
            Exchange::Nfo,
            "NIFTY",
            "25-Jan-2024",
            "1",
            OptionRight::Put,
        );
        key.strike_price = None;
        assert!(matches!(
            encode(&key),
            Err(BreezeError::Validation(ValidationError::MissingField("strike_price")))
        ));

        let key = InstrumentKey::option(
            Exchange::Nfo,
            "NIFTY",
            "25-Jan-2024",
            "1",
            OptionRight::Others,
        );
        assert!(matches!(
            encode(&key),
            Err(BreezeError::Validation(ValidationError::InvalidField { field: "right", .. }))
        ));

        let key = InstrumentKey::cash(Exchange::Nse, "  ");
        assert!(matches!(
            encode(&key),
            Err(BreezeError::Validation(ValidationError::MissingField("stock_code")))
        ));
    }

    #[test]
    fn encode_then_decode_recovers_contract_fields() {
        let key = InstrumentKey::option(
            Exchange::Nfo,
            "BAJAJ-AUTO",
            "2024-01-25",
            "7500",
            OptionRight::Put,
        );
        let meta = decode_composite(&encode(&key).unwrap());

        assert_eq!(meta.product_type.as_deref(), Some("Options"));
        assert_eq!(meta.stock_code.as_deref(), Some("BAJAJ-AUTO"));
        assert_eq!(meta.expiry_date.as_deref(), Some("25-Jan-2024"));
        assert_eq!(meta.strike_price.as_deref(), Some("7500"));
        assert_eq!(meta.right.as_deref(), Some("Put"));
    }

    #[test]
    fn unknown_right_code_is_left_unset() {
        let meta = decode_composite("OPT-NIFTY-25-Jan-2024-21000-XX");
        assert_eq!(meta.strike_price.as_deref(), Some("21000"));
        assert!(meta.right.is_none());
    }

    #[test]
    fn contract_validation() {
        assert!(validate_contract("FUT-NIFTY-25-Jan-2024").is_ok());
        assert!(validate_contract("OPT-NIFTY-25-Jan-2024-21000-CE").is_ok());
        assert!(validate_contract("FUT-NIFTY-2024-01-25").is_err());
        assert!(validate_contract("SWP-NIFTY-25-Jan-2024").is_err());
        assert!(validate_contract("OPT-NIFTY-25-Jan-2024").is_err());
    }

    #[test]
    fn stream_symbol_resolves_cash_and_falls_back_to_nfo() {
        let registry = registry();

        let cash = parse_stream_symbol(&registry, "4.1!2885").unwrap();
        assert_eq!(cash.exchange_code.as_deref(), Some("NSE"));
        assert_eq!(cash.stock_code.as_deref(), Some("RELIND"));
        assert_eq!(cash.stock_name.as_deref(), Some("RELIANCE INDUSTRIES"));
        assert!(cash.product_type.is_none());

        let fno = parse_stream_symbol(&registry, "4.2!35002").unwrap();
        assert_eq!(fno.exchange_code.as_deref(), Some("NFO"));
        assert_eq!(fno.product_type.as_deref(), Some("Options"));
        assert_eq!(fno.right.as_deref(), Some("Call"));
    }

    #[test]
    fn stream_symbol_errors() {
        let registry = registry();
        assert!(matches!(
            parse_stream_symbol(&registry, "99.1!2885"),
            Err(BreezeError::UnknownExchange(_))
        ));
        assert!(matches!(
            parse_stream_symbol(&registry, "no-separator"),
            Err(BreezeError::UnknownExchange(_))
        ));
        match parse_stream_symbol(&registry, "1.1!424242") {
            Err(BreezeError::UnknownInstrument { exchange, token }) => {
                assert_eq!(exchange, "BSE");
                assert_eq!(token, "1.1!424242");
            }
            other => panic!("expected UnknownInstrument, got {other:?}"),
        }
        assert!(matches!(
            parse_stream_symbol(&registry, "4!1"),
            Err(BreezeError::UnknownInstrument { .. })
        ));
    }

    #[test]
    fn channel_ids_for_quotes_and_depth() {
        let registry = registry();
        let key = InstrumentKey::cash(Exchange::Nse, "RELIND");
        let ids = channel_ids(&registry, &key, true, true, false).unwrap();
        let rendered: Vec<String> = ids.ids().map(ToString::to_string).collect();
        assert_eq!(rendered, ["4.1!2885", "4.2!2885"]);
    }

    #[test]
    fn nse_derivative_key_resolves_through_nfo() {
        let registry = registry();
        let key = InstrumentKey::future(Exchange::Nse, "NIFTY", "25-Jan-2024");
        let ids = channel_ids(&registry, &key, true, false, false).unwrap();
        assert_eq!(ids.quote.unwrap().to_string(), "4.1!35001");
        assert!(ids.depth.is_none());
    }

    #[test]
    fn bfo_exchange_id_depends_on_ohlc() {
        let registry = registry();
        let key = InstrumentKey::future(Exchange::Bfo, "SENSEX", "26-Jan-2024");
        let live = channel_ids(&registry, &key, true, false, false).unwrap();
        let ohlc = channel_ids(&registry, &key, true, false, true).unwrap();
        assert_eq!(live.quote.unwrap().to_string(), "8.1!800001");
        assert_eq!(ohlc.quote.unwrap().to_string(), "2.1!800001");
    }

    #[test]
    fn neither_quotes_nor_depth_is_rejected() {
        let registry = registry();
        let key = InstrumentKey::cash(Exchange::Nse, "RELIND");
        assert!(matches!(
            channel_ids(&registry, &key, false, false, false),
            Err(BreezeError::Validation(ValidationError::QuoteOrDepthRequired))
        ));
    }

    #[test]
    fn unknown_instrument_reports_composite() {
        let registry = registry();
        let key = InstrumentKey::cash(Exchange::Bse, "NOPE");
        assert!(matches!(
            channel_ids(&registry, &key, true, false, false),
            Err(BreezeError::UnknownInstrument { .. })
        ));
    }
}
