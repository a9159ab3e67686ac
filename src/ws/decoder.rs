//! Positional frame decoder for the Breeze streams.
//!
//! Breeze frames are flat JSON arrays whose meaning depends on the leading
//! symbol and the array length. Decoding is driven by static schema tables:
//! each [`Field`] names one output key, the array index it is read from and
//! an optional conversion. Adding a frame shape is a table edit.
//!
//! | Leading element          | Length | Record                           |
//! |--------------------------|--------|----------------------------------|
//! | plain string (no `!`)    | 19     | [`RecordKind::RecommendationAlert`] |
//! | plain string             | 28     | [`RecordKind::StrategyLeg`]      |
//! | plain string             | 42     | [`RecordKind::OrderEventV1`]     |
//! | plain string             | 43     | [`RecordKind::OrderEventV2`]     |
//! | exchange `6`             | ≥ 22   | [`RecordKind::CommodityQuote`]   |
//! | stream `1`               | 21     | [`RecordKind::EquityQuote`]      |
//! | stream `1`               | 23     | [`RecordKind::DerivativeQuote`]  |
//! | any other stream         | 3      | [`RecordKind::MarketDepth`]      |
//!
//! OHLC bars arrive as comma-separated text instead; see [`decode_ohlc`].
//!
//! The decoder is a pure function of its input. Instrument enrichment happens
//! in the connection layer.

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::order_codes::{
    self, LIMIT_MARKET_FLAG, ORDER_FLOW, ORDER_STATUS, ORDER_TYPE, PRODUCT_TYPE,
};
use crate::error::{BreezeError, Result};
use crate::instruments::codec::split_stream_symbol;
use crate::types::enums::Interval;
use crate::types::instrument::InstrumentMetadata;

/// Generic field mapping delivered to tick handlers.
pub type Fields = Map<String, Value>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Shape of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    EquityQuote,
    DerivativeQuote,
    MarketDepth,
    CommodityQuote,
    OhlcBar,
    OrderEventV1,
    OrderEventV2,
    StrategyLeg,
    RecommendationAlert,
}

impl RecordKind {
    /// Quote, depth and commodity frames carry a stream symbol that can be
    /// resolved to instrument metadata.
    pub fn is_tick(self) -> bool {
        matches!(
            self,
            Self::EquityQuote | Self::DerivativeQuote | Self::MarketDepth | Self::CommodityQuote
        )
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    /// Which schema produced the record.
    pub kind: RecordKind,
    /// Named fields.
    pub fields: Fields,
}

impl DecodedRecord {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: Fields::new(),
        }
    }

    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Leading stream symbol of tick records.
    pub fn symbol(&self) -> Option<&str> {
        self.fields.get("symbol").and_then(Value::as_str)
    }

    /// Merge resolved instrument details into the record. Existing keys with
    /// the same name are overwritten.
    pub fn merge_metadata(&mut self, meta: &InstrumentMetadata) {
        let pairs = [
            ("exchange_code", &meta.exchange_code),
            ("stock_name", &meta.stock_name),
            ("stock_code", &meta.stock_code),
            ("product_type", &meta.product_type),
            ("expiry_date", &meta.expiry_date),
            ("strike_price", &meta.strike_price),
            ("right", &meta.right),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                self.fields.insert(key.to_owned(), Value::String(value.clone()));
            }
        }
    }

    fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }
}

// ---------------------------------------------------------------------------
// Schema tables
// ---------------------------------------------------------------------------

type CodeTable = &'static [(&'static str, &'static str)];

#[derive(Debug, Clone, Copy)]
enum Conv {
    Raw,
    /// Epoch seconds → RFC 3339 UTC.
    Epoch,
    /// Code → label; unknown codes become `""`.
    Code(CodeTable),
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    index: usize,
    conv: Conv,
}

const fn raw(name: &'static str, index: usize) -> Field {
    Field {
        name,
        index,
        conv: Conv::Raw,
    }
}

const fn epoch(name: &'static str, index: usize) -> Field {
    Field {
        name,
        index,
        conv: Conv::Epoch,
    }
}

const fn code(name: &'static str, index: usize, table: CodeTable) -> Field {
    Field {
        name,
        index,
        conv: Conv::Code(table),
    }
}

const RECOMMENDATION_ALERT: &[Field] = &[
    raw("stock_name", 0),
    raw("stock_code", 1),
    raw("action_type", 2),
    raw("expiry_date", 3),
    raw("strike_price", 4),
    raw("option_type", 5),
    raw("stock_description", 6),
    raw("recommended_price_and_date", 7),
    raw("recommended_price_from", 8),
    raw("recommended_price_to", 9),
    raw("recommended_date", 10),
    raw("target_price", 11),
    raw("sltp_price", 12),
    raw("part_profit_percentage", 13),
    raw("profit_price", 14),
    raw("exit_price", 15),
    raw("recommended_update", 16),
    raw("iclick_status", 17),
    raw("subscription_type", 18),
];

// Indices 7 and 10 carry no published meaning.
const STRATEGY_LEG: &[Field] = &[
    raw("strategy_date", 0),
    raw("modification_date", 1),
    raw("portfolio_id", 2),
    raw("call_action", 3),
    raw("portfolio_name", 4),
    raw("exchange_code", 5),
    raw("product_type", 6),
    raw("underlying", 8),
    raw("expiry_date", 9),
    raw("option_type", 11),
    raw("strike_price", 12),
    raw("action", 13),
    raw("recommended_price_from", 14),
    raw("recommended_price_to", 15),
    raw("minimum_lot_quantity", 16),
    raw("last_traded_price", 17),
    raw("best_bid_price", 18),
    raw("best_offer_price", 19),
    raw("last_traded_quantity", 20),
    raw("target_price", 21),
    raw("expected_profit_per_lot", 22),
    raw("stop_loss_price", 23),
    raw("expected_loss_per_lot", 24),
    raw("total_margin", 25),
    raw("leg_no", 26),
    raw("status", 27),
];

// Indices past the 42-element frame decode to null.
const ORDER_EVENT_V1: &[Field] = &[
    raw("sourceNumber", 0),
    raw("group", 1),
    raw("userId", 2),
    raw("key", 3),
    raw("messageLength", 4),
    raw("requestType", 5),
    raw("messageSequence", 6),
    raw("messageDate", 7),
    raw("messageTime", 8),
    raw("messageCategory", 9),
    raw("messagePriority", 10),
    raw("messageType", 11),
    raw("orderMatchAccount", 12),
    raw("orderExchangeCode", 13),
    raw("stockCode", 14),
    code("orderFlow", 15, ORDER_FLOW),
    code("limitMarketFlag", 16, LIMIT_MARKET_FLAG),
    code("orderType", 17, ORDER_TYPE),
    raw("orderLimitRate", 18),
    code("productType", 19, PRODUCT_TYPE),
    code("orderStatus", 20, ORDER_STATUS),
    raw("orderDate", 21),
    raw("orderTradeDate", 22),
    raw("orderReference", 23),
    raw("orderQuantity", 24),
    raw("openQuantity", 25),
    raw("orderExecutedQuantity", 26),
    raw("cancelledQuantity", 27),
    raw("expiredQuantity", 28),
    raw("orderDisclosedQuantity", 29),
    raw("orderStopLossTrigger", 30),
    raw("orderSquareFlag", 31),
    raw("orderAmountBlocked", 32),
    raw("orderPipeId", 33),
    raw("channel", 34),
    raw("exchangeSegmentCode", 35),
    raw("exchangeSegmentSettlement", 36),
    raw("segmentDescription", 37),
    raw("marginSquareOffMode", 38),
    raw("orderValidDate", 40),
    raw("orderMessageCharacter", 41),
    raw("averageExecutedRate", 42),
    raw("orderPriceImprovementFlag", 43),
    raw("orderMBCFlag", 44),
    raw("orderLimitOffset", 45),
    raw("systemPartnerCode", 46),
];

// 37 and 45 each feed two keys; kept as published until confirmed against
// live frames.
const ORDER_EVENT_V2: &[Field] = &[
    raw("sourceNumber", 0),
    raw("group", 1),
    raw("userId", 2),
    raw("key", 3),
    raw("messageLength", 4),
    raw("requestType", 5),
    raw("messageSequence", 6),
    raw("messageDate", 7),
    raw("messageTime", 8),
    raw("messageCategory", 9),
    raw("messagePriority", 10),
    raw("messageType", 11),
    raw("orderMatchAccount", 12),
    raw("orderExchangeCode", 13),
    raw("stockCode", 14),
    code("productType", 15, PRODUCT_TYPE),
    code("orderFlow", 21, ORDER_FLOW),
    code("limitMarketFlag", 22, LIMIT_MARKET_FLAG),
    code("orderType", 23, ORDER_TYPE),
    raw("orderLimitRate", 24),
    code("orderStatus", 25, ORDER_STATUS),
    raw("orderReference", 26),
    raw("orderTotalQuantity", 27),
    raw("executedQuantity", 28),
    raw("cancelledQuantity", 29),
    raw("expiredQuantity", 30),
    raw("stopLossTrigger", 31),
    raw("specialFlag", 32),
    raw("pipeId", 33),
    raw("channel", 34),
    raw("modificationOrCancelFlag", 35),
    raw("tradeDate", 36),
    raw("acknowledgeNumber", 37),
    raw("stopLossOrderReference", 37),
    raw("totalAmountBlocked", 38),
    raw("averageExecutedRate", 39),
    raw("cancelFlag", 40),
    raw("squareOffMarket", 41),
    raw("quickExitFlag", 42),
    raw("stopValidTillDateFlag", 43),
    raw("priceImprovementFlag", 44),
    raw("conversionImprovementFlag", 45),
    raw("trailUpdateCondition", 45),
    raw("systemPartnerCode", 46),
];

/// Frames whose first element is a plain string, keyed by length.
const PLAIN_SCHEMAS: &[(usize, RecordKind, &[Field])] = &[
    (19, RecordKind::RecommendationAlert, RECOMMENDATION_ALERT),
    (28, RecordKind::StrategyLeg, STRATEGY_LEG),
    (42, RecordKind::OrderEventV1, ORDER_EVENT_V1),
    (43, RecordKind::OrderEventV2, ORDER_EVENT_V2),
];

const QUOTE_HEADER: &[Field] = &[
    raw("symbol", 0),
    raw("open", 1),
    raw("last", 2),
    raw("high", 3),
    raw("low", 4),
    raw("change", 5),
    raw("bPrice", 6),
    raw("bQty", 7),
    raw("sPrice", 8),
    raw("sQty", 9),
    raw("ltq", 10),
    raw("avgPrice", 11),
];

const EQUITY_QUOTE_TAIL: &[Field] = &[
    raw("ttq", 12),
    raw("totalBuyQt", 13),
    raw("totalSellQ", 14),
    raw("ttv", 15),
    raw("trend", 16),
    raw("lowerCktLm", 17),
    raw("upperCktLm", 18),
    epoch("ltt", 19),
    raw("close", 20),
];

const DERIVATIVE_QUOTE_TAIL: &[Field] = &[
    raw("OI", 12),
    raw("CHNGOI", 13),
    raw("ttq", 14),
    raw("totalBuyQt", 15),
    raw("totalSellQ", 16),
    raw("ttv", 17),
    raw("trend", 18),
    raw("lowerCktLm", 19),
    raw("upperCktLm", 20),
    epoch("ltt", 21),
    raw("close", 22),
];

/// Quote-stream frames keyed by total length.
const QUOTE_SCHEMAS: &[(usize, RecordKind, &[Field])] = &[
    (21, RecordKind::EquityQuote, EQUITY_QUOTE_TAIL),
    (23, RecordKind::DerivativeQuote, DERIVATIVE_QUOTE_TAIL),
];

const COMMODITY_HEADER: &[Field] = &[
    raw("symbol", 0),
    raw("AndiOPVolume", 1),
    raw("Reserved", 2),
    raw("IndexFlag", 3),
    raw("ttq", 4),
    raw("last", 5),
    raw("ltq", 6),
    epoch("ltt", 7),
    raw("AvgTradedPrice", 8),
    raw("TotalBuyQnt", 9),
    raw("TotalSellQnt", 10),
    raw("ReservedStr", 11),
    raw("ClosePrice", 12),
    raw("OpenPrice", 13),
    raw("HighPrice", 14),
    raw("LowPrice", 15),
    raw("ReservedShort", 16),
    raw("CurrOpenInterest", 17),
    raw("TotalTrades", 18),
    raw("HightestPriceEver", 19),
    raw("LowestPriceEver", 20),
    raw("TotalTradedValue", 21),
];

/// Column names of one commodity depth block, suffixed with the zero-based
/// block index.
const COMMODITY_DEPTH_COLUMNS: &[&str] = &[
    "Quantity",
    "OrderPrice",
    "TotalOrders",
    "Reserved",
    "SellQuantity",
    "SellOrderPrice",
    "SellTotalOrders",
    "SellReserved",
];

/// Depth-row layouts, suffixed with the one-based row number.
const DEPTH_COLUMNS_BSE: &[&str] = &["BestBuyRate", "BestBuyQty", "BestSellRate", "BestSellQty"];

const DEPTH_COLUMNS_BFO: &[&str] = &[
    "BestBuyRate",
    "BestBuyQty",
    "BuyNoOfOrders",
    "BestSellRate",
    "BestSellQty",
    "SellNoOfOrders",
];

const DEPTH_COLUMNS_DEFAULT: &[&str] = &[
    "BestBuyRate",
    "BestBuyQty",
    "BuyNoOfOrders",
    "BuyFlag",
    "BestSellRate",
    "BestSellQty",
    "SellNoOfOrders",
    "SellFlag",
];

const COMMODITY_EXCHANGE_ID: &str = "6";
const QUOTE_STREAM: &str = "1";

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one positional frame.
pub fn decode(frame: &[Value]) -> Result<DecodedRecord> {
    let Some(first) = frame.first() else {
        return Err(BreezeError::Decode("empty frame".into()));
    };
    let Some(lead) = first.as_str() else {
        return Err(BreezeError::Decode(format!(
            "frame does not start with a string: {first}"
        )));
    };

    let Some((exchange_id, stream, _)) = split_stream_symbol(lead) else {
        return decode_plain(frame);
    };

    let mut record = if exchange_id == COMMODITY_EXCHANGE_ID {
        decode_commodity(frame)?
    } else if stream == QUOTE_STREAM {
        decode_quote(frame)?
    } else {
        decode_depth(frame, exchange_id)?
    };

    if let Some(label) = exchange_label(exchange_id, frame.len()) {
        record.set("exchange", Value::String(label.to_owned()));
    }
    Ok(record)
}

/// Decode a JSON value that should hold a positional frame.
pub fn decode_value(value: &Value) -> Result<DecodedRecord> {
    match value {
        Value::Array(items) => decode(items),
        other => Err(BreezeError::Decode(format!(
            "expected a positional array, got {}",
            type_name(other)
        ))),
    }
}

fn decode_plain(frame: &[Value]) -> Result<DecodedRecord> {
    let (_, kind, schema) = PLAIN_SCHEMAS
        .iter()
        .find(|(len, _, _)| *len == frame.len())
        .ok_or_else(|| {
            BreezeError::Decode(format!("no schema for {}-element frame", frame.len()))
        })?;

    let mut record = DecodedRecord::new(*kind);
    apply(&mut record, schema, frame)?;
    Ok(record)
}

fn decode_quote(frame: &[Value]) -> Result<DecodedRecord> {
    let (_, kind, tail) = QUOTE_SCHEMAS
        .iter()
        .find(|(len, _, _)| *len == frame.len())
        .ok_or_else(|| {
            BreezeError::Decode(format!("no quote schema for {}-element frame", frame.len()))
        })?;

    let mut record = DecodedRecord::new(*kind);
    apply(&mut record, QUOTE_HEADER, frame)?;
    apply(&mut record, tail, frame)?;
    record.set("quotes", Value::String("Quotes Data".into()));
    Ok(record)
}

fn decode_commodity(frame: &[Value]) -> Result<DecodedRecord> {
    if frame.len() < COMMODITY_HEADER.len() {
        return Err(BreezeError::Decode(format!(
            "commodity frame too short: {} elements",
            frame.len()
        )));
    }

    let mut record = DecodedRecord::new(RecordKind::CommodityQuote);
    apply(&mut record, COMMODITY_HEADER, frame)?;

    for (block, value) in frame[COMMODITY_HEADER.len()..].iter().enumerate() {
        let row = value.as_array().ok_or_else(|| {
            BreezeError::Decode(format!("commodity depth block {block} is not an array"))
        })?;
        for (col, name) in COMMODITY_DEPTH_COLUMNS.iter().enumerate() {
            record.set(format!("{name}-{block}"), at(row, col));
        }
    }
    Ok(record)
}

fn decode_depth(frame: &[Value], exchange_id: &str) -> Result<DecodedRecord> {
    let [symbol, time, rows, ..] = frame else {
        return Err(BreezeError::Decode(format!(
            "depth frame too short: {} elements",
            frame.len()
        )));
    };
    let rows = rows
        .as_array()
        .ok_or_else(|| BreezeError::Decode("depth rows are not an array".into()))?;

    let columns = match exchange_id {
        "1" => DEPTH_COLUMNS_BSE,
        "8" => DEPTH_COLUMNS_BFO,
        _ => DEPTH_COLUMNS_DEFAULT,
    };

    let mut depth = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| BreezeError::Decode(format!("depth row {} is not an array", i + 1)))?;
        let level: Fields = columns
            .iter()
            .enumerate()
            .map(|(col, name)| (format!("{name}-{}", i + 1), at(row, col)))
            .collect();
        depth.push(Value::Object(level));
    }

    let mut record = DecodedRecord::new(RecordKind::MarketDepth);
    record.set("symbol", symbol.clone());
    record.set("time", epoch_to_rfc3339(time)?);
    record.set("depth", Value::Array(depth));
    record.set("quotes", Value::String("Market Depth".into()));
    Ok(record)
}

fn apply(record: &mut DecodedRecord, schema: &[Field], frame: &[Value]) -> Result<()> {
    for field in schema {
        let value = at(frame, field.index);
        let value = match field.conv {
            Conv::Raw => value,
            Conv::Epoch => epoch_to_rfc3339(&value)?,
            Conv::Code(table) => {
                Value::String(order_codes::label(table, &scalar_text(&value)).to_owned())
            }
        };
        record.set(field.name, value);
    }
    Ok(())
}

fn at(items: &[Value], index: usize) -> Value {
    items.get(index).cloned().unwrap_or(Value::Null)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn epoch_to_rfc3339(value: &Value) -> Result<Value> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .ok_or_else(|| BreezeError::Decode(format!("invalid epoch timestamp: {value}")))
}

fn exchange_label(exchange_id: &str, len: usize) -> Option<&'static str> {
    match (exchange_id, len) {
        ("4", 21) => Some("NSE Equity"),
        ("4", 23) => Some("NSE Futures & Options"),
        ("4", _) => None,
        ("1", _) => Some("BSE"),
        ("13", _) => Some("NSE Currency"),
        ("6", _) => Some("Commodity"),
        ("2" | "8", _) => Some("BSE Futures & Options"),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// OHLC bars
// ---------------------------------------------------------------------------

const OHLC_CASH: &[&str] = &[
    "exchange_code",
    "stock_code",
    "low",
    "high",
    "open",
    "close",
    "volume",
    "datetime",
];

const OHLC_FUTURES: &[&str] = &[
    "exchange_code",
    "stock_code",
    "expiry_date",
    "low",
    "high",
    "open",
    "close",
    "volume",
    "oi",
    "datetime",
];

const OHLC_OPTIONS: &[&str] = &[
    "exchange_code",
    "stock_code",
    "expiry_date",
    "strike_price",
    "right_type",
    "low",
    "high",
    "open",
    "close",
    "volume",
    "oi",
    "datetime",
];

/// Decode a comma-separated OHLC bar.
///
/// Cash bars have 9 fields, futures 11 and options 13; the last field is the
/// channel code, reported back as an interval label.
pub fn decode_ohlc(csv: &str) -> Result<DecodedRecord> {
    let parts: Vec<&str> = csv.trim().split(',').collect();
    let names = match parts.len() {
        9 => OHLC_CASH,
        11 => OHLC_FUTURES,
        13 => OHLC_OPTIONS,
        n => {
            return Err(BreezeError::Decode(format!(
                "no OHLC schema for {n}-field bar"
            )));
        }
    };

    let mut record = DecodedRecord::new(RecordKind::OhlcBar);
    for (name, value) in names.iter().zip(&parts) {
        record.set(*name, Value::String((*value).to_owned()));
    }

    let code = parts[parts.len() - 1];
    let interval = Interval::from_channel_code(code).map_or("", Interval::label);
    record.set("interval", Value::String(interval.to_owned()));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            _ => unreachable!(),
        }
    }

    #[test]
    fn equity_quote_scenario() {
        let f = frame(json!([
            "4!1", 100, 101, 99, 102, 1, 100, 10, 101, 15, 5, 100.5, 1000, 600, 400, 50000, "up",
            95, 105, 1699999999, 100
        ]));
        let record = decode(&f).unwrap();

        assert_eq!(record.kind, RecordKind::EquityQuote);
        assert_eq!(record.get("exchange"), Some(&json!("NSE Equity")));
        assert_eq!(record.get("ttq"), Some(&json!(1000)));
        assert_eq!(record.get("close"), Some(&json!(100)));
        assert_eq!(record.get("ltt"), Some(&json!("2023-11-14T22:13:19Z")));
        assert_eq!(record.get("avgPrice"), Some(&json!(100.5)));
        assert_eq!(record.get("quotes"), Some(&json!("Quotes Data")));
        assert_eq!(record.symbol(), Some("4!1"));
    }

    #[test]
    fn derivative_quote_reads_open_interest() {
        let f = frame(json!([
            "4.1!35001", 100, 101, 99, 102, 1, 100, 10, 101, 15, 5, 100.5, 7000, -20, 1000, 600,
            400, 50000, "down", 95, 105, 1699999999, 98
        ]));
        let record = decode(&f).unwrap();

        assert_eq!(record.kind, RecordKind::DerivativeQuote);
        assert_eq!(record.get("exchange"), Some(&json!("NSE Futures & Options")));
        assert_eq!(record.get("OI"), Some(&json!(7000)));
        assert_eq!(record.get("CHNGOI"), Some(&json!(-20)));
        assert_eq!(record.get("close"), Some(&json!(98)));
    }

    #[test]
    fn bse_depth_uses_four_columns() {
        let f = frame(json!([
            "1.2!500325",
            1699999999,
            [["10.5", "100", "10.6", "200"], ["10.4", "50", "10.7", "75"]]
        ]));
        let record = decode(&f).unwrap();

        assert_eq!(record.kind, RecordKind::MarketDepth);
        assert_eq!(record.get("exchange"), Some(&json!("BSE")));
        assert_eq!(record.get("quotes"), Some(&json!("Market Depth")));
        let depth = record.get("depth").and_then(Value::as_array).unwrap();
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0]["BestBuyRate-1"], json!("10.5"));
        assert_eq!(depth[1]["BestSellQty-2"], json!("75"));
        assert_eq!(depth[0].as_object().unwrap().len(), 4);
    }

    #[test]
    fn bfo_depth_carries_order_counts() {
        let f = frame(json!([
            "8.2!800001",
            1699999999,
            [[75000.5, 20, 3, 75001, 10, 2], [75000, 40, 5, 75001.5, 15, 1]]
        ]));
        let record = decode(&f).unwrap();

        assert_eq!(record.kind, RecordKind::MarketDepth);
        assert_eq!(record.get("exchange"), Some(&json!("BSE Futures & Options")));
        let depth = record.get("depth").and_then(Value::as_array).unwrap();
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].as_object().unwrap().len(), 6);
        assert_eq!(depth[0]["BuyNoOfOrders-1"], json!(3));
        assert_eq!(depth[0]["SellNoOfOrders-1"], json!(2));
        assert_eq!(depth[1]["BestSellRate-2"], json!(75001.5));
        assert!(depth[0].get("BuyFlag-1").is_none());
    }

    #[test]
    fn default_depth_uses_eight_columns() {
        let f = frame(json!([
            "4.2!2885",
            1699999999,
            [[1, 2, 3, "N", 5, 6, 7, "N"]]
        ]));
        let record = decode(&f).unwrap();
        let depth = record.get("depth").and_then(Value::as_array).unwrap();
        assert_eq!(depth[0].as_object().unwrap().len(), 8);
        assert_eq!(depth[0]["SellFlag-1"], json!("N"));
        assert!(record.get("exchange").is_none());
    }

    #[test]
    fn commodity_blocks_are_zero_indexed() {
        let mut items: Vec<Value> = vec![json!("6!1")];
        items.extend((1..22).map(|i| json!(i)));
        items[7] = json!(1699999999);
        items.push(json!([1, 2, 3, 4, 5, 6, 7, 8]));
        items.push(json!([11, 12, 13, 14, 15, 16, 17, 18]));

        let record = decode(&items).unwrap();
        assert_eq!(record.kind, RecordKind::CommodityQuote);
        assert_eq!(record.get("exchange"), Some(&json!("Commodity")));
        assert_eq!(record.get("Quantity-0"), Some(&json!(1)));
        assert_eq!(record.get("SellReserved-1"), Some(&json!(18)));
        assert_eq!(record.get("TotalTradedValue"), Some(&json!(21)));
    }

    #[test]
    fn order_event_v1_translates_codes() {
        let mut items: Vec<Value> = (0..42).map(|i| json!(format!("f{i}"))).collect();
        items[15] = json!("B");
        items[16] = json!("L");
        items[17] = json!("T");
        items[19] = json!("C");
        items[20] = json!("Z");

        let record = decode(&items).unwrap();
        assert_eq!(record.kind, RecordKind::OrderEventV1);
        assert_eq!(record.get("orderFlow"), Some(&json!("Buy")));
        assert_eq!(record.get("limitMarketFlag"), Some(&json!("Limit")));
        assert_eq!(record.get("orderType"), Some(&json!("Day")));
        assert_eq!(record.get("productType"), Some(&json!("Cash")));
        assert_eq!(record.get("orderStatus"), Some(&json!("")));
        assert_eq!(record.get("orderMessageCharacter"), Some(&json!("f41")));
        assert_eq!(record.get("systemPartnerCode"), Some(&Value::Null));
    }

    #[test]
    fn order_event_v2_keeps_shared_offsets() {
        let mut items: Vec<Value> = (0..43).map(|i| json!(format!("f{i}"))).collect();
        items[15] = json!("O");
        items[25] = json!("E");

        let record = decode(&items).unwrap();
        assert_eq!(record.kind, RecordKind::OrderEventV2);
        assert_eq!(record.get("productType"), Some(&json!("Options")));
        assert_eq!(record.get("orderStatus"), Some(&json!("Executed")));
        assert_eq!(record.get("acknowledgeNumber"), record.get("stopLossOrderReference"));
        assert_eq!(record.get("quickExitFlag"), Some(&json!("f42")));
    }

    #[test]
    fn plain_frames_dispatch_by_length() {
        let alert: Vec<Value> = (0..19).map(|i| json!(format!("a{i}"))).collect();
        assert_eq!(decode(&alert).unwrap().kind, RecordKind::RecommendationAlert);

        let leg: Vec<Value> = (0..28).map(|i| json!(format!("s{i}"))).collect();
        let record = decode(&leg).unwrap();
        assert_eq!(record.kind, RecordKind::StrategyLeg);
        assert_eq!(record.get("underlying"), Some(&json!("s8")));

        let odd: Vec<Value> = (0..7).map(|i| json!(format!("x{i}"))).collect();
        assert!(matches!(decode(&odd), Err(BreezeError::Decode(_))));
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[json!(42)]).is_err());
        assert!(decode_value(&json!({"a": 1})).is_err());
        assert!(decode(&frame(json!(["4!1", 1, 2]))).is_err());
        assert!(decode(&frame(json!(["4!2", "not-a-time", []]))).is_err());
    }

    #[test]
    fn decode_is_deterministic() {
        let f = frame(json!([
            "4!1", 100, 101, 99, 102, 1, 100, 10, 101, 15, 5, 100.5, 1000, 600, 400, 50000, "up",
            95, 105, 1699999999, 100
        ]));
        assert_eq!(decode(&f).unwrap(), decode(&f).unwrap());
    }

    #[test]
    fn ohlc_bars() {
        let cash =
            decode_ohlc("NSE,NIFTY,18000,18100,18050,18075,1200,2024-01-25 10:00:00,1MIN").unwrap();
        assert_eq!(cash.kind, RecordKind::OhlcBar);
        assert_eq!(cash.get("interval"), Some(&json!("1minute")));
        assert_eq!(cash.get("close"), Some(&json!("18075")));
        assert!(cash.get("oi").is_none());

        let option = decode_ohlc(
            "NFO,NIFTY,25-Jan-2024,21000,CE,10,20,15,18,500,7000,2024-01-25 10:00:00,30MIN",
        )
        .unwrap();
        assert_eq!(option.get("right_type"), Some(&json!("CE")));
        assert_eq!(option.get("oi"), Some(&json!("7000")));
        assert_eq!(option.get("interval"), Some(&json!("30minute")));

        assert!(decode_ohlc("a,b,c").is_err());
    }

    #[test]
    fn metadata_merge_overwrites_named_keys() {
        let mut record = DecodedRecord::new(RecordKind::EquityQuote);
        record.set("stock_code", json!("old"));
        record.merge_metadata(&InstrumentMetadata {
            exchange_code: Some("NFO".into()),
            stock_code: Some("NIFTY".into()),
            ..Default::default()
        });
        assert_eq!(record.get("stock_code"), Some(&json!("NIFTY")));
        assert_eq!(record.get("exchange_code"), Some(&json!("NFO")));
        assert!(record.get("right").is_none());
    }
}
