//! Instrument-token registry built from the security-master feed.
//!
//! The registry holds one [`BidirectionalIndex`] per [`Exchange`] partition.
//! Cash partitions (NSE, BSE) are keyed by short symbol; derivative
//! partitions are keyed by composite contract string (see
//! [`codec`](super::codec)).
//!
//! Reloading is all-or-nothing: a new set of tables is built off to the side
//! and only published once every row has decoded. Readers holding an older
//! [`RegistryTables`] snapshot are unaffected by a concurrent reload.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{LoadError, Result};
use crate::instruments::codec;
use crate::types::enums::Exchange;
use crate::types::instrument::InstrumentKey;

// Security-master column positions.
const COL_DISPLAY_NAME: usize = 1;
const COL_EXCHANGE: usize = 2;
const COL_SYMBOL: usize = 3;
const COL_TOKEN: usize = 5;
const COL_CONTRACT: usize = 7;

// ---------------------------------------------------------------------------
// Per-partition index
// ---------------------------------------------------------------------------

/// Reverse-lookup entry for a wire token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    /// Symbol (cash) or composite contract string (derivatives).
    pub composite: String,
    /// Display name from the security master.
    pub display_name: String,
}

/// Symbol → token and token → symbol maps kept as mutual inverses.
#[derive(Debug, Clone, Default)]
pub struct BidirectionalIndex {
    by_symbol: HashMap<String, String>,
    by_token: HashMap<String, TokenEntry>,
}

impl BidirectionalIndex {
    /// Insert a row. A later row for the same symbol or token replaces the
    /// earlier one in both directions.
    pub fn insert(&mut self, composite: String, display_name: String, token: String) {
        if let Some(previous) = self.by_token.get(&token) {
            if previous.composite != composite {
                self.by_symbol.remove(&previous.composite);
            }
        }
        if let Some(stale) = self.by_symbol.insert(composite.clone(), token.clone()) {
            if stale != token {
                self.by_token.remove(&stale);
            }
        }
        self.by_token.insert(
            token,
            TokenEntry {
                composite,
                display_name,
            },
        );
    }

    /// Token for a symbol or composite string.
    pub fn token(&self, composite: &str) -> Option<&str> {
        self.by_symbol.get(composite).map(String::as_str)
    }

    /// Reverse entry for a token.
    pub fn entry(&self, token: &str) -> Option<&TokenEntry> {
        self.by_token.get(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

/// One immutable generation of the six partition indexes.
#[derive(Debug, Default)]
pub struct RegistryTables {
    partitions: HashMap<Exchange, BidirectionalIndex>,
}

impl RegistryTables {
    /// Index for a partition, if any rows were loaded into it.
    pub fn partition(&self, exchange: Exchange) -> Option<&BidirectionalIndex> {
        self.partitions.get(&exchange)
    }

    /// Total number of instruments across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.values().map(BidirectionalIndex::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a complete security-master CSV into a fresh set of tables.
    pub fn from_csv(text: &str) -> std::result::Result<Self, LoadError> {
        let mut partitions: HashMap<Exchange, BidirectionalIndex> = HashMap::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let cols = split_csv_line(line);

            // Header and rows for segments we do not stream are skipped.
            let Some(exchange) = cols
                .get(COL_EXCHANGE)
                .and_then(|code| code.parse::<Exchange>().ok())
            else {
                continue;
            };

            let key_col = if exchange.is_derivative() {
                COL_CONTRACT
            } else {
                COL_SYMBOL
            };
            let display_name = required(&cols, COL_DISPLAY_NAME, "display name", line_no)?;
            let token = required(&cols, COL_TOKEN, "token", line_no)?;
            let composite = required(&cols, key_col, "symbol", line_no)?;

            if exchange.is_derivative() {
                codec::validate_contract(&composite).map_err(|reason| {
                    LoadError::MalformedRow {
                        line: line_no,
                        reason,
                    }
                })?;
            }

            partitions
                .entry(exchange)
                .or_default()
                .insert(composite, display_name, token);
        }

        let tables = Self { partitions };
        if tables.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(tables)
    }
}

fn required(
    cols: &[String],
    idx: usize,
    what: &str,
    line: usize,
) -> std::result::Result<String, LoadError> {
    match cols.get(idx).map(|s| s.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        Some(_) => Err(LoadError::MalformedRow {
            line,
            reason: format!("empty {what} (column {idx})"),
        }),
        None => Err(LoadError::MalformedRow {
            line,
            reason: format!("missing {what} (column {idx}, row has {} columns)", cols.len()),
        }),
    }
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A token resolved from an [`InstrumentKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    /// Partition the token was found in.
    pub exchange: Exchange,
    /// Wire token.
    pub token: String,
}

/// Shared, reloadable registry of instrument tokens.
///
/// Cheap to share behind an `Arc`; lookups take a short read lock to clone
/// the current snapshot pointer.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tables: RwLock<Arc<RegistryTables>>,
}

impl TokenRegistry {
    /// An empty registry. Every lookup misses until a load succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from security-master CSV text.
    pub fn from_csv(text: &str) -> Result<Self> {
        let tables = RegistryTables::from_csv(text)?;
        Ok(Self {
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    /// Replace all partitions with the contents of `text`.
    ///
    /// On error the previously published tables stay in place.
    pub fn load_csv(&self, text: &str) -> Result<usize> {
        let tables = RegistryTables::from_csv(text)?;
        let count = tables.len();
        *self.tables.write() = Arc::new(tables);
        tracing::info!(instruments = count, "Security master loaded");
        Ok(count)
    }

    /// Download the security master from `url` and load it.
    pub async fn refresh(&self, http: &reqwest::Client, url: &str) -> Result<usize> {
        let resp = http.get(url).send().await.map_err(LoadError::Fetch)?;
        let status = resp.status();
        if !status.is_success() {
            tracing::error!(%status, url, "Security master download failed");
            return Err(LoadError::Status(status.as_u16()).into());
        }
        let body = resp.text().await.map_err(LoadError::Fetch)?;
        self.load_csv(&body)
    }

    /// The currently published tables.
    pub fn snapshot(&self) -> Arc<RegistryTables> {
        Arc::clone(&self.tables.read())
    }

    /// Total number of instruments.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of instruments in one partition.
    pub fn partition_len(&self, exchange: Exchange) -> usize {
        self.snapshot()
            .partition(exchange)
            .map_or(0, BidirectionalIndex::len)
    }

    /// Raw forward lookup in a single partition.
    pub fn token_for(&self, exchange: Exchange, composite: &str) -> Option<String> {
        self.snapshot()
            .partition(exchange)?
            .token(composite)
            .map(str::to_owned)
    }

    /// Resolve an instrument key to its wire token.
    ///
    /// NSE derivative keys that miss the NSE partition are retried against
    /// NFO, and the result is labelled with the partition that answered.
    /// Keys that fail validation resolve to `None`.
    pub fn lookup(&self, key: &InstrumentKey) -> Option<ResolvedToken> {
        let composite = codec::encode(key).ok()?;
        let tables = self.snapshot();
        let find = |exchange: Exchange| {
            tables
                .partition(exchange)
                .and_then(|p| p.token(&composite))
                .map(|token| ResolvedToken {
                    exchange,
                    token: token.to_owned(),
                })
        };

        find(key.exchange).or_else(|| {
            if key.exchange == Exchange::Nse && key.is_derivative() {
                find(Exchange::Nfo)
            } else {
                None
            }
        })
    }

    /// Reverse lookup of a token in one partition.
    pub fn reverse(&self, exchange: Exchange, token: &str) -> Option<TokenEntry> {
        self.snapshot().partition(exchange)?.entry(token).cloned()
    }

    /// Reverse lookup used by the stream decoder: NSE misses fall back to
    /// NFO and report NFO as the owning partition.
    pub fn resolve_token(&self, exchange: Exchange, token: &str) -> Option<(Exchange, TokenEntry)> {
        let tables = self.snapshot();
        let find = |exchange: Exchange| {
            tables
                .partition(exchange)
                .and_then(|p| p.entry(token))
                .map(|entry| (exchange, entry.clone()))
        };

        find(exchange).or_else(|| {
            if exchange == Exchange::Nse {
                find(Exchange::Nfo)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_split_handles_quotes() {
        let cols = split_csv_line(r#"1,"RELIANCE, INDUSTRIES",NSE,"say ""hi""",,2885"#);
        assert_eq!(cols.len(), 6);
        assert_eq!(cols[1], "RELIANCE, INDUSTRIES");
        assert_eq!(cols[3], r#"say "hi""#);
        assert_eq!(cols[4], "");
        assert_eq!(cols[5], "2885");
    }

    #[test]
    fn index_stays_inverse_on_duplicate_symbol() {
        let mut index = BidirectionalIndex::default();
        index.insert("RELIND".into(), "Reliance".into(), "100".into());
        index.insert("RELIND".into(), "Reliance".into(), "200".into());

        assert_eq!(index.token("RELIND"), Some("200"));
        assert!(index.entry("100").is_none());
        assert_eq!(index.entry("200").unwrap().composite, "RELIND");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn index_stays_inverse_on_duplicate_token() {
        let mut index = BidirectionalIndex::default();
        index.insert("OLD".into(), "Old name".into(), "100".into());
        index.insert("NEW".into(), "New name".into(), "100".into());

        assert!(index.token("OLD").is_none());
        assert_eq!(index.token("NEW"), Some("100"));
        assert_eq!(index.entry("100").unwrap().display_name, "New name");
    }
}
