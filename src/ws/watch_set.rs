//! Per-connection record of joined tokens and OHLC rooms.
//!
//! The set is what [`ChannelConnection::rewatch`] and
//! [`ChannelConnection::rewatch_ohlc`] replay after a transport drop. It is
//! always accessed under the connection's session lock.
//!
//! [`ChannelConnection::rewatch`]: super::connection::ChannelConnection::rewatch
//! [`ChannelConnection::rewatch_ohlc`]: super::connection::ChannelConnection::rewatch_ohlc

use std::collections::BTreeSet;

use crate::types::enums::Interval;

/// Watched tokens plus joined OHLC rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    tokens: BTreeSet<String>,
    rooms: BTreeSet<(String, Interval)>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tokens. Returns how many were not already present.
    pub fn watch<S: AsRef<str>>(&mut self, tokens: &[S]) -> usize {
        tokens
            .iter()
            .filter(|t| self.tokens.insert(t.as_ref().to_owned()))
            .count()
    }

    /// Remove tokens and any rooms joined for them. Unknown tokens are
    /// ignored.
    pub fn unwatch<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for token in tokens {
            let token = token.as_ref();
            self.tokens.remove(token);
            self.rooms.retain(|(room, _)| room != token);
        }
    }

    /// Record an OHLC room. Returns `false` if it was already joined.
    pub fn join_room(&mut self, token: impl Into<String>, interval: Interval) -> bool {
        self.rooms.insert((token.into(), interval))
    }

    /// Forget an OHLC room.
    pub fn leave_room(&mut self, token: &str, interval: Interval) -> bool {
        self.rooms.remove(&(token.to_owned(), interval))
    }

    /// Whether a token is watched.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Watched tokens in sorted order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Joined rooms in sorted order.
    pub fn rooms(&self) -> impl Iterator<Item = (&str, Interval)> {
        self.rooms.iter().map(|(t, i)| (t.as_str(), *i))
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.rooms.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.rooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_then_unwatch_is_empty() {
        let mut set = WatchSet::new();
        set.watch(&["4.1!2885"]);
        set.unwatch(&["4.1!2885"]);
        assert!(set.is_empty());
    }

    #[test]
    fn watch_many_and_count_new() {
        let mut set = WatchSet::new();
        assert_eq!(set.watch(&["4.1!2885", "4.2!2885"]), 2);
        assert_eq!(set.watch(&["4.1!2885", "1.1!500325"]), 1);
        assert!(set.contains("4.1!2885"));
        assert!(set.contains("4.2!2885"));
        assert_eq!(set.token_count(), 3);
    }

    #[test]
    fn unwatch_unknown_token_is_noop() {
        let mut set = WatchSet::new();
        set.watch(&["4.1!2885"]);
        set.unwatch(&["4.1!9999"]);
        assert_eq!(set.tokens().collect::<Vec<_>>(), ["4.1!2885"]);
    }

    #[test]
    fn unwatch_drops_matching_rooms() {
        let mut set = WatchSet::new();
        assert!(set.join_room("4.1!2885", Interval::OneMinute));
        assert!(set.join_room("4.1!2885", Interval::FiveMinute));
        assert!(!set.join_room("4.1!2885", Interval::FiveMinute));
        set.join_room("4.1!1594", Interval::OneMinute);

        set.unwatch(&["4.1!2885"]);
        assert_eq!(
            set.rooms().collect::<Vec<_>>(),
            [("4.1!1594", Interval::OneMinute)]
        );
    }

    #[test]
    fn leave_single_room() {
        let mut set = WatchSet::new();
        set.join_room("4.1!2885", Interval::OneMinute);
        set.join_room("4.1!2885", Interval::OneSecond);
        assert!(set.leave_room("4.1!2885", Interval::OneMinute));
        assert!(!set.leave_room("4.1!2885", Interval::OneMinute));
        assert_eq!(set.room_count(), 1);
    }
}
