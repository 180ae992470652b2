// chat/roster.rs - Chatroom Roster

use std::collections::BTreeMap;
use tracing::debug;

use crate::name::Name;
use crate::observability::record_roster_size;

/// One participant session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Session prefix the participant publishes under
    pub prefix: Name,

    pub nick: Option<String>,

    /// Last time anything arrived from this session (ms)
    pub last_seen: i64,
}

/// What changed after a message was attributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    Added,
    NickChanged { previous: Option<String> },
    Seen,
}

/// Participants keyed by session prefix
#[derive(Debug)]
pub struct Roster {
    entries: BTreeMap<Name, RosterEntry>,

    stale_after_ms: i64,
}

impl Roster {
    pub fn new(stale_after_ms: i64) -> Self {
        Self {
            entries: BTreeMap::new(),
            stale_after_ms,
        }
    }

    /// Record activity from `prefix`
    pub fn seen(&mut self, prefix: &Name, nick: Option<&str>, now: i64) -> RosterEvent {
        let nick = nick.filter(|n| !n.is_empty()).map(str::to_owned);

        let Some(entry) = self.entries.get_mut(prefix) else {
            debug!(prefix = %prefix, nick = ?nick, "Roster entry added");
            self.entries.insert(
                prefix.clone(),
                RosterEntry {
                    prefix: prefix.clone(),
                    nick,
                    last_seen: now,
                },
            );
            record_roster_size(self.entries.len());
            return RosterEvent::Added;
        };

        entry.last_seen = entry.last_seen.max(now);
        if nick.is_some() && entry.nick != nick {
            let previous = std::mem::replace(&mut entry.nick, nick);
            return RosterEvent::NickChanged { previous };
        }
        RosterEvent::Seen
    }

    /// Drop a session that announced LEAVE
    pub fn remove(&mut self, prefix: &Name) -> Option<RosterEntry> {
        let removed = self.entries.remove(prefix);
        if removed.is_some() {
            record_roster_size(self.entries.len());
        }
        removed
    }

    /// Remove every session silent for longer than the stale timeout
    pub fn reap_stale(&mut self, now: i64) -> Vec<RosterEntry> {
        let stale: Vec<Name> = self
            .entries
            .values()
            .filter(|entry| now - entry.last_seen > self.stale_after_ms)
            .map(|entry| entry.prefix.clone())
            .collect();

        let reaped: Vec<RosterEntry> = stale
            .iter()
            .filter_map(|prefix| self.entries.remove(prefix))
            .collect();
        if !reaped.is_empty() {
            debug!(count = reaped.len(), "Stale roster entries removed");
            record_roster_size(self.entries.len());
        }
        reaped
    }

    pub fn contains(&self, prefix: &Name) -> bool {
        self.entries.contains_key(prefix)
    }

    pub fn nick(&self, prefix: &Name) -> Option<&str> {
        self.entries.get(prefix)?.nick.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_seen_and_nick_change() {
        let mut roster = Roster::new(1_000);
        let bob = name("/private/local/ndn/bob/lobby");

        assert_eq!(roster.seen(&bob, Some("bob"), 10), RosterEvent::Added);
        assert_eq!(roster.seen(&bob, Some("bob"), 20), RosterEvent::Seen);
        assert_eq!(roster.seen(&bob, None, 30), RosterEvent::Seen);
        assert_eq!(
            roster.seen(&bob, Some("bobby"), 40),
            RosterEvent::NickChanged { previous: Some("bob".into()) }
        );
        assert_eq!(roster.nick(&bob), Some("bobby"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_reap_stale() {
        let mut roster = Roster::new(1_000);
        let bob = name("/p/bob");
        let carol = name("/p/carol");
        roster.seen(&bob, Some("bob"), 0);
        roster.seen(&carol, Some("carol"), 800);

        assert!(roster.reap_stale(1_000).is_empty());

        let reaped = roster.reap_stale(1_500);
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].prefix, bob);
        assert!(!roster.contains(&bob));
        assert!(roster.contains(&carol));
    }

    #[test]
    fn test_remove() {
        let mut roster = Roster::new(1_000);
        let bob = name("/p/bob");
        roster.seen(&bob, Some("bob"), 0);
        assert!(roster.remove(&bob).is_some());
        assert!(roster.remove(&bob).is_none());
        assert!(roster.is_empty());
    }
}
