// chat/pipeline.rs - Missing Data Planning and Fetch Tracking

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, trace};

use crate::name::Name;
use crate::packet::Interest;

/// Below this many missing packets every sequence is fetched
pub const DEFAULT_CATCH_UP_THRESHOLD: u64 = 4;

/// Introduction certificates fetched per sync update at most
pub const DEFAULT_MAX_INTRO_FETCHES: u64 = 32;

/// One sync notification entry: `prefix` has sequences `low..=high` we lack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingData {
    pub prefix: Name,

    pub low: u64,

    pub high: u64,
}

impl MissingData {
    pub fn new(prefix: Name, low: u64, high: u64) -> Self {
        Self { prefix, low, high }
    }

    pub fn count(&self) -> u64 {
        if self.high < self.low {
            0
        } else {
            (self.high - self.low).saturating_add(1)
        }
    }
}

/// A single fetch to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub prefix: Name,

    pub seq: u64,

    /// Fetched in catch-up mode; intermediate history was skipped
    pub is_history: bool,
}

impl FetchPlan {
    pub fn name(&self) -> Name {
        self.prefix.clone().append_number(self.seq)
    }
}

/// Missing packets across all ranges, saturating at `u64::MAX`
pub fn total_missing(missing: &[MissingData]) -> u64 {
    missing
        .iter()
        .map(MissingData::count)
        .fold(0, u64::saturating_add)
}

/// Decide which sequences to fetch for a sync update
///
/// With fewer than `threshold` packets missing in total every sequence is
/// fetched. Otherwise only the highest sequence of each prefix is.
pub fn plan_fetches(missing: &[MissingData], threshold: u64) -> Vec<FetchPlan> {
    let total = total_missing(missing);
    if total >= threshold {
        debug!(total, threshold, "Catch-up mode, fetching latest sequences only");
    }
    plan_ranges(missing, total >= threshold)
}

/// Every sequence of `missing`, or only the latest per prefix in catch-up mode
pub fn plan_ranges(missing: &[MissingData], catch_up: bool) -> Vec<FetchPlan> {
    if !catch_up {
        return missing
            .iter()
            .flat_map(|range| {
                (range.low..=range.high).map(move |seq| FetchPlan {
                    prefix: range.prefix.clone(),
                    seq,
                    is_history: false,
                })
            })
            .collect();
    }

    let mut latest: BTreeMap<&Name, u64> = BTreeMap::new();
    for range in missing.iter().filter(|range| range.count() > 0) {
        let seq = latest.entry(&range.prefix).or_insert(range.high);
        *seq = (*seq).max(range.high);
    }

    latest
        .into_iter()
        .map(|(prefix, seq)| FetchPlan {
            prefix: prefix.clone(),
            seq,
            is_history: true,
        })
        .collect()
}

/// Plan introduction fetches, newest first within each range, `limit` in total
///
/// Introductions are never skipped for catch-up, but a single update
/// cannot make us track more than `limit` of them.
pub fn plan_introductions(missing: &[MissingData], limit: u64) -> Vec<FetchPlan> {
    let mut budget = limit;
    let mut plans = Vec::new();

    for range in missing.iter().filter(|range| range.count() > 0) {
        if budget == 0 {
            break;
        }
        let take = range.count().min(budget);
        budget -= take;
        if take < range.count() {
            debug!(
                prefix = %range.prefix,
                missing = range.count(),
                fetched = take,
                "Introduction range truncated"
            );
        }

        let low = range.high - (take - 1);
        plans.extend((low..=range.high).rev().map(|seq| FetchPlan {
            prefix: range.prefix.clone(),
            seq,
            is_history: false,
        }));
    }

    plans
}

/// Identifier of one tracked fetch; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchId(u64);

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch-{}", self.0)
    }
}

/// Result of an interest lifetime expiring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutOutcome<T> {
    /// Budget left: express this interest again under the same id
    Retry(Interest),
    /// Budget exhausted; the fetch is forgotten
    Expired(T),
    /// Already completed or expired
    Unknown,
}

#[derive(Debug)]
struct PendingFetch<T> {
    interest: Interest,

    retries_left: u32,

    target: T,
}

/// Outstanding fetches with their retry budgets
///
/// Every id resolves exactly once: either `complete` or a final
/// `TimeoutOutcome::Expired`. Late events for a resolved id report
/// nothing, so a timeout can never follow a success or the reverse.
#[derive(Debug)]
pub struct FetchTracker<T> {
    next_id: u64,

    pending: HashMap<FetchId, PendingFetch<T>>,
}

impl<T> Default for FetchTracker<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
        }
    }
}

impl<T> FetchTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interest: Interest, retries: u32, target: T) -> FetchId {
        let id = FetchId(self.next_id);
        self.next_id += 1;
        trace!(%id, name = %interest.name(), retries, "Fetch registered");
        self.pending.insert(
            id,
            PendingFetch {
                interest,
                retries_left: retries,
                target,
            },
        );
        id
    }

    /// Data arrived; `None` if the id is no longer pending
    pub fn complete(&mut self, id: FetchId) -> Option<T> {
        self.pending.remove(&id).map(|pending| pending.target)
    }

    pub fn on_timeout(&mut self, id: FetchId) -> TimeoutOutcome<T> {
        let Some(pending) = self.pending.get_mut(&id) else {
            return TimeoutOutcome::Unknown;
        };

        if pending.retries_left > 0 {
            pending.retries_left -= 1;
            trace!(%id, retries_left = pending.retries_left, "Fetch retry");
            return TimeoutOutcome::Retry(pending.interest.clone());
        }

        match self.pending.remove(&id) {
            Some(pending) => TimeoutOutcome::Expired(pending.target),
            None => TimeoutOutcome::Unknown,
        }
    }

    pub fn interest(&self, id: FetchId) -> Option<&Interest> {
        self.pending.get(&id).map(|pending| &pending.interest)
    }

    pub fn target(&self, id: FetchId) -> Option<&T> {
        self.pending.get(&id).map(|pending| &pending.target)
    }

    pub fn contains(&self, id: FetchId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Forget everything; late events are then ignored
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_below_threshold_fetches_everything() {
        let missing = vec![
            MissingData::new(name("/a"), 1, 2),
            MissingData::new(name("/b"), 5, 5),
        ];
        let plan = plan_fetches(&missing, DEFAULT_CATCH_UP_THRESHOLD);

        let names: Vec<Name> = plan.iter().map(FetchPlan::name).collect();
        assert_eq!(
            names,
            vec![
                name("/a").append_number(1),
                name("/a").append_number(2),
                name("/b").append_number(5),
            ]
        );
        assert!(plan.iter().all(|p| !p.is_history));
    }

    #[test]
    fn test_at_threshold_fetches_latest_only() {
        let missing = vec![
            MissingData::new(name("/a"), 1, 3),
            MissingData::new(name("/b"), 5, 5),
        ];
        let plan = plan_fetches(&missing, DEFAULT_CATCH_UP_THRESHOLD);
        assert_eq!(
            plan,
            vec![
                FetchPlan { prefix: name("/a"), seq: 3, is_history: true },
                FetchPlan { prefix: name("/b"), seq: 5, is_history: true },
            ]
        );

        let burst = vec![MissingData::new(name("/a"), 0, 99), MissingData::new(name("/a"), 120, 130)];
        let plan = plan_fetches(&burst, DEFAULT_CATCH_UP_THRESHOLD);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].seq, 130);
    }

    #[test]
    fn test_full_range_does_not_overflow() {
        let full = MissingData::new(name("/a"), 0, u64::MAX);
        assert_eq!(full.count(), u64::MAX);

        let missing = vec![MissingData::new(name("/a"), 1, u64::MAX), MissingData::new(name("/b"), 0, 5)];
        assert_eq!(total_missing(&missing), u64::MAX);
        assert_eq!(
            plan_fetches(&missing, DEFAULT_CATCH_UP_THRESHOLD),
            vec![
                FetchPlan { prefix: name("/a"), seq: u64::MAX, is_history: true },
                FetchPlan { prefix: name("/b"), seq: 5, is_history: true },
            ]
        );
    }

    #[test]
    fn test_introductions_are_bounded() {
        let missing = vec![
            MissingData::new(name("/a/INTRO-CERT"), 0, 1_000_000_000),
            MissingData::new(name("/b/INTRO-CERT"), 0, 1),
        ];
        let plan = plan_introductions(&missing, 3);
        let seqs: Vec<u64> = plan.iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![1_000_000_000, 999_999_999, 999_999_998]);
        assert!(plan.iter().all(|p| p.prefix == name("/a/INTRO-CERT") && !p.is_history));

        // small ranges come through whole
        let plan = plan_introductions(&missing[1..], DEFAULT_MAX_INTRO_FETCHES);
        assert_eq!(plan.len(), 2);
        assert!(plan_introductions(&[MissingData::new(name("/a"), 0, u64::MAX)], 0).is_empty());
    }

    #[test]
    fn test_empty_ranges() {
        assert!(plan_fetches(&[], DEFAULT_CATCH_UP_THRESHOLD).is_empty());
        assert_eq!(MissingData::new(name("/a"), 5, 4).count(), 0);
    }

    #[test]
    fn test_timeout_fires_exactly_once() {
        let mut tracker = FetchTracker::new();
        let interest = Interest::new(name("/a/1"));
        let id = tracker.register(interest.clone(), 2, "target");

        assert_eq!(tracker.on_timeout(id), TimeoutOutcome::Retry(interest.clone()));
        assert_eq!(tracker.on_timeout(id), TimeoutOutcome::Retry(interest));
        assert_eq!(tracker.on_timeout(id), TimeoutOutcome::Expired("target"));
        assert_eq!(tracker.on_timeout(id), TimeoutOutcome::Unknown);

        // late data after expiry is not delivered
        assert_eq!(tracker.complete(id), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_completion_suppresses_timeout() {
        let mut tracker = FetchTracker::new();
        let first = tracker.register(Interest::new(name("/a/1")), 0, 1u8);
        let second = tracker.register(Interest::new(name("/a/2")), 0, 2u8);
        assert_ne!(first, second);

        assert_eq!(tracker.complete(first), Some(1));
        assert_eq!(tracker.on_timeout(first), TimeoutOutcome::Unknown);
        assert_eq!(tracker.on_timeout(second), TimeoutOutcome::Expired(2));
    }
}
