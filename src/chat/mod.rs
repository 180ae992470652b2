// chat/mod.rs - Chatroom Data Plane

//! Messages, the fetch pipeline and the roster of one chatroom.
//!
//! Sync reports `(prefix, low, high)` ranges. [`plan_fetches`] turns them
//! into fetches, switching to catch-up mode (latest sequence per prefix)
//! once the backlog reaches the threshold. [`FetchTracker`] keeps each
//! fetch's retry budget and guarantees a single outcome per fetch.

mod message;
mod outbox;
mod pipeline;
mod roster;

pub use message::{ChatMessage, MessageError, MessageType, UNKNOWN_SENDER};
pub use outbox::Outbox;
pub use pipeline::{
    plan_fetches, plan_introductions, plan_ranges, total_missing, FetchId, FetchPlan,
    FetchTracker, MissingData, TimeoutOutcome, DEFAULT_CATCH_UP_THRESHOLD,
    DEFAULT_MAX_INTRO_FETCHES,
};
pub use roster::{Roster, RosterEntry, RosterEvent};
