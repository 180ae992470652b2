// session/transport.rs - Sync Transport and Chat View Seams

use parking_lot::Mutex;
use std::sync::Arc;

use crate::chat::{ChatMessage, FetchId, RosterEntry};
use crate::chatroom::ChatroomInfo;
use crate::name::Name;
use crate::packet::{Data, Interest};
use crate::protocol::Invitation;

/// Network side of a session
///
/// Completions come back to the actor as `DataFetched` / `FetchTimedOut`
/// messages carrying the same `FetchId`.
pub trait SyncTransport {
    fn express_interest(&mut self, id: FetchId, interest: Interest);

    /// Announce new data under our sync prefix
    fn publish(&mut self, data: Data);

    /// Answer an interest we received
    fn put(&mut self, data: Data);
}

/// Rendering side of a session
pub trait ChatView {
    fn append_message(&mut self, msg: &ChatMessage, is_history: bool);

    fn msg_received(&mut self, prefix: &Name, nick: &str);

    fn process_remove(&mut self, prefix: &Name);

    fn roster_changed(&mut self, stale: &[RosterEntry]);

    fn notify(&mut self, text: String);

    /// A validated invitation awaiting the user's decision
    fn invitation_received(&mut self, token: u64, invitation: &Invitation);
}

/// Rendering side of chatroom discovery
pub trait DiscoveryView {
    /// A room appeared (`present`) or stopped answering refreshes
    fn chatroom_updated(&mut self, info: &ChatroomInfo, present: bool);
}

/// Everything a [`MemoryTransport`] was asked to do
#[derive(Debug, Default)]
pub struct TransportLog {
    pub interests: Vec<(FetchId, Interest)>,
    pub published: Vec<Data>,
    pub put: Vec<Data>,
}

/// Transport that records calls for later inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Arc<Mutex<TransportLog>> {
        self.log.clone()
    }
}

impl SyncTransport for MemoryTransport {
    fn express_interest(&mut self, id: FetchId, interest: Interest) {
        self.log.lock().interests.push((id, interest));
    }

    fn publish(&mut self, data: Data) {
        self.log.lock().published.push(data);
    }

    fn put(&mut self, data: Data) {
        self.log.lock().put.push(data);
    }
}

/// Everything a [`RecordingView`] was shown
#[derive(Debug, Default)]
pub struct ViewLog {
    pub messages: Vec<(ChatMessage, bool)>,
    pub received: Vec<(Name, String)>,
    pub removed: Vec<Name>,
    pub stale: Vec<Name>,
    pub notifications: Vec<String>,
    pub invitations: Vec<(u64, Invitation)>,
    pub chatrooms: Vec<(String, bool)>,
}

/// View that records calls for later inspection
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    log: Arc<Mutex<ViewLog>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Arc<Mutex<ViewLog>> {
        self.log.clone()
    }
}

impl ChatView for RecordingView {
    fn append_message(&mut self, msg: &ChatMessage, is_history: bool) {
        self.log.lock().messages.push((msg.clone(), is_history));
    }

    fn msg_received(&mut self, prefix: &Name, nick: &str) {
        self.log.lock().received.push((prefix.clone(), nick.to_owned()));
    }

    fn process_remove(&mut self, prefix: &Name) {
        self.log.lock().removed.push(prefix.clone());
    }

    fn roster_changed(&mut self, stale: &[RosterEntry]) {
        self.log
            .lock()
            .stale
            .extend(stale.iter().map(|entry| entry.prefix.clone()));
    }

    fn notify(&mut self, text: String) {
        self.log.lock().notifications.push(text);
    }

    fn invitation_received(&mut self, token: u64, invitation: &Invitation) {
        self.log.lock().invitations.push((token, invitation.clone()));
    }
}

impl DiscoveryView for RecordingView {
    fn chatroom_updated(&mut self, info: &ChatroomInfo, present: bool) {
        self.log.lock().chatrooms.push((info.name.clone(), present));
    }
}
