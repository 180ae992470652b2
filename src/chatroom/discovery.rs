// chatroom/discovery.rs - Chatroom Discovery State

use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::info::{ChatroomError, ChatroomInfo};
use crate::name::{Component, Name};
use crate::packet::{Data, Interest};
use crate::trust::Identity;

/// `<broadcast root>/chronochat/chatroom-list`
pub const DISCOVERY_COMPONENTS: [&str; 2] = ["chronochat", "chatroom-list"];

/// Minimum time before a discovered room is refreshed
pub const DEFAULT_REFRESH_MS: u64 = 10_000;

/// Pause after a discovery round found nothing new
pub const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 600_000;

/// Lifetime of discovery and refresh interests
pub const DISCOVERY_LIFETIME_MS: u64 = 10_000;

/// Freshness of the room descriptions we serve
pub const INFO_FRESHNESS_MS: u64 = 10_000;

pub fn discovery_prefix(broadcast_root: &Name) -> Name {
    DISCOVERY_COMPONENTS
        .iter()
        .fold(broadcast_root.clone(), |name, component| name.append(*component))
}

/// A room learned from a discovery or refresh reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub info: ChatroomInfo,

    /// Express `refresh_interest(info.name)` after this long
    pub refresh_after_ms: u64,

    /// Keep discovering with this interest (initial discovery only)
    pub next_discovery: Option<Interest>,
}

/// Known chatrooms: our own plus those discovered on the network
///
/// Local rooms are answered, never discovered or refreshed. Every other
/// room stays listed until a refresh goes unanswered.
#[derive(Debug)]
pub struct ChatroomDiscovery {
    prefix: Name,

    refresh_ms: u64,

    discovery_interval_ms: u64,

    local: BTreeMap<String, ChatroomInfo>,

    discovered: BTreeMap<String, ChatroomInfo>,
}

impl ChatroomDiscovery {
    pub fn new(broadcast_root: &Name) -> Self {
        Self {
            prefix: discovery_prefix(broadcast_root),
            refresh_ms: DEFAULT_REFRESH_MS,
            discovery_interval_ms: DEFAULT_DISCOVERY_INTERVAL_MS,
            local: BTreeMap::new(),
            discovered: BTreeMap::new(),
        }
    }

    pub fn with_intervals(mut self, refresh_ms: u64, discovery_interval_ms: u64) -> Self {
        self.refresh_ms = refresh_ms;
        self.discovery_interval_ms = discovery_interval_ms;
        self
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn discovery_interval_ms(&self) -> u64 {
        self.discovery_interval_ms
    }

    pub fn add_local_chatroom(&mut self, info: ChatroomInfo) {
        debug!(chatroom = %info.name, "Local chatroom advertised");
        self.discovered.remove(&info.name);
        self.local.insert(info.name.clone(), info);
    }

    pub fn remove_local_chatroom(&mut self, chatroom: &str) -> Option<ChatroomInfo> {
        self.local.remove(chatroom)
    }

    /// Local and discovered rooms, by name
    pub fn chatrooms(&self) -> impl Iterator<Item = &ChatroomInfo> {
        self.local.values().chain(self.discovered.values())
    }

    pub fn get(&self, chatroom: &str) -> Option<&ChatroomInfo> {
        self.local.get(chatroom).or_else(|| self.discovered.get(chatroom))
    }

    pub fn is_local(&self, chatroom: &str) -> bool {
        self.local.contains_key(chatroom)
    }

    /// Ask for any room we do not know yet
    pub fn discovery_interest(&self) -> Interest {
        let known = self
            .chatrooms()
            .map(ChatroomInfo::name_component)
            .collect::<Vec<_>>();
        Interest::new(self.prefix.clone())
            .with_must_be_fresh(true)
            .with_lifetime(DISCOVERY_LIFETIME_MS)
            .with_exclude(known)
    }

    pub fn refresh_interest(&self, chatroom: &str) -> Interest {
        Interest::new(self.prefix.clone().append(chatroom))
            .with_must_be_fresh(true)
            .with_lifetime(DISCOVERY_LIFETIME_MS)
    }

    /// Answer a discovery or refresh interest from one of our local rooms
    pub fn answer(&self, interest: &Interest, identity: &Identity) -> Result<Option<Data>, ChatroomError> {
        let name = interest.name();
        if !self.prefix.is_prefix_of(name) {
            return Ok(None);
        }

        let info = match name.len() - self.prefix.len() {
            // discovery: the first room the asker does not know yet
            0 => self
                .local
                .values()
                .find(|info| !interest.is_excluded(&info.name_component())),
            // refresh
            1 => self.room_named(name).and_then(|room| self.local.get(&room)),
            _ => None,
        };
        let Some(info) = info else {
            trace!(name = %name, "No local chatroom to answer with");
            return Ok(None);
        };

        let mut data = Data::new(self.prefix.clone().append(info.name_component()), info.encode()?)
            .with_freshness(INFO_FRESHNESS_MS);
        identity.sign_data(&mut data)?;
        Ok(Some(data))
    }

    /// A reply to a discovery (`refreshing == false`) or refresh interest
    pub fn on_data(&mut self, data: &Data, refreshing: bool) -> Result<Option<Discovered>, ChatroomError> {
        if data.name().len() != self.prefix.len() + 1 || !self.prefix.is_prefix_of(data.name()) {
            return Err(ChatroomError::Decode(format!("unexpected name {}", data.name())));
        }
        let room = self.room_named(data.name()).ok_or(ChatroomError::InvalidName)?;
        if self.is_local(&room) {
            trace!(chatroom = %room, "Reply about a local chatroom ignored");
            return Ok(None);
        }

        let mut info = ChatroomInfo::decode(data.content())?;
        info.name = room.clone();
        debug!(
            chatroom = %room,
            participants = info.participants().len(),
            trust_model = info.trust_model.as_str(),
            refreshing,
            "Chatroom discovered"
        );
        self.discovered.insert(room, info.clone());

        let refresh_after_ms = data.freshness_ms().unwrap_or(0).max(self.refresh_ms);
        let next_discovery = (!refreshing).then(|| self.discovery_interest());
        Ok(Some(Discovered {
            info,
            refresh_after_ms,
            next_discovery,
        }))
    }

    /// A refresh went unanswered; the room is gone
    pub fn on_refresh_timeout(&mut self, chatroom: &str) -> Option<ChatroomInfo> {
        let lost = self.discovered.remove(chatroom);
        if lost.is_some() {
            debug!(chatroom, "Chatroom lost");
        }
        lost
    }

    fn room_named(&self, name: &Name) -> Option<String> {
        name.get(self.prefix.len() as isize)
            .map(Component::as_bytes)
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn room(chatroom: &str, owner: &str) -> ChatroomInfo {
        let mut info = ChatroomInfo::new(chatroom, name("/ndn/broadcast/chronos").append(chatroom));
        info.add_participant(name(owner));
        info
    }

    fn discovery() -> ChatroomDiscovery {
        ChatroomDiscovery::new(&name("/ndn/broadcast"))
    }

    #[test]
    fn test_discovery_interest_excludes_known_rooms() {
        let mut d = discovery();
        assert_eq!(d.prefix(), &name("/ndn/broadcast/chronochat/chatroom-list"));
        d.add_local_chatroom(room("lobby", "/ndn/alice"));

        let interest = d.discovery_interest();
        assert_eq!(interest.name(), d.prefix());
        assert!(interest.must_be_fresh());
        assert_eq!(interest.lifetime_ms(), DISCOVERY_LIFETIME_MS);
        assert_eq!(interest.exclude(), &[Component::from("lobby")]);
    }

    #[test]
    fn test_answers_discovery_and_refresh() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let mut d = discovery();
        d.add_local_chatroom(room("lobby", "/ndn/alice"));
        d.add_local_chatroom(room("music", "/ndn/alice"));

        // first room not excluded by the asker
        let asked = Interest::new(d.prefix().clone()).with_exclude([Component::from("lobby")]);
        let data = d.answer(&asked, &alice).unwrap().unwrap();
        assert_eq!(data.name(), &d.prefix().clone().append("music"));
        assert_eq!(data.freshness_ms(), Some(INFO_FRESHNESS_MS));
        assert!(data.signature().is_some());

        let refresh = d.refresh_interest("lobby");
        let data = d.answer(&refresh, &alice).unwrap().unwrap();
        assert_eq!(ChatroomInfo::decode(data.content()).unwrap().name, "lobby");

        let everything_known = Interest::new(d.prefix().clone())
            .with_exclude([Component::from("lobby"), Component::from("music")]);
        assert_eq!(d.answer(&everything_known, &alice).unwrap(), None);
        assert_eq!(d.answer(&d.refresh_interest("unknown"), &alice).unwrap(), None);
        assert_eq!(d.answer(&Interest::new(name("/elsewhere")), &alice).unwrap(), None);
    }

    #[test]
    fn test_discovered_room_lifecycle() {
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let mut remote = discovery();
        remote.add_local_chatroom(room("garage", "/ndn/bob"));
        let reply = remote
            .answer(&remote.refresh_interest("garage"), &bob)
            .unwrap()
            .unwrap();

        let mut d = discovery().with_intervals(5_000, 60_000);
        let found = d.on_data(&reply, false).unwrap().unwrap();
        assert_eq!(found.info.name, "garage");
        assert_eq!(found.info.participants(), &[name("/ndn/bob")]);
        // served freshness is longer than our refresh floor
        assert_eq!(found.refresh_after_ms, INFO_FRESHNESS_MS);
        let next = found.next_discovery.unwrap();
        assert_eq!(next.exclude(), &[Component::from("garage")]);

        let refreshed = d.on_data(&reply, true).unwrap().unwrap();
        assert!(refreshed.next_discovery.is_none());
        assert_eq!(d.chatrooms().count(), 1);

        assert_eq!(d.on_refresh_timeout("garage").unwrap().name, "garage");
        assert!(d.on_refresh_timeout("garage").is_none());
        assert!(d.get("garage").is_none());
    }

    #[test]
    fn test_rejects_foreign_and_local_replies() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let mut d = discovery();
        d.add_local_chatroom(room("lobby", "/ndn/alice"));

        let own = d.answer(&d.refresh_interest("lobby"), &alice).unwrap().unwrap();
        assert_eq!(d.on_data(&own, false).unwrap(), None);

        let foreign = Data::new(name("/ndn/broadcast/other/lobby"), Vec::new());
        assert!(matches!(d.on_data(&foreign, false), Err(ChatroomError::Decode(_))));

        let garbage = Data::new(d.prefix().clone().append("x"), vec![1, 2, 3]);
        assert!(d.on_data(&garbage, false).is_err());
        assert!(d.get("x").is_none());
    }
}
