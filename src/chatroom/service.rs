// chatroom/service.rs - Chatroom Discovery Actor

use actix::prelude::*;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::discovery::ChatroomDiscovery;
use super::info::ChatroomInfo;
use crate::chat::{FetchTracker, TimeoutOutcome};
use crate::packet::Interest;
use crate::session::{
    DataFetched, DiscoveryView, FetchTimedOut, InterestReceived, SyncTransport,
};
use crate::trust::Identity;

/// Advertise one of our chatrooms on the discovery prefix
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct AddLocalChatroom {
    pub info: ChatroomInfo,
}

#[derive(Message, Clone, Debug)]
#[rtype(result = "Option<ChatroomInfo>")]
pub struct RemoveLocalChatroom {
    pub chatroom: String,
}

/// Local and discovered rooms
#[derive(Message, Clone, Debug)]
#[rtype(result = "Vec<ChatroomInfo>")]
pub struct ListChatrooms;

#[derive(Debug)]
enum DiscoveryFetch {
    Discovery,
    Refresh { chatroom: String },
}

/// Finds chatrooms on the broadcast prefix and answers for our own
pub struct DiscoveryService {
    discovery: ChatroomDiscovery,

    identity: Identity,

    fetches: FetchTracker<DiscoveryFetch>,

    transport: Box<dyn SyncTransport>,

    view: Box<dyn DiscoveryView>,
}

impl DiscoveryService {
    pub fn new(
        discovery: ChatroomDiscovery,
        identity: Identity,
        transport: impl SyncTransport + 'static,
        view: impl DiscoveryView + 'static,
    ) -> Self {
        Self {
            discovery,
            identity,
            fetches: FetchTracker::new(),
            transport: Box::new(transport),
            view: Box::new(view),
        }
    }

    fn express(&mut self, interest: Interest, target: DiscoveryFetch) {
        let id = self.fetches.register(interest.clone(), 0, target);
        self.transport.express_interest(id, interest);
    }

    fn discover(&mut self) {
        let interest = self.discovery.discovery_interest();
        trace!(known = interest.exclude().len(), "Sending discovery interest");
        self.express(interest, DiscoveryFetch::Discovery);
    }

    fn refresh(&mut self, chatroom: String) {
        if self.discovery.get(&chatroom).is_none() || self.discovery.is_local(&chatroom) {
            return;
        }
        let interest = self.discovery.refresh_interest(&chatroom);
        self.express(interest, DiscoveryFetch::Refresh { chatroom });
    }

    fn on_data(&mut self, msg: DataFetched, ctx: &mut Context<Self>) {
        let Some(target) = self.fetches.complete(msg.id) else {
            trace!(id = %msg.id, "Late discovery data dropped");
            return;
        };
        let refreshing = matches!(target, DiscoveryFetch::Refresh { .. });

        let found = match self.discovery.on_data(&msg.data, refreshing) {
            Ok(Some(found)) => found,
            Ok(None) => return,
            Err(e) => {
                debug!(name = %msg.data.name(), error = %e, "Undecodable chatroom description");
                if !refreshing {
                    self.discover();
                }
                return;
            }
        };

        self.view.chatroom_updated(&found.info, true);
        let chatroom = found.info.name.clone();
        ctx.run_later(Duration::from_millis(found.refresh_after_ms), move |service, _ctx| {
            service.refresh(chatroom);
        });
        if let Some(interest) = found.next_discovery {
            self.express(interest, DiscoveryFetch::Discovery);
        }
    }

    fn on_timeout(&mut self, msg: FetchTimedOut, ctx: &mut Context<Self>) {
        match self.fetches.on_timeout(msg.id) {
            TimeoutOutcome::Expired(DiscoveryFetch::Discovery) => {
                let pause = Duration::from_millis(self.discovery.discovery_interval_ms());
                debug!(?pause, "Discovery round finished");
                ctx.run_later(pause, |service, _ctx| service.discover());
            }
            TimeoutOutcome::Expired(DiscoveryFetch::Refresh { chatroom }) => {
                if let Some(lost) = self.discovery.on_refresh_timeout(&chatroom) {
                    self.view.chatroom_updated(&lost, false);
                }
            }
            TimeoutOutcome::Retry(interest) => {
                // registered without retries
                warn!(name = %interest.name(), "Unexpected discovery retry");
            }
            TimeoutOutcome::Unknown => trace!(id = %msg.id, "Timeout for a settled fetch"),
        }
    }

    fn on_interest(&mut self, interest: Interest) {
        match self.discovery.answer(&interest, &self.identity) {
            Ok(Some(data)) => self.transport.put(data),
            Ok(None) => {}
            Err(e) => warn!(name = %interest.name(), error = %e, "Chatroom description not served"),
        }
    }
}

impl Actor for DiscoveryService {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(prefix = %self.discovery.prefix(), "Chatroom discovery starting");
        self.discover();
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        self.fetches.clear();
        Running::Stop
    }
}

impl Handler<DataFetched> for DiscoveryService {
    type Result = ();

    fn handle(&mut self, msg: DataFetched, ctx: &mut Self::Context) {
        self.on_data(msg, ctx);
    }
}

impl Handler<FetchTimedOut> for DiscoveryService {
    type Result = ();

    fn handle(&mut self, msg: FetchTimedOut, ctx: &mut Self::Context) {
        self.on_timeout(msg, ctx);
    }
}

impl Handler<InterestReceived> for DiscoveryService {
    type Result = ();

    fn handle(&mut self, msg: InterestReceived, _ctx: &mut Self::Context) {
        self.on_interest(msg.interest);
    }
}

impl Handler<AddLocalChatroom> for DiscoveryService {
    type Result = ();

    fn handle(&mut self, msg: AddLocalChatroom, _ctx: &mut Self::Context) {
        self.discovery.add_local_chatroom(msg.info);
    }
}

impl Handler<RemoveLocalChatroom> for DiscoveryService {
    type Result = Option<ChatroomInfo>;

    fn handle(&mut self, msg: RemoveLocalChatroom, _ctx: &mut Self::Context) -> Self::Result {
        self.discovery.remove_local_chatroom(&msg.chatroom)
    }
}

impl Handler<ListChatrooms> for DiscoveryService {
    type Result = Vec<ChatroomInfo>;

    fn handle(&mut self, _msg: ListChatrooms, _ctx: &mut Self::Context) -> Self::Result {
        self.discovery.chatrooms().cloned().collect()
    }
}
