// chatroom/mod.rs - Chatroom Discovery

//! Advertising and discovering chatrooms on the broadcast prefix.
//!
//! - [`ChatroomInfo`] - name, trust model, sync prefix, manager and participants
//! - [`ChatroomDiscovery`] - local rooms we answer for, remote rooms we found
//! - [`DiscoveryService`] - actor driving discovery over a `SyncTransport`
//!
//! A discovery interest names `<broadcast>/chronochat/chatroom-list` and
//! excludes every room the asker already knows. Each answer is followed
//! by another discovery round; each discovered room is refreshed by name
//! and dropped once a refresh goes unanswered.
//!
//! # Example
//!
//! ```ignore
//! use chronos_chat::chatroom::*;
//!
//! let discovery = ChatroomDiscovery::new(&broadcast_root);
//! let service = DiscoveryService::new(discovery, identity, transport, view).start();
//! service.send(AddLocalChatroom { info }).await?;
//! let rooms = service.send(ListChatrooms).await?;
//! ```

mod discovery;
mod info;
mod service;

pub use discovery::{
    discovery_prefix, ChatroomDiscovery, Discovered, DEFAULT_DISCOVERY_INTERVAL_MS,
    DEFAULT_REFRESH_MS, DISCOVERY_COMPONENTS, DISCOVERY_LIFETIME_MS, INFO_FRESHNESS_MS,
};
pub use info::{ChatroomError, ChatroomInfo, TrustModel};
pub use service::{AddLocalChatroom, DiscoveryService, ListChatrooms, RemoveLocalChatroom};
