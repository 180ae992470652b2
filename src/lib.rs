// lib.rs - ChronoChat Trust and Invitation Core
//
// Named-data chatrooms where every message is signed and checked against
// a per-room trust policy bootstrapped through signed invitations.

#![doc = include_str!("../README.md")]

pub mod chat;
pub mod chatroom;
pub mod config;
pub mod name;
pub mod observability;
pub mod packet;
pub mod policy;
pub mod protocol;
pub mod session;
pub mod trust;
pub mod validator;

// Re-export commonly used types
pub use chat::{ChatMessage, MessageType, MissingData, Roster};

pub use chatroom::{ChatroomDiscovery, ChatroomInfo, DiscoveryService, TrustModel};

pub use config::{ChatConfig, ConfigError};

pub use name::{Component, Name, NameError};

pub use packet::{Data, Interest, SignedObject};

pub use protocol::{
    IncomingInvitation, IntroCertificate, IntroRole, Invitation, InvitationReply,
    OutgoingInvitation, ProtocolError,
};

pub use session::{
    ChatSession, ChatView, DiscoveryView, SessionError, SessionSettings, SyncTransport,
};

pub use trust::{Certificate, Contact, ContactStore, Identity, TrustAnchorStore};

pub use validator::{Validation, ValidationFailure, ValidationRequest, Validator};

pub use observability::{
    init_metrics, init_tracing, MetricsConfig, MetricsHandle, TracingConfig, TracingFormat,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::chat::{ChatMessage, MessageType, MissingData};
    pub use crate::chatroom::{AddLocalChatroom, ChatroomInfo, DiscoveryService, ListChatrooms};
    pub use crate::name::Name;
    pub use crate::packet::{Data, Interest, SignedObject};
    pub use crate::protocol::{Invitation, IntroRole};
    pub use crate::session::{
        ChatSession, ChatView, DataFetched, FetchTimedOut, InterestReceived, RespondInvitation,
        SendChat, SendInvitation, Shutdown, SyncTransport, TreeUpdate,
    };
    pub use crate::trust::{Contact, Identity};
    pub use crate::validator::{Validation, Validator};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
