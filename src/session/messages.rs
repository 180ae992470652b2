// session/messages.rs - Session Actor Messages

use actix::prelude::*;

use crate::chat::{FetchId, MessageError, MissingData, RosterEntry};
use crate::packet::{Data, Interest};
use crate::protocol::{Invitation, ProtocolError};
use crate::trust::Contact;

/// Sync layer reported data we do not have yet
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct TreeUpdate {
    pub missing: Vec<MissingData>,
}

/// Data answering an interest the session expressed
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct DataFetched {
    pub id: FetchId,
    pub data: Data,
}

/// An interest the session expressed expired
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct FetchTimedOut {
    pub id: FetchId,
}

/// Interest addressed to us: an invitation or a certificate request
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct InterestReceived {
    pub interest: Interest,
}

/// Invite a contact into this chatroom
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct SendInvitation {
    pub contact: Contact,
    pub is_introducer: bool,
}

/// User decision on an invitation surfaced through `ChatView::invitation_received`
///
/// Accepting returns the invitation so the caller can start a session for
/// that chatroom with [`super::ChatSession::with_inviter`].
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<Option<Invitation>, SessionError>")]
pub struct RespondInvitation {
    pub token: u64,
    pub accept: bool,
}

/// Publish a chat line
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct SendChat {
    pub text: String,
}

/// Current roster
#[derive(Message)]
#[rtype(result = "Vec<RosterEntry>")]
pub struct GetRoster;

/// Announce LEAVE and stop
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Session error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Unknown invitation: {0}")]
    UnknownInvitation(u64),

    #[error("Already a member of chatroom {0}")]
    AlreadyJoined(String),
}
