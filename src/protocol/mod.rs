// protocol/mod.rs - Invitation Protocol

//! Bootstrapping trust for one chatroom relationship.
//!
//! - `OutgoingInvitation`: `Idle -> Invited -> {Accepted | Rejected | TimedOut | ValidationFailed}`
//! - `IncomingInvitation`: `Idle -> InvitationReceived -> {RespondedAccept | RespondedReject}`,
//!   or `Dropped` when the request fails validation
//! - `IntroCertificate`: published by the inviter once an invitee is admitted,
//!   announcing the newcomer and its role to the rest of the room
//!
//! The state machines never validate anything themselves. The session runs
//! the validator and reports the outcome through `on_validated` /
//! `on_validation_failed`.
//!
//! # Example
//!
//! ```ignore
//! use chronos_chat::protocol::*;
//!
//! let invitation = Invitation::new(bob_ns, "lobby", my_prefix, my_cert, now_ms());
//! let mut outgoing = OutgoingInvitation::new(invitation, false, 7);
//! let interest = outgoing.send(&identity, &broadcast_root)?;
//!
//! match outgoing.on_reply(&reply)? {
//!     ReplyAction::Validate => { /* run the validator, then on_validated() */ }
//!     ReplyAction::Invalid => { /* notify the user */ }
//! }
//! ```

mod intro;
mod invitation;
mod invitee;
mod inviter;
mod state_machine;

pub use intro::{signer_namespace, IntroCertificate, IntroRole, INTRO_CERT_COMPONENT};
pub use invitation::{invitation_prefix, Invitation, InvitationError, InvitationReply, NACK};
pub use invitee::{IncomingInvitation, InviteeState};
pub use inviter::{
    AcceptedInvitee, InviterState, OutgoingInvitation, ReplyAction, TimeoutAction, ValidatedReply,
};
pub use state_machine::{InvitationStateMachine, ProtocolError, Role};
