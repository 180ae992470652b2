// protocol/state_machine.rs - Invitation State Machine Trait

use std::fmt::Debug;

use super::invitation::InvitationError;
use crate::trust::IdentityError;

/// Protocol error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: &'static str, event: &'static str },

    #[error("Invitation error: {0}")]
    Invitation(#[from] InvitationError),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<IdentityError> for ProtocolError {
    fn from(e: IdentityError) -> Self {
        ProtocolError::Signing(e.to_string())
    }
}

/// Side of an invitation exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the invitation
    Inviter,
    /// Received the invitation
    Invitee,
}

/// Common view over both sides of an invitation
pub trait InvitationStateMachine: Send + Debug {
    fn role(&self) -> Role;

    /// Current state name (for logging)
    fn state_name(&self) -> &'static str;

    /// Check if the exchange reached a terminal state
    fn is_complete(&self) -> bool;

    /// Check if the exchange ended without trust being established
    fn is_failed(&self) -> bool;
}
