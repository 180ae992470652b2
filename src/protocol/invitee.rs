// protocol/invitee.rs - Invitee Side of the Invitation Exchange

use tracing::{debug, info};

use super::invitation::{Invitation, InvitationReply};
use super::state_machine::*;
use crate::name::Name;
use crate::observability::record_invitation;
use crate::packet::{Data, Interest};
use crate::trust::Identity;

/// Invitee states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteeState {
    /// Request parsed, not yet validated
    Idle,
    /// Validated and shown to the user
    InvitationReceived,
    RespondedAccept,
    RespondedReject,
    /// Failed validation; never shown
    Dropped,
}

impl InviteeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteeState::Idle => "idle",
            InviteeState::InvitationReceived => "invitation_received",
            InviteeState::RespondedAccept => "responded_accept",
            InviteeState::RespondedReject => "responded_reject",
            InviteeState::Dropped => "dropped",
        }
    }
}

/// One incoming invitation
#[derive(Debug)]
pub struct IncomingInvitation {
    state: InviteeState,

    interest: Interest,

    invitation: Invitation,
}

impl IncomingInvitation {
    /// Parse a signed invitation interest
    pub fn new(interest: Interest, broadcast_root: &Name) -> Result<Self, ProtocolError> {
        let invitation = Invitation::parse_signed(&interest, broadcast_root)?;
        Ok(Self {
            state: InviteeState::Idle,
            interest,
            invitation,
        })
    }

    pub fn state(&self) -> InviteeState {
        self.state
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn invitation(&self) -> &Invitation {
        &self.invitation
    }

    fn expect(&self, expected: InviteeState, event: &'static str) -> Result<(), ProtocolError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event,
            })
        }
    }

    fn enter(&mut self, next: InviteeState) {
        debug!(
            inviter = %self.invitation.inviter_namespace(),
            from = self.state.as_str(),
            to = next.as_str(),
            "Invitation transition"
        );
        self.state = next;
    }

    /// The request validated; surface it to the user
    pub fn on_validated(&mut self) -> Result<(), ProtocolError> {
        self.expect(InviteeState::Idle, "validated")?;
        self.enter(InviteeState::InvitationReceived);
        Ok(())
    }

    /// The request failed validation; drop it silently
    pub fn on_validation_failed(&mut self) -> Result<(), ProtocolError> {
        self.expect(InviteeState::Idle, "invalid")?;
        self.enter(InviteeState::Dropped);
        record_invitation("dropped");
        Ok(())
    }

    /// Build the signed accepting reply carrying our chat prefix and certificate
    pub fn accept(&mut self, identity: &Identity, routing_prefix: &Name) -> Result<Data, ProtocolError> {
        self.expect(InviteeState::InvitationReceived, "accept")?;
        let mut reply =
            InvitationReply::accept(self.interest.name(), routing_prefix, identity.dsk_certificate())?;
        identity.sign_data(&mut reply)?;

        self.enter(InviteeState::RespondedAccept);
        info!(
            inviter = %self.invitation.inviter_namespace(),
            chatroom = %self.invitation.chatroom,
            "Invitation accepted"
        );
        Ok(reply)
    }

    /// Build the signed `nack` reply
    pub fn reject(&mut self, identity: &Identity) -> Result<Data, ProtocolError> {
        self.expect(InviteeState::InvitationReceived, "reject")?;
        let mut reply = InvitationReply::reject(self.interest.name());
        identity.sign_data(&mut reply)?;

        self.enter(InviteeState::RespondedReject);
        info!(inviter = %self.invitation.inviter_namespace(), "Invitation rejected");
        Ok(reply)
    }
}

impl InvitationStateMachine for IncomingInvitation {
    fn role(&self) -> Role {
        Role::Invitee
    }

    fn state_name(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_complete(&self) -> bool {
        matches!(
            self.state,
            InviteeState::RespondedAccept | InviteeState::RespondedReject | InviteeState::Dropped
        )
    }

    fn is_failed(&self) -> bool {
        self.state == InviteeState::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SignedObject;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn incoming() -> (Identity, Identity, IncomingInvitation) {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let root = name("/ndn/broadcast");
        let invitation = Invitation::new(
            bob.namespace().clone(),
            "lobby",
            name("/private/local/ndn/alice/lobby"),
            alice.dsk_certificate().clone(),
            7,
        );
        let interest = alice.sign_interest(invitation.request_name(&root).unwrap()).unwrap();
        (alice, bob, IncomingInvitation::new(interest, &root).unwrap())
    }

    #[test]
    fn test_accept_builds_signed_reply() {
        let (_, bob, mut incoming) = incoming();
        assert_eq!(incoming.invitation().chatroom, "lobby");
        assert_eq!(incoming.invitation().inviter_namespace(), name("/ndn/alice"));

        // cannot answer before validation
        assert!(incoming.accept(&bob, &name("/p")).is_err());

        incoming.on_validated().unwrap();
        let prefix = name("/private/local/ndn/bob/lobby");
        let reply = incoming.accept(&bob, &prefix).unwrap();
        assert_eq!(incoming.state(), InviteeState::RespondedAccept);
        assert!(incoming.is_complete());

        let signed = SignedObject::from(reply.clone());
        assert!(signed.verify_with(bob.dsk_certificate().public_key()));
        assert_eq!(
            InvitationReply::parse(&reply, incoming.interest().name()).unwrap(),
            InvitationReply::Accepted {
                routing_prefix: prefix,
                certificate: bob.dsk_certificate().clone(),
            }
        );
    }

    #[test]
    fn test_reject_builds_nack() {
        let (_, bob, mut incoming) = incoming();
        incoming.on_validated().unwrap();
        let reply = incoming.reject(&bob).unwrap();
        assert_eq!(reply.content(), b"nack");
        assert_eq!(incoming.state(), InviteeState::RespondedReject);
        assert!(incoming.reject(&bob).is_err());
    }

    #[test]
    fn test_invalid_invitation_is_dropped() {
        let (_, bob, mut incoming) = incoming();
        incoming.on_validation_failed().unwrap();
        assert_eq!(incoming.state(), InviteeState::Dropped);
        assert!(incoming.is_failed());
        assert!(incoming.accept(&bob, &name("/p")).is_err());
    }

    #[test]
    fn test_unparseable_interest() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let interest = alice.sign_interest(name("/ndn/broadcast/chronos/invitation/x")).unwrap();
        assert!(matches!(
            IncomingInvitation::new(interest, &name("/ndn/broadcast")),
            Err(ProtocolError::Invitation(_))
        ));
    }
}
