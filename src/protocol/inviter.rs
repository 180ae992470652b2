// protocol/inviter.rs - Inviter Side of the Invitation Exchange

use tracing::{debug, info};

use super::invitation::{Invitation, InvitationReply};
use super::state_machine::*;
use crate::name::Name;
use crate::observability::record_invitation;
use crate::packet::{Data, Interest};
use crate::trust::{Certificate, Identity};

/// Inviter states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviterState {
    /// Built but not sent
    Idle,
    /// Request sent, waiting for a reply
    Invited,
    /// Reply validated, invitee admitted
    Accepted,
    /// Invitee answered a validated `nack`
    Rejected,
    /// Retry budget exhausted
    TimedOut,
    /// Reply arrived but did not validate
    ValidationFailed,
}

impl InviterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviterState::Idle => "idle",
            InviterState::Invited => "invited",
            InviterState::Accepted => "accepted",
            InviterState::Rejected => "rejected",
            InviterState::TimedOut => "timed_out",
            InviterState::ValidationFailed => "validation_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InviterEvent {
    Send,
    Retry,
    Exhausted,
    Nack,
    Validated,
    Invalid,
}

impl InviterEvent {
    fn as_str(&self) -> &'static str {
        match self {
            InviterEvent::Send => "send",
            InviterEvent::Retry => "retry",
            InviterEvent::Exhausted => "exhausted",
            InviterEvent::Nack => "nack",
            InviterEvent::Validated => "validated",
            InviterEvent::Invalid => "invalid",
        }
    }
}

/// What to do after an interest lifetime expired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Express the same interest again
    Retry(Interest),
    /// Give up; the exchange is now `TimedOut`
    GiveUp,
}

/// What a reply means for the exchange
///
/// Acceptances and rejections alike are only acted on once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAction {
    /// Run the validator over the reply, then call `on_validated` or `on_validation_failed`
    Validate,
    /// Reply could not be decoded; the exchange is now `ValidationFailed`
    Invalid,
}

/// Outcome of a validated reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedReply {
    Accepted(AcceptedInvitee),
    /// The exchange is now `Rejected`
    Rejected,
}

/// Invitee admission data extracted from a validated reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedInvitee {
    pub namespace: Name,

    pub routing_prefix: Name,

    pub certificate: Certificate,

    pub is_introducer: bool,
}

/// One outgoing invitation
#[derive(Debug)]
pub struct OutgoingInvitation {
    state: InviterState,

    invitation: Invitation,

    is_introducer: bool,

    retries_left: u32,

    interest: Option<Interest>,

    reply: Option<InvitationReply>,
}

impl OutgoingInvitation {
    pub fn new(invitation: Invitation, is_introducer: bool, retries: u32) -> Self {
        Self {
            state: InviterState::Idle,
            invitation,
            is_introducer,
            retries_left: retries,
            interest: None,
            reply: None,
        }
    }

    pub fn state(&self) -> InviterState {
        self.state
    }

    pub fn invitation(&self) -> &Invitation {
        &self.invitation
    }

    pub fn invitee(&self) -> &Name {
        &self.invitation.invitee_namespace
    }

    pub fn is_introducer(&self) -> bool {
        self.is_introducer
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// The signed request, once sent
    pub fn interest(&self) -> Option<&Interest> {
        self.interest.as_ref()
    }

    fn transition(&self, event: InviterEvent) -> Result<InviterState, ProtocolError> {
        use InviterEvent::*;
        use InviterState::*;

        match (self.state, event) {
            (Idle, Send) => Ok(Invited),
            (Invited, Retry) => Ok(Invited),
            (Invited, Exhausted) => Ok(TimedOut),
            (Invited, Nack) => Ok(Rejected),
            (Invited, Validated) => Ok(Accepted),
            (Invited, Invalid) => Ok(ValidationFailed),
            (state, event) => Err(ProtocolError::InvalidTransition {
                from: state.as_str(),
                event: event.as_str(),
            }),
        }
    }

    fn apply(&mut self, event: InviterEvent) -> Result<(), ProtocolError> {
        let next = self.transition(event)?;
        debug!(
            invitee = %self.invitation.invitee_namespace,
            from = self.state.as_str(),
            to = next.as_str(),
            "Invitation transition"
        );
        self.state = next;
        Ok(())
    }

    /// Sign the request with the inviter's key
    pub fn send(&mut self, identity: &Identity, broadcast_root: &Name) -> Result<Interest, ProtocolError> {
        self.transition(InviterEvent::Send)?;
        let request_name = self.invitation.request_name(broadcast_root)?;
        let interest = identity.sign_interest(request_name)?;

        self.apply(InviterEvent::Send)?;
        self.interest = Some(interest.clone());
        info!(invitee = %self.invitation.invitee_namespace, chatroom = %self.invitation.chatroom, "Invitation sent");
        Ok(interest)
    }

    /// The request expired without a reply
    pub fn on_timeout(&mut self) -> Result<TimeoutAction, ProtocolError> {
        match (self.retries_left, self.interest.clone()) {
            (n, Some(interest)) if n > 0 => {
                self.apply(InviterEvent::Retry)?;
                self.retries_left = n - 1;
                Ok(TimeoutAction::Retry(interest))
            }
            _ => {
                self.apply(InviterEvent::Exhausted)?;
                record_invitation("timed_out");
                Ok(TimeoutAction::GiveUp)
            }
        }
    }

    /// A reply arrived; decide whether it needs validation
    pub fn on_reply(&mut self, reply: &Data) -> Result<ReplyAction, ProtocolError> {
        if self.state != InviterState::Invited {
            return Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event: "reply",
            });
        }

        let request_name = self
            .interest
            .as_ref()
            .map(|interest| interest.name().clone())
            .unwrap_or_default();

        match InvitationReply::parse(reply, &request_name) {
            Ok(parsed) => {
                self.reply = Some(parsed);
                Ok(ReplyAction::Validate)
            }
            Err(e) => {
                debug!(error = %e, "Undecodable invitation reply");
                self.apply(InviterEvent::Invalid)?;
                record_invitation("invalid");
                Ok(ReplyAction::Invalid)
            }
        }
    }

    /// The reply validated; hand back what is needed to admit the invitee
    pub fn on_validated(&mut self) -> Result<ValidatedReply, ProtocolError> {
        match self.reply.take() {
            Some(InvitationReply::Accepted { routing_prefix, certificate }) => {
                self.apply(InviterEvent::Validated)?;
                record_invitation("accepted");
                info!(invitee = %self.invitation.invitee_namespace, "Invitation accepted");

                Ok(ValidatedReply::Accepted(AcceptedInvitee {
                    namespace: self.invitation.invitee_namespace.clone(),
                    routing_prefix,
                    certificate,
                    is_introducer: self.is_introducer,
                }))
            }
            Some(InvitationReply::Rejected) => {
                self.apply(InviterEvent::Nack)?;
                record_invitation("rejected");
                info!(invitee = %self.invitation.invitee_namespace, "Invitation rejected");
                Ok(ValidatedReply::Rejected)
            }
            None => Err(ProtocolError::InvalidTransition {
                from: self.state.as_str(),
                event: InviterEvent::Validated.as_str(),
            }),
        }
    }

    pub fn on_validation_failed(&mut self) -> Result<(), ProtocolError> {
        self.reply = None;
        self.apply(InviterEvent::Invalid)?;
        record_invitation("invalid");
        Ok(())
    }

    /// User-facing message for terminal failures
    pub fn notification(&self) -> Option<String> {
        let invitee = &self.invitation.invitee_namespace;
        match self.state {
            InviterState::Rejected => Some(format!("{} rejected your invitation", invitee)),
            InviterState::TimedOut => Some(format!("invitation to {} timed out", invitee)),
            InviterState::ValidationFailed => {
                Some(format!("reply from {} could not be validated", invitee))
            }
            _ => None,
        }
    }
}

impl InvitationStateMachine for OutgoingInvitation {
    fn role(&self) -> Role {
        Role::Inviter
    }

    fn state_name(&self) -> &'static str {
        self.state.as_str()
    }

    fn is_complete(&self) -> bool {
        !matches!(self.state, InviterState::Idle | InviterState::Invited)
    }

    fn is_failed(&self) -> bool {
        matches!(
            self.state,
            InviterState::Rejected | InviterState::TimedOut | InviterState::ValidationFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::invitation::InvitationReply;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn setup(retries: u32) -> (Identity, Identity, OutgoingInvitation) {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let invitation = Invitation::new(
            bob.namespace().clone(),
            "lobby",
            name("/private/local/ndn/alice/lobby"),
            alice.dsk_certificate().clone(),
            1,
        );
        (alice, bob, OutgoingInvitation::new(invitation, true, retries))
    }

    #[test]
    fn test_accept_flow() {
        let (alice, bob, mut outgoing) = setup(2);
        let interest = outgoing.send(&alice, &name("/ndn/broadcast")).unwrap();
        assert_eq!(outgoing.state(), InviterState::Invited);

        let prefix = name("/private/local/ndn/bob/lobby");
        let reply = InvitationReply::accept(interest.name(), &prefix, bob.dsk_certificate()).unwrap();
        assert_eq!(outgoing.on_reply(&reply).unwrap(), ReplyAction::Validate);
        assert_eq!(outgoing.state(), InviterState::Invited);

        let ValidatedReply::Accepted(accepted) = outgoing.on_validated().unwrap() else {
            panic!("expected an acceptance");
        };
        assert_eq!(accepted.routing_prefix, prefix);
        assert_eq!(accepted.namespace, name("/ndn/bob"));
        assert!(accepted.is_introducer);
        assert!(outgoing.is_complete());
        assert!(!outgoing.is_failed());
        assert_eq!(outgoing.notification(), None);
    }

    #[test]
    fn test_reject_flow() {
        let (alice, _, mut outgoing) = setup(2);
        let interest = outgoing.send(&alice, &name("/ndn/broadcast")).unwrap();

        let reply = InvitationReply::reject(interest.name());
        assert_eq!(outgoing.on_reply(&reply).unwrap(), ReplyAction::Validate);
        // nothing is decided before the reply validates
        assert_eq!(outgoing.state(), InviterState::Invited);
        assert_eq!(outgoing.notification(), None);

        assert_eq!(outgoing.on_validated().unwrap(), ValidatedReply::Rejected);
        assert_eq!(outgoing.state(), InviterState::Rejected);
        assert_eq!(outgoing.notification().unwrap(), "/ndn/bob rejected your invitation");
    }

    #[test]
    fn test_unvalidated_nack_is_not_a_rejection() {
        let (alice, _, mut outgoing) = setup(2);
        let interest = outgoing.send(&alice, &name("/ndn/broadcast")).unwrap();

        let reply = InvitationReply::reject(interest.name());
        assert_eq!(outgoing.on_reply(&reply).unwrap(), ReplyAction::Validate);
        outgoing.on_validation_failed().unwrap();
        assert_eq!(outgoing.state(), InviterState::ValidationFailed);
        assert_eq!(
            outgoing.notification().unwrap(),
            "reply from /ndn/bob could not be validated"
        );
    }

    #[test]
    fn test_timeout_after_retries() {
        let (alice, _, mut outgoing) = setup(2);
        let interest = outgoing.send(&alice, &name("/ndn/broadcast")).unwrap();

        assert_eq!(outgoing.on_timeout().unwrap(), TimeoutAction::Retry(interest.clone()));
        assert_eq!(outgoing.on_timeout().unwrap(), TimeoutAction::Retry(interest));
        assert_eq!(outgoing.retries_left(), 0);
        assert_eq!(outgoing.on_timeout().unwrap(), TimeoutAction::GiveUp);
        assert_eq!(outgoing.state(), InviterState::TimedOut);
        assert_eq!(outgoing.notification().unwrap(), "invitation to /ndn/bob timed out");

        // a terminal exchange does not time out twice
        assert!(outgoing.on_timeout().is_err());
    }

    #[test]
    fn test_validation_failure_is_distinct() {
        let (alice, bob, mut outgoing) = setup(0);
        let interest = outgoing.send(&alice, &name("/ndn/broadcast")).unwrap();
        let reply = InvitationReply::accept(interest.name(), &name("/p"), bob.dsk_certificate()).unwrap();

        outgoing.on_reply(&reply).unwrap();
        outgoing.on_validation_failed().unwrap();
        assert_eq!(outgoing.state(), InviterState::ValidationFailed);
        assert_eq!(
            outgoing.notification().unwrap(),
            "reply from /ndn/bob could not be validated"
        );
        assert!(outgoing.on_validated().is_err());
    }

    #[test]
    fn test_reply_before_send_is_rejected() {
        let (_, _, mut outgoing) = setup(1);
        let reply = InvitationReply::reject(&name("/x"));
        assert!(matches!(
            outgoing.on_reply(&reply),
            Err(ProtocolError::InvalidTransition { from: "idle", .. })
        ));
    }
}
