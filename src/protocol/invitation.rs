// protocol/invitation.rs - Invitation Names and Replies

use thiserror::Error;

use crate::name::{Component, Name};
use crate::packet::{Data, Interest, PacketError};
use crate::policy::{CHATROOM_COMPONENT, CHRONOS_COMPONENT, INVITATION_COMPONENT};
use crate::trust::{Certificate, CertificateError};

/// Content of a rejecting reply
pub const NACK: &[u8] = b"nack";

/// Components after the invitee namespace: marker, chatroom, prefix, certificate, timestamp
const TRAILER_LEN: usize = 5;

/// Errors related to invitation names and replies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvitationError {
    #[error("Not under the invitation prefix: {0}")]
    WrongPrefix(Name),

    #[error("Invitation name too short: {0}")]
    TooShort(Name),

    #[error("Missing chatroom marker in {0}")]
    MissingChatroomMarker(Name),

    #[error("Malformed component: {0}")]
    MalformedComponent(String),

    #[error("Reply is not under request {0}")]
    ForeignReply(Name),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

/// `<root>/chronos/invitation`
pub fn invitation_prefix(broadcast_root: &Name) -> Name {
    broadcast_root
        .clone()
        .append(CHRONOS_COMPONENT)
        .append(INVITATION_COMPONENT)
}

/// An invitation to join one chatroom
///
/// Request name layout:
/// `<root>/chronos/invitation/<invitee...>/chatroom/<room>/<inviter prefix>/<inviter cert>/<timestamp>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub invitee_namespace: Name,

    pub chatroom: String,

    /// Where the inviter's chat data is published
    pub inviter_routing_prefix: Name,

    /// The inviter's signing certificate
    pub inviter_certificate: Certificate,

    /// Creation time (ms)
    pub timestamp: i64,
}

impl Invitation {
    pub fn new(
        invitee_namespace: Name,
        chatroom: impl Into<String>,
        inviter_routing_prefix: Name,
        inviter_certificate: Certificate,
        timestamp: i64,
    ) -> Self {
        Self {
            invitee_namespace,
            chatroom: chatroom.into(),
            inviter_routing_prefix,
            inviter_certificate,
            timestamp,
        }
    }

    /// Namespace of the identity that issued the embedded certificate
    pub fn inviter_namespace(&self) -> Name {
        self.inviter_certificate.key_name().prefix(-1)
    }

    /// The unsigned request name
    pub fn request_name(&self, broadcast_root: &Name) -> Result<Name, InvitationError> {
        let prefix = encode_name(&self.inviter_routing_prefix)?;
        let certificate = self.inviter_certificate.to_bytes()?;

        Ok(invitation_prefix(broadcast_root)
            .append_name(&self.invitee_namespace)
            .append(CHATROOM_COMPONENT)
            .append(self.chatroom.as_str())
            .append(Component::from_bytes(prefix))
            .append(Component::from_bytes(certificate))
            .append_number(self.timestamp as u64))
    }

    /// Parse an unsigned request name
    pub fn parse(name: &Name, broadcast_root: &Name) -> Result<Self, InvitationError> {
        let prefix = invitation_prefix(broadcast_root);
        if !prefix.is_prefix_of(name) {
            return Err(InvitationError::WrongPrefix(name.clone()));
        }
        if name.len() < prefix.len() + TRAILER_LEN + 1 {
            return Err(InvitationError::TooShort(name.clone()));
        }

        let marker = component(name, -5)?;
        if marker.as_bytes() != CHATROOM_COMPONENT.as_bytes() {
            return Err(InvitationError::MissingChatroomMarker(name.clone()));
        }

        let chatroom = String::from_utf8(component(name, -4)?.as_bytes().to_vec())
            .map_err(|e| InvitationError::MalformedComponent(format!("chatroom: {}", e)))?;
        let inviter_routing_prefix = decode_name(component(name, -3)?.as_bytes())?;
        let inviter_certificate = Certificate::from_bytes(component(name, -2)?.as_bytes())?;
        let timestamp = component(name, -1)?
            .to_number()
            .ok_or_else(|| InvitationError::MalformedComponent("timestamp".into()))?;

        let invitee_len = name.len() - prefix.len() - TRAILER_LEN;
        Ok(Self {
            invitee_namespace: name.sub_name(prefix.len(), invitee_len),
            chatroom,
            inviter_routing_prefix,
            inviter_certificate,
            timestamp: timestamp as i64,
        })
    }

    /// Parse a signed invitation interest
    pub fn parse_signed(interest: &Interest, broadcast_root: &Name) -> Result<Self, InvitationError> {
        Self::parse(&interest.unsigned_name(), broadcast_root)
    }
}

/// What an invitee answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationReply {
    Accepted {
        /// Where the invitee's chat data is published
        routing_prefix: Name,
        certificate: Certificate,
    },
    Rejected,
}

impl InvitationReply {
    /// Accepting reply: request name plus the invitee prefix, certificate as content
    pub fn accept(
        request_name: &Name,
        routing_prefix: &Name,
        certificate: &Certificate,
    ) -> Result<Data, InvitationError> {
        let name = request_name
            .clone()
            .append(Component::from_bytes(encode_name(routing_prefix)?));
        Ok(Data::new(name, certificate.to_bytes()?))
    }

    /// Rejecting reply: request name, `nack` content
    pub fn reject(request_name: &Name) -> Data {
        Data::new(request_name.clone(), NACK.to_vec())
    }

    /// Decode a reply to the interest named `request_name`
    ///
    /// Empty content is not a rejection; it fails certificate decoding.
    pub fn parse(reply: &Data, request_name: &Name) -> Result<Self, InvitationError> {
        if !request_name.is_prefix_of(reply.name()) {
            return Err(InvitationError::ForeignReply(request_name.clone()));
        }
        if reply.content() == NACK {
            return Ok(InvitationReply::Rejected);
        }

        let prefix_component = reply
            .name()
            .get(request_name.len() as isize)
            .ok_or_else(|| InvitationError::MalformedComponent("missing routing prefix".into()))?;

        Ok(InvitationReply::Accepted {
            routing_prefix: decode_name(prefix_component.as_bytes())?,
            certificate: Certificate::from_bytes(reply.content())?,
        })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, InvitationReply::Accepted { .. })
    }
}

fn component(name: &Name, index: isize) -> Result<&Component, InvitationError> {
    name.get(index)
        .ok_or_else(|| InvitationError::TooShort(name.clone()))
}

fn encode_name(name: &Name) -> Result<Vec<u8>, InvitationError> {
    bincode::serde::encode_to_vec(name, bincode::config::standard())
        .map_err(|e| InvitationError::MalformedComponent(e.to_string()))
}

fn decode_name(bytes: &[u8]) -> Result<Name, InvitationError> {
    let (name, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| InvitationError::MalformedComponent(format!("routing prefix: {}", e)))?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::Identity;
    use proptest::prelude::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn invitation(alice: &Identity) -> Invitation {
        Invitation::new(
            name("/ndn/bob"),
            "lobby",
            name("/private/local/ndn/alice/lobby"),
            alice.dsk_certificate().clone(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn test_request_name_layout() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let request = invitation(&alice).request_name(&name("/ndn/broadcast")).unwrap();

        assert!(name("/ndn/broadcast/chronos/invitation/ndn/bob/chatroom/lobby").is_prefix_of(&request));
        assert_eq!(request.len(), 11);
        assert_eq!(request.get(-1).unwrap().to_number(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_parse_signed_invitation() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let root = name("/ndn/broadcast");
        let original = invitation(&alice);

        let interest = alice.sign_interest(original.request_name(&root).unwrap()).unwrap();
        let parsed = Invitation::parse_signed(&interest, &root).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.inviter_namespace(), name("/ndn/alice"));
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        let root = name("/ndn/broadcast");
        assert!(matches!(
            Invitation::parse(&name("/other/chronos/invitation/a/b/c/d/e/f"), &root),
            Err(InvitationError::WrongPrefix(_))
        ));
        assert!(matches!(
            Invitation::parse(&name("/ndn/broadcast/chronos/invitation/bob"), &root),
            Err(InvitationError::TooShort(_))
        ));
        assert!(matches!(
            Invitation::parse(&name("/ndn/broadcast/chronos/invitation/bob/room/lobby/p/c/t"), &root),
            Err(InvitationError::MissingChatroomMarker(_))
        ));
        assert!(Invitation::parse(&name("/ndn/broadcast/chronos/invitation/bob/chatroom/lobby/p/c/t"), &root)
            .is_err());
    }

    #[test]
    fn test_replies() {
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let request = name("/ndn/broadcast/chronos/invitation/ndn/bob/chatroom/lobby/x");
        let prefix = name("/private/local/ndn/bob/lobby");

        let accept = InvitationReply::accept(&request, &prefix, bob.dsk_certificate()).unwrap();
        assert_eq!(accept.name().len(), request.len() + 1);
        assert_eq!(
            InvitationReply::parse(&accept, &request).unwrap(),
            InvitationReply::Accepted {
                routing_prefix: prefix,
                certificate: bob.dsk_certificate().clone(),
            }
        );

        let reject = InvitationReply::reject(&request);
        assert_eq!(InvitationReply::parse(&reject, &request).unwrap(), InvitationReply::Rejected);

        // empty content is not a rejection
        let empty = Data::new(request.clone(), Vec::new());
        assert!(InvitationReply::parse(&empty, &request).is_err());

        let foreign = Data::new(name("/elsewhere"), NACK.to_vec());
        assert!(matches!(
            InvitationReply::parse(&foreign, &request),
            Err(InvitationError::ForeignReply(_))
        ));
    }

    fn components() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z0-9]{1,8}", 1..4)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_invitation_round_trip(
            invitee in components(),
            chatroom in "[a-zA-Z0-9 _-]{1,16}",
            prefix in components(),
            timestamp in 0i64..i64::MAX,
        ) {
            let alice = Identity::generate(name("/ndn/alice")).unwrap();
            let root = name("/ndn/broadcast");
            let original = Invitation::new(
                Name::from_components(invitee.iter().map(|c| Component::from(c.as_str()))),
                chatroom,
                Name::from_components(prefix.iter().map(|c| Component::from(c.as_str()))),
                alice.dsk_certificate().clone(),
                timestamp,
            );

            let parsed = Invitation::parse(&original.request_name(&root).unwrap(), &root).unwrap();
            prop_assert_eq!(&parsed.chatroom, &original.chatroom);
            prop_assert_eq!(&parsed.inviter_routing_prefix, &original.inviter_routing_prefix);
            prop_assert_eq!(
                parsed.inviter_certificate.to_bytes().unwrap(),
                original.inviter_certificate.to_bytes().unwrap()
            );
            prop_assert_eq!(parsed, original);
        }
    }
}
