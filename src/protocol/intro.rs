// protocol/intro.rs - Introduction Certificates

use serde::{Deserialize, Serialize};

use super::state_machine::ProtocolError;
use crate::name::{Component, Name};
use crate::packet::Data;
use crate::trust::{certificate_name_to_key_name, Certificate, Identity};

/// Marker component of the sync prefix carrying introductions
pub const INTRO_CERT_COMPONENT: &str = "INTRO-CERT";

/// Role granted to an introduced participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntroRole {
    /// May introduce further participants
    Introducer,
    /// May only publish chat data
    Producer,
}

impl IntroRole {
    pub fn from_introducer(is_introducer: bool) -> Self {
        if is_introducer {
            IntroRole::Introducer
        } else {
            IntroRole::Producer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntroRole::Introducer => "INTRODUCER",
            IntroRole::Producer => "PRODUCER",
        }
    }
}

/// An existing member vouching for a newly admitted participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroCertificate {
    /// Signing certificate of the new participant
    pub introducee: Certificate,

    /// Where the new participant publishes chat data
    pub introducee_prefix: Name,

    pub role: IntroRole,
}

impl IntroCertificate {
    pub fn new(introducee: Certificate, introducee_prefix: Name, role: IntroRole) -> Self {
        Self {
            introducee,
            introducee_prefix,
            role,
        }
    }

    pub fn introducee_namespace(&self) -> Name {
        self.introducee.key_name().prefix(-1)
    }

    /// Sync prefix under which `chat_prefix` publishes introductions
    pub fn sync_prefix(chat_prefix: &Name) -> Name {
        chat_prefix.clone().append(INTRO_CERT_COMPONENT)
    }

    /// True for data published under an introduction sync prefix
    pub fn is_intro_name(name: &Name) -> bool {
        name.get(-2)
            .is_some_and(|c| c.as_bytes() == INTRO_CERT_COMPONENT.as_bytes())
    }

    /// Signed data at `<chat prefix>/INTRO-CERT/<seq>`
    pub fn to_data(&self, chat_prefix: &Name, seq: u64, introducer: &Identity) -> Result<Data, ProtocolError> {
        let content = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))?;
        let mut data = Data::new(
            Self::sync_prefix(chat_prefix).append(Component::from_number(seq)),
            content,
        );
        introducer.sign_data(&mut data)?;
        Ok(data)
    }

    pub fn from_data(data: &Data) -> Result<Self, ProtocolError> {
        let (intro, _) = bincode::serde::decode_from_slice(data.content(), bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))?;
        Ok(intro)
    }
}

/// Namespace of whoever signed `data`
pub fn signer_namespace(data: &Data) -> Option<Name> {
    let locator = data.signature()?.key_locator_name()?;
    certificate_name_to_key_name(locator).map(|key_name| key_name.prefix(-1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SignedObject;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_intro_data() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let carol = Identity::generate(name("/ndn/carol")).unwrap();
        let chat_prefix = name("/private/local/ndn/alice/lobby");

        let intro = IntroCertificate::new(
            carol.dsk_certificate().clone(),
            name("/private/local/ndn/carol/lobby"),
            IntroRole::from_introducer(false),
        );
        let data = intro.to_data(&chat_prefix, 3, &alice).unwrap();

        assert_eq!(data.name(), &IntroCertificate::sync_prefix(&chat_prefix).append_number(3));
        assert!(IntroCertificate::is_intro_name(data.name()));
        assert!(!IntroCertificate::is_intro_name(&chat_prefix.clone().append_number(3)));
        assert!(chat_prefix.is_prefix_of(data.name()));

        assert!(SignedObject::from(data.clone()).verify_with(alice.dsk_certificate().public_key()));
        assert_eq!(signer_namespace(&data), Some(name("/ndn/alice")));

        let parsed = IntroCertificate::from_data(&data).unwrap();
        assert_eq!(parsed, intro);
        assert_eq!(parsed.role.as_str(), "PRODUCER");
        assert_eq!(parsed.introducee_namespace(), name("/ndn/carol"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let data = Data::new(name("/p/INTRO-CERT/1"), b"garbage".to_vec());
        assert!(IntroCertificate::from_data(&data).is_err());
        assert_eq!(signer_namespace(&data), None);
    }
}
