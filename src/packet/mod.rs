// packet/mod.rs - Data, Interest and Signature Types

//! Named packets as seen by the trust layer.
//!
//! The wire format of the underlying network is out of scope; packets are
//! encoded with `bincode` only where a signature has to cover them.
//!
//! - **Data**: named content carrying a trailing [`Signature`]
//! - **Interest**: a name; signed interests carry the encoded
//!   [`SignatureInfo`] and the signature value as their last two components

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::{Component, Name};
use crate::trust::PublicKey;

/// Errors related to packet encoding and signature extraction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Packet is not signed")]
    Unsigned,

    #[error("Interest name too short to carry a signature: {0}")]
    NameTooShort(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Supported signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    /// Plain SHA-256 digest, no key involved
    DigestSha256,
    /// Ed25519 over the signed portion
    Ed25519,
}

/// Identifies the key that produced a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyLocator {
    /// Certificate name without version
    Name(Name),
    /// SHA-256 digest of the public key
    KeyDigest(Vec<u8>),
}

/// Signature metadata covered by the signature itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub sig_type: SignatureType,

    pub key_locator: Option<KeyLocator>,
}

impl SignatureInfo {
    pub fn ed25519(key_locator: Name) -> Self {
        Self {
            sig_type: SignatureType::Ed25519,
            key_locator: Some(KeyLocator::Name(key_locator)),
        }
    }

    /// Encode as a single name component
    pub fn to_component(&self) -> Result<Component, PacketError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PacketError::SerializationError(e.to_string()))?;
        Ok(Component::from_bytes(bytes))
    }

    pub fn from_component(component: &Component) -> Result<Self, PacketError> {
        let (info, _): (SignatureInfo, _) =
            bincode::serde::decode_from_slice(component.as_bytes(), bincode::config::standard())
                .map_err(|e| PacketError::SerializationError(e.to_string()))?;
        Ok(info)
    }
}

/// A complete signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub info: SignatureInfo,

    pub value: Vec<u8>,
}

impl Signature {
    /// Key locator name, only for name-typed locators on Ed25519 signatures
    pub fn key_locator_name(&self) -> Option<&Name> {
        match (&self.info.sig_type, &self.info.key_locator) {
            (SignatureType::Ed25519, Some(KeyLocator::Name(name))) => Some(name),
            _ => None,
        }
    }
}

/// A named content packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    name: Name,

    content: Vec<u8>,

    /// Freshness period in milliseconds
    freshness_ms: Option<u64>,

    signature: Option<Signature>,
}

impl Data {
    /// Create an unsigned data packet
    pub fn new(name: Name, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_ms: None,
            signature: None,
        }
    }

    pub fn with_freshness(mut self, freshness_ms: u64) -> Self {
        self.freshness_ms = Some(freshness_ms);
        self
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn freshness_ms(&self) -> Option<u64> {
        self.freshness_ms
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Attach a signature produced over [`Data::signed_portion`]
    pub fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    /// Bytes covered by a signature with the given info
    pub fn signed_portion(&self, info: &SignatureInfo) -> Result<Vec<u8>, PacketError> {
        bincode::serde::encode_to_vec(
            (&self.name, &self.content, &self.freshness_ms, info),
            bincode::config::standard(),
        )
        .map_err(|e| PacketError::SerializationError(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PacketError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let (data, _): (Data, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| PacketError::SerializationError(e.to_string()))?;
        Ok(data)
    }
}

/// Default interest lifetime in milliseconds
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4_000;

/// A request for named data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    name: Name,

    lifetime_ms: u64,

    must_be_fresh: bool,

    /// Next components the answer must not carry
    exclude: Vec<Component>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            must_be_fresh: false,
            exclude: Vec::new(),
        }
    }

    pub fn with_lifetime(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = Component>) -> Self {
        self.exclude = exclude.into_iter().collect();
        self
    }

    pub fn must_be_fresh(&self) -> bool {
        self.must_be_fresh
    }

    pub fn exclude(&self) -> &[Component] {
        &self.exclude
    }

    pub fn is_excluded(&self, component: &Component) -> bool {
        self.exclude.contains(component)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }

    /// The name without the two signature components
    pub fn unsigned_name(&self) -> Name {
        self.name.prefix(-2)
    }

    /// Decode the signature carried in the last two components
    pub fn signature(&self) -> Result<Signature, PacketError> {
        let (info, value) = match (self.name.get(-2), self.name.get(-1)) {
            (Some(info), Some(value)) => (info, value),
            _ => return Err(PacketError::NameTooShort(self.name.to_uri())),
        };
        Ok(Signature {
            info: SignatureInfo::from_component(info)?,
            value: value.as_bytes().to_vec(),
        })
    }

    /// Bytes covered by the signature: the name up to the signature info
    pub fn signed_portion(&self) -> Result<Vec<u8>, PacketError> {
        if self.name.len() < 2 {
            return Err(PacketError::NameTooShort(self.name.to_uri()));
        }
        signed_interest_portion(&self.name.prefix(-1))
    }
}

/// Bytes to sign for an interest whose name already ends in its signature info
pub fn signed_interest_portion(name_with_info: &Name) -> Result<Vec<u8>, PacketError> {
    bincode::serde::encode_to_vec(name_with_info, bincode::config::standard())
        .map_err(|e| PacketError::SerializationError(e.to_string()))
}

/// Anything the validator can check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedObject {
    Data(Data),
    Interest(Interest),
}

impl SignedObject {
    pub fn name(&self) -> &Name {
        match self {
            SignedObject::Data(d) => d.name(),
            SignedObject::Interest(i) => i.name(),
        }
    }

    /// Name that policy rules are matched against
    pub fn policy_name(&self) -> Name {
        match self {
            SignedObject::Data(d) => d.name().clone(),
            SignedObject::Interest(i) => i.unsigned_name(),
        }
    }

    pub fn signature(&self) -> Result<Signature, PacketError> {
        match self {
            SignedObject::Data(d) => d.signature().cloned().ok_or(PacketError::Unsigned),
            SignedObject::Interest(i) => i.signature(),
        }
    }

    /// Key locator name; `None` for missing, malformed or non-name locators
    pub fn key_locator_name(&self) -> Option<Name> {
        self.signature()
            .ok()
            .and_then(|sig| sig.key_locator_name().cloned())
    }

    pub fn signed_portion(&self) -> Result<Vec<u8>, PacketError> {
        match self {
            SignedObject::Data(d) => {
                let signature = d.signature().ok_or(PacketError::Unsigned)?;
                d.signed_portion(&signature.info)
            }
            SignedObject::Interest(i) => i.signed_portion(),
        }
    }

    /// Cryptographic check against `key`; any decoding problem is a failure
    pub fn verify_with(&self, key: &PublicKey) -> bool {
        match (self.signed_portion(), self.signature()) {
            (Ok(portion), Ok(signature)) => {
                signature.info.sig_type == SignatureType::Ed25519
                    && key.verify(&portion, &signature.value)
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignedObject::Data(_) => "data",
            SignedObject::Interest(_) => "interest",
        }
    }

    pub fn as_data(&self) -> Option<&Data> {
        match self {
            SignedObject::Data(d) => Some(d),
            SignedObject::Interest(_) => None,
        }
    }
}

impl From<Data> for SignedObject {
    fn from(data: Data) -> Self {
        SignedObject::Data(data)
    }
}

impl From<Interest> for SignedObject {
    fn from(interest: Interest) -> Self {
        SignedObject::Interest(interest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_data_round_trip_bytes() {
        let data = Data::new(name("/a/b"), b"hello".to_vec()).with_freshness(1000);
        let decoded = Data::from_bytes(&data.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, data);
        assert!(Data::from_bytes(b"\xff\xff").is_err());
    }

    #[test]
    fn test_unsigned_objects_fail_closed() {
        let obj = SignedObject::from(Data::new(name("/a"), Vec::new()));
        assert_eq!(obj.signature(), Err(PacketError::Unsigned));
        assert!(obj.key_locator_name().is_none());

        let short = SignedObject::from(Interest::new(name("/a")));
        assert!(matches!(short.signature(), Err(PacketError::NameTooShort(_))));

        let garbage = SignedObject::from(Interest::new(name("/a/b/c")));
        assert!(garbage.key_locator_name().is_none());
    }

    #[test]
    fn test_key_locator_requires_name_and_ed25519() {
        let locator = name("/alice/KEY/dsk-1/ID-CERT");
        let mut data = Data::new(name("/x"), Vec::new());
        data.set_signature(Signature {
            info: SignatureInfo::ed25519(locator.clone()),
            value: vec![0; 64],
        });
        assert_eq!(SignedObject::from(data.clone()).key_locator_name(), Some(locator));

        data.set_signature(Signature {
            info: SignatureInfo {
                sig_type: SignatureType::Ed25519,
                key_locator: Some(KeyLocator::KeyDigest(vec![1, 2, 3])),
            },
            value: vec![0; 64],
        });
        assert!(SignedObject::from(data.clone()).key_locator_name().is_none());

        data.set_signature(Signature {
            info: SignatureInfo {
                sig_type: SignatureType::DigestSha256,
                key_locator: Some(KeyLocator::Name(name("/alice/KEY/dsk-1/ID-CERT"))),
            },
            value: vec![0; 32],
        });
        assert!(SignedObject::from(data).key_locator_name().is_none());
    }

    #[test]
    fn test_interest_selectors() {
        let interest = Interest::new(name("/list"))
            .with_must_be_fresh(true)
            .with_exclude([Component::from("lobby")]);
        assert!(interest.must_be_fresh());
        assert!(interest.is_excluded(&Component::from("lobby")));
        assert!(!interest.is_excluded(&Component::from("music")));
        assert!(!Interest::new(name("/list")).must_be_fresh());
    }

    #[test]
    fn test_interest_policy_name_strips_signature() {
        let info = SignatureInfo::ed25519(name("/alice/KEY/dsk-1/ID-CERT"));
        let signed = name("/ndn/broadcast/chronos")
            .append(info.to_component().unwrap())
            .append(Component::from_bytes(vec![7; 64]));
        let obj = SignedObject::from(Interest::new(signed));

        assert_eq!(obj.policy_name(), name("/ndn/broadcast/chronos"));
        assert_eq!(obj.signature().unwrap().info, info);
        assert_eq!(obj.signature().unwrap().value, vec![7; 64]);
    }
}
