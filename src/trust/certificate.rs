// trust/certificate.rs - Identity and Endorse Certificates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::identity::PublicKey;
use crate::name::{Component, Name};
use crate::packet::{Data, PacketError};

/// Marker between the identity namespace and the key id
pub const KEY_COMPONENT: &str = "KEY";

/// Suffix of identity certificate names
pub const ID_CERT_COMPONENT: &str = "ID-CERT";

/// Suffix of endorse certificate names
pub const PROFILE_CERT_COMPONENT: &str = "PROFILE-CERT";

/// Errors related to certificate decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("Certificate name lacks KEY/ID-CERT structure: {0}")]
    InvalidName(String),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Current time in milliseconds since the epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Attributes describing a human identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    identity: Name,

    attributes: BTreeMap<String, String>,
}

impl Profile {
    /// Profile with the `IDENTITY` attribute set
    pub fn new(identity: Name) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("IDENTITY".to_string(), identity.to_uri());
        Self {
            identity,
            attributes,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> &Name {
        &self.identity
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// What a certificate is, beyond binding a key to a name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateKind {
    Identity,
    Endorse {
        profile: Profile,
        endorse_list: Vec<String>,
    },
}

/// Certificate payload carried as the data content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateContent {
    pub key_name: Name,

    pub public_key: PublicKey,

    /// Start of validity (ms since epoch)
    pub not_before: i64,

    /// End of validity (ms since epoch)
    pub not_after: i64,

    /// Free-form subject attributes ("name", "institution", ...)
    pub subject_description: BTreeMap<String, String>,

    pub kind: CertificateKind,
}

impl CertificateContent {
    pub fn new(key_name: Name, public_key: PublicKey, not_before: i64, not_after: i64) -> Self {
        Self {
            key_name,
            public_key,
            not_before,
            not_after,
            subject_description: BTreeMap::new(),
            kind: CertificateKind::Identity,
        }
    }

    pub fn with_kind(mut self, kind: CertificateKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_subject(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.subject_description.insert(key.into(), value.into());
        self
    }
}

/// A signed data packet binding a key name to a public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Data", into = "Data")]
pub struct Certificate {
    data: Data,

    content: CertificateContent,
}

impl Certificate {
    /// Encode an unsigned certificate packet; sign it before [`Certificate::from_data`]
    pub fn build(name: Name, content: CertificateContent) -> Result<Data, CertificateError> {
        let bytes = bincode::serde::encode_to_vec(&content, bincode::config::standard())
            .map_err(|e| CertificateError::SerializationError(e.to_string()))?;
        Ok(Data::new(name, bytes))
    }

    /// Decode a certificate from a data packet
    pub fn from_data(data: Data) -> Result<Self, CertificateError> {
        let (content, _): (CertificateContent, _) =
            bincode::serde::decode_from_slice(data.content(), bincode::config::standard())
                .map_err(|e| CertificateError::SerializationError(e.to_string()))?;
        Ok(Self { data, content })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CertificateError> {
        Self::from_data(Data::from_bytes(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CertificateError> {
        Ok(self.data.to_bytes()?)
    }

    pub fn name(&self) -> &Name {
        self.data.name()
    }

    /// Certificate name minus its version, as used in key locators
    pub fn name_without_version(&self) -> Name {
        match self.name().get(-1) {
            Some(last) if last.to_version().is_some() => self.name().prefix(-1),
            _ => self.name().clone(),
        }
    }

    pub fn key_name(&self) -> &Name {
        &self.content.key_name
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.content.public_key
    }

    pub fn not_before(&self) -> i64 {
        self.content.not_before
    }

    pub fn not_after(&self) -> i64 {
        self.content.not_after
    }

    pub fn is_too_early(&self, now: i64) -> bool {
        now < self.content.not_before
    }

    pub fn is_too_late(&self, now: i64) -> bool {
        now > self.content.not_after
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        !self.is_too_early(now) && !self.is_too_late(now)
    }

    pub fn subject_description(&self) -> &BTreeMap<String, String> {
        &self.content.subject_description
    }

    pub fn kind(&self) -> &CertificateKind {
        &self.content.kind
    }

    /// Embedded profile of an endorse certificate
    pub fn profile(&self) -> Option<&Profile> {
        match &self.content.kind {
            CertificateKind::Endorse { profile, .. } => Some(profile),
            CertificateKind::Identity => None,
        }
    }

    /// Endorsed attribute names; empty for identity certificates
    pub fn endorse_list(&self) -> &[String] {
        match &self.content.kind {
            CertificateKind::Endorse { endorse_list, .. } => endorse_list,
            CertificateKind::Identity => &[],
        }
    }

    /// Key locator name of the certificate's own signature
    pub fn signer_name(&self) -> Option<Name> {
        self.data
            .signature()
            .and_then(|sig| sig.key_locator_name().cloned())
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn into_data(self) -> Data {
        self.data
    }
}

impl TryFrom<Data> for Certificate {
    type Error = CertificateError;

    fn try_from(data: Data) -> Result<Self, Self::Error> {
        Self::from_data(data)
    }
}

impl From<Certificate> for Data {
    fn from(cert: Certificate) -> Self {
        cert.data
    }
}

/// `/a/KEY/b/ksk-1/ID-CERT[/v]` becomes `/a/b/ksk-1`
pub fn certificate_name_to_key_name(name: &Name) -> Option<Name> {
    let key = Component::from(KEY_COMPONENT);
    let id_cert = Component::from(ID_CERT_COMPONENT);
    let profile_cert = Component::from(PROFILE_CERT_COMPONENT);

    let key_idx = name.position(&key)?;
    let end = name
        .components()
        .iter()
        .skip(key_idx + 1)
        .position(|c| *c == id_cert || *c == profile_cert)
        .map(|p| key_idx + 1 + p)?;

    if end == key_idx + 1 {
        return None;
    }

    Some(
        name.prefix(key_idx as isize)
            .append_name(&name.sub_name(key_idx + 1, end - key_idx - 1)),
    )
}
