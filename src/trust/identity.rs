// trust/identity.rs - Ed25519 Keys and Local Identity

use ed25519_dalek::{
    Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey,
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use super::certificate::{
    now_ms, Certificate, CertificateContent, CertificateError, CertificateKind, Profile,
    ID_CERT_COMPONENT, KEY_COMPONENT, PROFILE_CERT_COMPONENT,
};
use crate::name::{Component, Name};
use crate::packet::{signed_interest_portion, Data, Interest, PacketError, Signature, SignatureInfo};

/// Default KSK lifetime: one year
pub const KSK_VALIDITY_MS: i64 = 365 * 24 * 3600 * 1000;

/// Default DSK lifetime: thirty days
pub const DSK_VALIDITY_MS: i64 = 30 * 24 * 3600 * 1000;

/// Errors related to identity operations
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),
}

/// Raw public key bytes; equality is byte-exact
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 of the key bytes
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hasher.finalize().into()
    }

    /// Short form for display (first 8 digest bytes as hex)
    pub fn short(&self) -> String {
        hex::encode(&self.digest()[..8])
    }

    /// Verify an Ed25519 signature; malformed keys or signatures never verify
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(self.0.as_slice()) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Ed25519Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

/// An Ed25519 signing key with its public half
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,

    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; SECRET_KEY_LENGTH];
        rand::rng().fill_bytes(&mut secret_bytes);

        let signing_key = SigningKey::from_bytes(&secret_bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Restore from secret key bytes
    pub fn from_secret_key(secret_bytes: &[u8]) -> Result<Self, IdentityError> {
        let key_bytes = <[u8; SECRET_KEY_LENGTH]>::try_from(secret_bytes).map_err(|_| {
            IdentityError::InvalidKeyLength {
                expected: SECRET_KEY_LENGTH,
                got: secret_bytes.len(),
            }
        })?;

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.verifying_key.to_bytes().to_vec())
    }

    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Sign a data packet, naming `key_locator` as the signer
    pub fn sign_data(&self, data: &mut Data, key_locator: Name) -> Result<(), IdentityError> {
        let info = SignatureInfo::ed25519(key_locator);
        let portion = data.signed_portion(&info)?;
        let value = self.sign(&portion);
        data.set_signature(Signature { info, value });
        Ok(())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// The local user's key chain: a self-signed KSK and a DSK certified by it
#[derive(Clone)]
pub struct Identity {
    namespace: Name,

    ksk: KeyPair,

    ksk_certificate: Certificate,

    dsk: KeyPair,

    dsk_certificate: Certificate,

    /// Creation timestamp (ms)
    created_at: i64,
}

impl Identity {
    /// Generate a fresh key chain valid from now
    pub fn generate(namespace: Name) -> Result<Self, IdentityError> {
        let now = now_ms();
        Self::generate_at(namespace, now, now + KSK_VALIDITY_MS, now + DSK_VALIDITY_MS)
    }

    /// Generate with explicit validity ends (ms since epoch)
    pub fn generate_at(
        namespace: Name,
        not_before: i64,
        ksk_not_after: i64,
        dsk_not_after: i64,
    ) -> Result<Self, IdentityError> {
        let created_at = now_ms();
        let ksk = KeyPair::generate();
        let dsk = KeyPair::generate();

        let ksk_id = Component::from(format!("ksk-{}", created_at));
        let dsk_id = Component::from(format!("dsk-{}", created_at));

        let ksk_cert_name = identity_certificate_name(&namespace, &ksk_id, created_at as u64);
        let ksk_locator = ksk_cert_name.prefix(-1);
        let mut ksk_data = Certificate::build(
            ksk_cert_name,
            CertificateContent::new(
                namespace.clone().append(ksk_id),
                ksk.public_key(),
                not_before,
                ksk_not_after,
            ),
        )?;
        ksk.sign_data(&mut ksk_data, ksk_locator.clone())?;
        let ksk_certificate = Certificate::from_data(ksk_data)?;

        let dsk_cert_name = identity_certificate_name(&namespace, &dsk_id, created_at as u64);
        let mut dsk_data = Certificate::build(
            dsk_cert_name,
            CertificateContent::new(
                namespace.clone().append(dsk_id),
                dsk.public_key(),
                not_before,
                dsk_not_after,
            ),
        )?;
        ksk.sign_data(&mut dsk_data, ksk_locator)?;
        let dsk_certificate = Certificate::from_data(dsk_data)?;

        Ok(Self {
            namespace,
            ksk,
            ksk_certificate,
            dsk,
            dsk_certificate,
            created_at,
        })
    }

    pub fn namespace(&self) -> &Name {
        &self.namespace
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn ksk_certificate(&self) -> &Certificate {
        &self.ksk_certificate
    }

    pub fn dsk_certificate(&self) -> &Certificate {
        &self.dsk_certificate
    }

    /// Key locator placed on everything signed with the DSK
    pub fn signer_name(&self) -> Name {
        self.dsk_certificate.name_without_version()
    }

    /// Sign day-to-day data with the DSK
    pub fn sign_data(&self, data: &mut Data) -> Result<(), IdentityError> {
        self.dsk.sign_data(data, self.signer_name())
    }

    /// Append signature info and value to `name` and wrap it as an interest
    pub fn sign_interest(&self, name: Name) -> Result<Interest, IdentityError> {
        let info = SignatureInfo::ed25519(self.signer_name());
        let with_info = name.append(info.to_component()?);
        let portion = signed_interest_portion(&with_info)?;
        let value = self.dsk.sign(&portion);
        Ok(Interest::new(with_info.append(Component::from_bytes(value))))
    }

    /// Issue an endorse certificate for `subject`, signed with the KSK
    pub fn endorse(
        &self,
        subject: &Certificate,
        profile: Profile,
        endorse_list: Vec<String>,
    ) -> Result<Certificate, IdentityError> {
        let key_name = subject.key_name().clone();
        let namespace = key_name.prefix(-1);
        let key_id = key_name.get(-1).cloned().unwrap_or_else(|| Component::from("ksk"));

        let name = namespace
            .append(KEY_COMPONENT)
            .append(key_id)
            .append(PROFILE_CERT_COMPONENT)
            .append(Component::from(self.namespace.to_uri()))
            .append_version(now_ms() as u64);

        let content = CertificateContent::new(
            key_name,
            subject.public_key().clone(),
            subject.not_before(),
            subject.not_after(),
        )
        .with_kind(CertificateKind::Endorse {
            profile,
            endorse_list,
        });

        let mut data = Certificate::build(name, content)?;
        self.ksk
            .sign_data(&mut data, self.ksk_certificate.name_without_version())?;
        Ok(Certificate::from_data(data)?)
    }

    /// Export to serializable format
    pub fn export(&self) -> ExportedIdentity {
        ExportedIdentity {
            namespace: self.namespace.clone(),
            ksk_secret: self.ksk.secret_key_bytes().to_vec(),
            ksk_certificate: self.ksk_certificate.data().clone(),
            dsk_secret: self.dsk.secret_key_bytes().to_vec(),
            dsk_certificate: self.dsk_certificate.data().clone(),
            created_at: self.created_at,
        }
    }

    /// Import from serializable format
    pub fn import(exported: &ExportedIdentity) -> Result<Self, IdentityError> {
        Ok(Self {
            namespace: exported.namespace.clone(),
            ksk: KeyPair::from_secret_key(&exported.ksk_secret)?,
            ksk_certificate: Certificate::from_data(exported.ksk_certificate.clone())?,
            dsk: KeyPair::from_secret_key(&exported.dsk_secret)?,
            dsk_certificate: Certificate::from_data(exported.dsk_certificate.clone())?,
            created_at: exported.created_at,
        })
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("namespace", &self.namespace)
            .field("ksk", self.ksk_certificate.name())
            .field("dsk", self.dsk_certificate.name())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Serializable identity (contains secret keys)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportedIdentity {
    pub namespace: Name,

    pub ksk_secret: Vec<u8>,

    pub ksk_certificate: Data,

    pub dsk_secret: Vec<u8>,

    pub dsk_certificate: Data,

    pub created_at: i64,
}

/// `<namespace>/KEY/<key-id>/ID-CERT/<version>`
pub fn identity_certificate_name(namespace: &Name, key_id: &Component, version: u64) -> Name {
    namespace
        .clone()
        .append(KEY_COMPONENT)
        .append(key_id.clone())
        .append(ID_CERT_COMPONENT)
        .append_version(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SignedObject;

    fn alice() -> Identity {
        Identity::generate(Name::from_uri("/ndn/alice").unwrap()).unwrap()
    }

    #[test]
    fn test_key_chain_layout() {
        let id = alice();
        let ksk = id.ksk_certificate();
        let dsk = id.dsk_certificate();

        assert_eq!(ksk.name().get(2).unwrap().as_bytes(), b"KEY");
        assert_eq!(ksk.name().get(-2).unwrap().as_bytes(), b"ID-CERT");
        assert!(ksk.name().get(-1).unwrap().to_version().is_some());
        assert!(ksk.key_name().get(-1).unwrap().to_escaped().starts_with("ksk-"));
        assert!(dsk.key_name().get(-1).unwrap().to_escaped().starts_with("dsk-"));

        // KSK is self-signed, DSK is signed by the KSK
        assert_eq!(ksk.signer_name(), Some(ksk.name_without_version()));
        assert_eq!(dsk.signer_name(), Some(ksk.name_without_version()));
        assert!(SignedObject::from(dsk.data().clone()).verify_with(ksk.public_key()));
        assert!(SignedObject::from(ksk.data().clone()).verify_with(ksk.public_key()));
    }

    #[test]
    fn test_sign_and_verify_data() {
        let id = alice();
        let mut data = Data::new(Name::from_uri("/chat/1").unwrap(), b"hi".to_vec());
        id.sign_data(&mut data).unwrap();

        let obj = SignedObject::from(data);
        assert_eq!(obj.key_locator_name(), Some(id.signer_name()));
        assert!(obj.verify_with(id.dsk_certificate().public_key()));
        assert!(!obj.verify_with(id.ksk_certificate().public_key()));
    }

    #[test]
    fn test_sign_interest() {
        let id = alice();
        let base = Name::from_uri("/ndn/broadcast/chronos/invitation").unwrap();
        let interest = id.sign_interest(base.clone()).unwrap();
        assert_eq!(interest.unsigned_name(), base);

        let obj = SignedObject::from(interest.clone());
        assert!(obj.verify_with(id.dsk_certificate().public_key()));

        // tampering with the covered name breaks the signature
        let mut components = interest.name().components().to_vec();
        components[0] = Component::from("tampered");
        let forged = SignedObject::from(Interest::new(Name::from_components(components)));
        assert!(!forged.verify_with(id.dsk_certificate().public_key()));
    }

    #[test]
    fn test_export_import() {
        let id = alice();
        let restored = Identity::import(&id.export()).unwrap();
        assert_eq!(restored.namespace(), id.namespace());
        assert_eq!(restored.signer_name(), id.signer_name());

        let mut data = Data::new(Name::from_uri("/x").unwrap(), Vec::new());
        restored.sign_data(&mut data).unwrap();
        assert!(SignedObject::from(data).verify_with(id.dsk_certificate().public_key()));
    }

    #[test]
    fn test_invalid_secret_length() {
        assert!(matches!(
            KeyPair::from_secret_key(&[0u8; 5]),
            Err(IdentityError::InvalidKeyLength { expected: 32, got: 5 })
        ));
    }

    #[test]
    fn test_public_key_verify_rejects_garbage() {
        let pair = KeyPair::generate();
        let sig = pair.sign(b"msg");
        assert!(pair.public_key().verify(b"msg", &sig));
        assert!(!pair.public_key().verify(b"other", &sig));
        assert!(!PublicKey::from_bytes(vec![1, 2, 3]).verify(b"msg", &sig));
        assert!(!pair.public_key().verify(b"msg", &sig[..10]));
    }

    #[test]
    fn test_endorse_certificate() {
        let id = alice();
        let bob = Identity::generate(Name::from_uri("/ndn/bob").unwrap()).unwrap();
        let profile = Profile::new(bob.namespace().clone()).with_attribute("name", "Bob");

        let endorsed = id
            .endorse(bob.ksk_certificate(), profile, vec!["name".into()])
            .unwrap();
        assert_eq!(endorsed.key_name(), bob.ksk_certificate().key_name());
        assert_eq!(endorsed.public_key(), bob.ksk_certificate().public_key());
        assert_eq!(endorsed.profile().unwrap().get("name"), Some("Bob"));
        assert_eq!(endorsed.endorse_list(), &["name".to_string()]);
        assert!(SignedObject::from(endorsed.data().clone()).verify_with(id.ksk_certificate().public_key()));
    }
}
