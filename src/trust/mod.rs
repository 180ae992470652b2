// trust/mod.rs - Identity, Certificates and Trust Anchors

//! Trust model for chatroom participants.
//!
//! - **Identity**: Ed25519 key chain (self-signed KSK, DSK certified by it)
//! - **Certificate**: key-name to public-key bindings with a validity window,
//!   either plain identity certificates or endorse certificates with a profile
//! - **Anchors**: key names trusted directly; the root of every chain
//! - **Store**: persistent identity, contacts and chatroom settings using sled
//!
//! # Example
//!
//! ```ignore
//! use chronos_chat::trust::*;
//!
//! let alice = Identity::generate("/ndn/alice".parse()?)?;
//! let bob = Identity::generate("/ndn/bob".parse()?)?;
//!
//! let mut anchors = TrustAnchorStore::new();
//! anchors.add_trust_anchor(bob.ksk_certificate());
//! ```

mod anchors;
mod certificate;
mod identity;
mod store;

pub use anchors::TrustAnchorStore;

pub use certificate::{
    certificate_name_to_key_name, now_ms, Certificate, CertificateContent, CertificateError,
    CertificateKind, Profile, ID_CERT_COMPONENT, KEY_COMPONENT, PROFILE_CERT_COMPONENT,
};

pub use identity::{
    identity_certificate_name, ExportedIdentity, Identity, IdentityError, KeyPair, PublicKey,
    DSK_VALIDITY_MS, KSK_VALIDITY_MS,
};

pub use store::{Conf, Contact, ContactStore, StoreError};
