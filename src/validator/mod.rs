// validator/mod.rs - Recursive Certificate Validator

//! Step-bounded validation of signed data and interests.
//!
//! [`Validator::check_policy`] never blocks. It either resolves the object
//! or returns a [`ValidationRequest`] naming the certificate to fetch next.
//! The caller fetches it and hands it back through [`Validator::resume`];
//! the request carries everything needed to continue the chain.
//!
//! Exactly one path is taken per object, in this order:
//!
//! 1. invitation reply / invitation request rule (anchor, cache or fetch)
//! 2. KSK certificate whose key name is a trust anchor
//! 3. DSK certificate issued by an anchored KSK
//! 4. chat data under an admitted participant's prefix
//!
//! Anything else fails with [`ValidationFailure::NoApplicableRule`].

mod driver;

pub use driver::{validate, CertificateFetcher, StaticCertificates};

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

use crate::name::Name;
use crate::observability::record_validation;
use crate::packet::{Data, Interest, SignedObject};
use crate::policy::{self, ChatPolicyRule, Expansion, NameRegex, PolicyError};
use crate::trust::{certificate_name_to_key_name, now_ms, Certificate, PublicKey, TrustAnchorStore};

/// Default bound on the number of certificate fetches per chain
pub const DEFAULT_STEP_LIMIT: usize = 10;

/// Why a validation chain failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Validation depth exceeded at step {step} (limit {limit})")]
    DepthExceeded { step: usize, limit: usize },

    #[error("Malformed signature on {0}")]
    MalformedSignature(Name),

    #[error("No applicable rule for {0}")]
    NoApplicableRule(Name),

    #[error("Signer {signer} of {name} is not trusted")]
    Untrusted { name: Name, signer: Name },

    #[error("Key in {0} does not match its trust anchor")]
    AnchorMismatch(Name),

    #[error("Signature verification failed for {0}")]
    BadSignature(Name),

    #[error("Certificate {0} is outside its validity window")]
    OutsideValidityWindow(Name),

    #[error("Could not fetch certificate {0}")]
    FetchFailed(Name),

    #[error("Malformed certificate {name}: {reason}")]
    MalformedCertificate { name: Name, reason: String },
}

impl ValidationFailure {
    /// Short label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailure::DepthExceeded { .. } => "depth_exceeded",
            ValidationFailure::MalformedSignature(_) => "malformed_signature",
            ValidationFailure::NoApplicableRule(_) => "no_applicable_rule",
            ValidationFailure::Untrusted { .. } => "untrusted",
            ValidationFailure::AnchorMismatch(_) => "anchor_mismatch",
            ValidationFailure::BadSignature(_) => "bad_signature",
            ValidationFailure::OutsideValidityWindow(_) => "outside_validity_window",
            ValidationFailure::FetchFailed(_) => "fetch_failed",
            ValidationFailure::MalformedCertificate { .. } => "malformed_certificate",
        }
    }
}

/// A pending step: fetch `name`, then continue at `step`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    /// Certificate name (without version) to fetch
    pub name: Name,

    /// Step at which the fetched certificate is checked
    pub step: usize,

    /// Objects waiting on the fetched certificate, innermost last
    pending: Vec<SignedObject>,
}

impl ValidationRequest {
    pub fn interest(&self) -> Interest {
        Interest::new(self.name.clone())
    }

    /// The object whose validation started this chain
    pub fn origin(&self) -> Option<&SignedObject> {
        self.pending.first()
    }
}

/// Outcome of one validation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Resolved(Result<(), ValidationFailure>),
    NeedsFetch(ValidationRequest),
}

impl Validation {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Validation::Resolved(_))
    }
}

/// Which rule applies to an object
#[derive(Debug, Clone, PartialEq, Eq)]
enum PolicyPath {
    Invitation,
    AnchoredKsk { key_name: Name },
    Dsk { issuer: Name },
    ChatData { prefix: Name },
    Unmatched,
}

impl PolicyPath {
    fn as_str(&self) -> &'static str {
        match self {
            PolicyPath::Invitation => "invitation",
            PolicyPath::AnchoredKsk { .. } => "anchored_ksk",
            PolicyPath::Dsk { .. } => "dsk",
            PolicyPath::ChatData { .. } => "chat_data",
            PolicyPath::Unmatched => "unmatched",
        }
    }
}

/// Validator state: anchors, verified-certificate cache and rules
#[derive(Debug)]
pub struct Validator {
    step_limit: usize,

    anchors: TrustAnchorStore,

    /// Validated certificates keyed by name without version
    cache: HashMap<Name, Certificate>,

    invitation_rule: ChatPolicyRule,

    invitation_request_rule: ChatPolicyRule,

    dsk_rule: ChatPolicyRule,

    ksk_certificate_regex: NameRegex,

    ksk_locator_regex: NameRegex,

    key_name_expansion: Expansion,

    /// Admitted participants: chat prefix to their signing certificate
    chat_rules: BTreeMap<Name, Certificate>,
}

impl Validator {
    pub fn new(broadcast_root: &Name, step_limit: usize) -> Result<Self, PolicyError> {
        Ok(Self {
            step_limit,
            anchors: TrustAnchorStore::new(),
            cache: HashMap::new(),
            invitation_rule: policy::invitation_rule(broadcast_root)?,
            invitation_request_rule: policy::invitation_request_rule(broadcast_root)?,
            dsk_rule: policy::dsk_rule()?,
            ksk_certificate_regex: NameRegex::new(policy::KSK_CERTIFICATE_PATTERN)?,
            ksk_locator_regex: NameRegex::new(policy::KSK_LOCATOR_PATTERN)?,
            key_name_expansion: Expansion::parse(policy::KEY_NAME_EXPANSION)?,
            chat_rules: BTreeMap::new(),
        })
    }

    pub fn with_anchors(mut self, anchors: TrustAnchorStore) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn step_limit(&self) -> usize {
        self.step_limit
    }

    pub fn anchors(&self) -> &TrustAnchorStore {
        &self.anchors
    }

    pub fn anchors_mut(&mut self) -> &mut TrustAnchorStore {
        &mut self.anchors
    }

    pub fn cached_certificate(&self, name: &Name) -> Option<&Certificate> {
        self.cache.get(name)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Admit a participant: data under `prefix` must be signed by `certificate`
    pub fn add_chat_data_rule(&mut self, prefix: Name, certificate: Certificate) {
        debug!(prefix = %prefix, signer = %certificate.name(), "Chat data rule added");
        self.chat_rules.insert(prefix, certificate);
    }

    pub fn remove_chat_data_rule(&mut self, prefix: &Name) -> Option<Certificate> {
        self.chat_rules.remove(prefix)
    }

    pub fn chat_data_prefixes(&self) -> impl Iterator<Item = &Name> {
        self.chat_rules.keys()
    }

    /// Start (or continue at `step`) the validation of `obj`
    pub fn check_policy(&mut self, obj: SignedObject, step: usize) -> Validation {
        self.check(obj, step, Vec::new())
    }

    /// Continue a chain with the fetched certificate
    pub fn resume(&mut self, request: ValidationRequest, fetched: Data) -> Validation {
        if !request.name.is_prefix_of(fetched.name()) {
            return self.resolved(
                fetched.name(),
                Err(ValidationFailure::MalformedCertificate {
                    name: fetched.name().clone(),
                    reason: format!("not under requested name {}", request.name),
                }),
            );
        }
        self.check(SignedObject::Data(fetched), request.step, request.pending)
    }

    /// Turn an exhausted fetch into the chain's failure
    pub fn fail_fetch(&self, request: ValidationRequest) -> ValidationFailure {
        warn!(name = %request.name, step = request.step, "Certificate fetch failed");
        let failure = ValidationFailure::FetchFailed(request.name);
        record_validation(failure.as_str());
        failure
    }

    fn check(&mut self, obj: SignedObject, step: usize, pending: Vec<SignedObject>) -> Validation {
        if step >= self.step_limit {
            return self.resolved(
                obj.name(),
                Err(ValidationFailure::DepthExceeded {
                    step,
                    limit: self.step_limit,
                }),
            );
        }

        let Some(locator) = obj.key_locator_name() else {
            return self.resolved(
                obj.name(),
                Err(ValidationFailure::MalformedSignature(obj.name().clone())),
            );
        };

        let path = self.select_path(&obj, &locator);
        debug!(
            name = %obj.name(),
            kind = obj.kind(),
            signer = %locator,
            step,
            path = path.as_str(),
            "Checking policy"
        );

        let outcome = match path {
            PolicyPath::Invitation => {
                let anchored = certificate_name_to_key_name(&locator)
                    .and_then(|key_name| self.anchors.get(&key_name));
                if let Some(key) = anchored {
                    verify(&obj, key)
                } else if let Some(cert) = self.cache.get(&locator) {
                    verify(&obj, cert.public_key())
                } else {
                    let mut pending = pending;
                    pending.push(obj);
                    return Validation::NeedsFetch(ValidationRequest {
                        name: locator,
                        step: step + 1,
                        pending,
                    });
                }
            }
            PolicyPath::AnchoredKsk { key_name } => self.check_anchored_ksk(&obj, &key_name),
            PolicyPath::Dsk { issuer } => self.check_dsk(&obj, &issuer, locator),
            PolicyPath::ChatData { prefix } => self.check_chat_data(&obj, &prefix, locator),
            PolicyPath::Unmatched => Err(ValidationFailure::NoApplicableRule(obj.name().clone())),
        };

        match outcome {
            Ok(()) => self.unwind(obj, pending),
            Err(failure) => self.resolved(obj.name(), Err(failure)),
        }
    }

    fn select_path(&self, obj: &SignedObject, locator: &Name) -> PolicyPath {
        let invitation = match obj {
            SignedObject::Data(_) => self.invitation_rule.satisfy(obj),
            SignedObject::Interest(_) => self.invitation_request_rule.satisfy(obj),
        };
        if invitation {
            return PolicyPath::Invitation;
        }

        let SignedObject::Data(data) = obj else {
            return PolicyPath::Unmatched;
        };

        if let Some(key_name) = self
            .ksk_certificate_regex
            .expand(data.name(), &self.key_name_expansion)
            && self.anchors.contains(&key_name)
        {
            return PolicyPath::AnchoredKsk { key_name };
        }

        if self.dsk_rule.satisfy(obj)
            && let Some(issuer) = self.ksk_locator_regex.expand(locator, &self.key_name_expansion)
        {
            return PolicyPath::Dsk { issuer };
        }

        // longest admitted prefix wins
        if let Some(prefix) = self
            .chat_rules
            .keys()
            .filter(|prefix| prefix.is_prefix_of(data.name()))
            .max_by_key(|prefix| prefix.len())
        {
            return PolicyPath::ChatData {
                prefix: prefix.clone(),
            };
        }

        PolicyPath::Unmatched
    }

    fn check_anchored_ksk(&self, obj: &SignedObject, key_name: &Name) -> Result<(), ValidationFailure> {
        let anchor = self.anchors.get(key_name).ok_or_else(|| ValidationFailure::Untrusted {
            name: obj.name().clone(),
            signer: key_name.clone(),
        })?;
        let cert = certificate_of(obj)?;

        if cert.public_key() != anchor {
            return Err(ValidationFailure::AnchorMismatch(cert.name().clone()));
        }
        if !cert.is_valid_at(now_ms()) {
            return Err(ValidationFailure::OutsideValidityWindow(cert.name().clone()));
        }
        Ok(())
    }

    fn check_dsk(&self, obj: &SignedObject, issuer: &Name, locator: Name) -> Result<(), ValidationFailure> {
        let key = self.anchors.get(issuer).ok_or_else(|| ValidationFailure::Untrusted {
            name: obj.name().clone(),
            signer: locator,
        })?;
        let cert = certificate_of(obj)?;

        if !cert.is_valid_at(now_ms()) {
            return Err(ValidationFailure::OutsideValidityWindow(cert.name().clone()));
        }
        verify(obj, key)
    }

    fn check_chat_data(
        &self,
        obj: &SignedObject,
        prefix: &Name,
        locator: Name,
    ) -> Result<(), ValidationFailure> {
        let cert = self.chat_rules.get(prefix).ok_or_else(|| {
            ValidationFailure::NoApplicableRule(obj.name().clone())
        })?;

        if cert.name_without_version() != locator {
            return Err(ValidationFailure::Untrusted {
                name: obj.name().clone(),
                signer: locator,
            });
        }
        if !cert.is_valid_at(now_ms()) {
            return Err(ValidationFailure::OutsideValidityWindow(cert.name().clone()));
        }
        verify(obj, cert.public_key())
    }

    /// `verified` passed; feed it to everything waiting on it
    fn unwind(&mut self, verified: SignedObject, mut pending: Vec<SignedObject>) -> Validation {
        let mut verified = verified;

        while let Some(waiting) = pending.pop() {
            let cert = match certificate_of(&verified) {
                Ok(cert) => cert,
                Err(failure) => return self.resolved(verified.name(), Err(failure)),
            };

            if !cert.is_valid_at(now_ms()) {
                let failure = ValidationFailure::OutsideValidityWindow(cert.name().clone());
                return self.resolved(waiting.name(), Err(failure));
            }

            let key = cert.public_key().clone();
            debug!(certificate = %cert.name(), "Caching validated certificate");
            self.cache.insert(cert.name_without_version(), cert);

            if let Err(failure) = verify(&waiting, &key) {
                return self.resolved(waiting.name(), Err(failure));
            }
            verified = waiting;
        }

        self.resolved(verified.name(), Ok(()))
    }

    fn resolved(&self, name: &Name, result: Result<(), ValidationFailure>) -> Validation {
        match &result {
            Ok(()) => {
                debug!(name = %name, "Validation succeeded");
                record_validation("success");
            }
            Err(failure) => {
                debug!(name = %name, reason = failure.as_str(), error = %failure, "Validation failed");
                record_validation(failure.as_str());
            }
        }
        Validation::Resolved(result)
    }
}

fn verify(obj: &SignedObject, key: &PublicKey) -> Result<(), ValidationFailure> {
    if obj.verify_with(key) {
        Ok(())
    } else {
        Err(ValidationFailure::BadSignature(obj.name().clone()))
    }
}

fn certificate_of(obj: &SignedObject) -> Result<Certificate, ValidationFailure> {
    match obj {
        SignedObject::Data(data) => Certificate::from_data(data.clone()).map_err(|e| {
            ValidationFailure::MalformedCertificate {
                name: data.name().clone(),
                reason: e.to_string(),
            }
        }),
        SignedObject::Interest(interest) => Err(ValidationFailure::MalformedCertificate {
            name: interest.name().clone(),
            reason: "an interest cannot carry a certificate".into(),
        }),
    }
}
