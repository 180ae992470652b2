// validator/driver.rs - Async Validation Driver

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::{Validation, ValidationFailure, Validator};
use crate::name::Name;
use crate::packet::{Data, Interest, SignedObject};
use crate::trust::Certificate;

/// Source of certificates for pending validation steps
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    /// Fetch the data answering `interest`, `None` once retries are exhausted
    async fn fetch(&self, interest: Interest) -> Option<Data>;
}

/// Run a validation to completion, fetching certificates as needed
pub async fn validate<F>(
    validator: &mut Validator,
    obj: SignedObject,
    fetcher: &F,
) -> Result<(), ValidationFailure>
where
    F: CertificateFetcher + ?Sized,
{
    let mut validation = validator.check_policy(obj, 0);
    loop {
        match validation {
            Validation::Resolved(result) => return result,
            Validation::NeedsFetch(request) => {
                debug!(name = %request.name, step = request.step, "Fetching certificate");
                validation = match fetcher.fetch(request.interest()).await {
                    Some(data) => validator.resume(request, data),
                    None => Validation::Resolved(Err(validator.fail_fetch(request))),
                };
            }
        }
    }
}

/// Certificates known up front, e.g. carried inside an invitation
#[derive(Debug, Clone, Default)]
pub struct StaticCertificates {
    certificates: HashMap<Name, Data>,
}

impl StaticCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, certificate: &Certificate) {
        self.certificates
            .insert(certificate.name_without_version(), certificate.data().clone());
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

#[async_trait]
impl CertificateFetcher for StaticCertificates {
    async fn fetch(&self, interest: Interest) -> Option<Data> {
        self.certificates.get(interest.name()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::Identity;
    use crate::validator::DEFAULT_STEP_LIMIT;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn reply_from(invitee: &Identity) -> Data {
        let reply_name = name("/ndn/broadcast/chronos/invitation")
            .append_name(invitee.namespace())
            .append("chatroom")
            .append("lobby");
        let mut data = Data::new(reply_name, b"accepted".to_vec());
        invitee.sign_data(&mut data).unwrap();
        data
    }

    #[tokio::test]
    async fn test_validate_fetches_missing_certificate() {
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let mut validator = Validator::new(&name("/ndn/broadcast"), DEFAULT_STEP_LIMIT).unwrap();
        validator.anchors_mut().add_trust_anchor(bob.ksk_certificate());

        let mut fetcher = StaticCertificates::new();
        fetcher.insert(bob.dsk_certificate());
        assert_eq!(fetcher.len(), 1);

        let result = validate(&mut validator, reply_from(&bob).into(), &fetcher).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_validate_reports_fetch_failure() {
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let mut validator = Validator::new(&name("/ndn/broadcast"), DEFAULT_STEP_LIMIT).unwrap();
        let fetcher = StaticCertificates::new();

        let result = validate(&mut validator, reply_from(&bob).into(), &fetcher).await;
        assert_eq!(result, Err(ValidationFailure::FetchFailed(bob.signer_name())));
    }

    #[test]
    fn test_validate_blocking() {
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let mut validator = Validator::new(&name("/ndn/broadcast"), DEFAULT_STEP_LIMIT).unwrap();
        validator.anchors_mut().add_trust_anchor(bob.ksk_certificate());
        let mut fetcher = StaticCertificates::new();
        fetcher.insert(bob.dsk_certificate());

        let result = tokio_test::block_on(validate(&mut validator, reply_from(&bob).into(), &fetcher));
        assert!(result.is_ok());
    }
}
