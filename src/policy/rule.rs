// policy/rule.rs - Relative Data/Signer Rules

use thiserror::Error;

use super::regex::{Expansion, NameRegex, RegexError};
use crate::name::Name;
use crate::packet::SignedObject;

/// Policy construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("Unknown relation operator: {0}")]
    UnknownRelation(String),
}

/// Required relation between the expanded data and signer names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `==`
    Equal,
    /// `>`: signer is a strict prefix of data
    StrictPrefix,
    /// `>=`: signer is a prefix of data
    Prefix,
    /// No relation required; both patterns only have to match
    Any,
}

impl Relation {
    pub fn parse(op: &str) -> Result<Self, PolicyError> {
        match op {
            "==" => Ok(Relation::Equal),
            ">" => Ok(Relation::StrictPrefix),
            ">=" => Ok(Relation::Prefix),
            "" | "*" => Ok(Relation::Any),
            other => Err(PolicyError::UnknownRelation(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Equal => "==",
            Relation::StrictPrefix => ">",
            Relation::Prefix => ">=",
            Relation::Any => "*",
        }
    }

    pub fn holds(&self, data: &Name, signer: &Name) -> bool {
        match self {
            Relation::Equal => data == signer,
            Relation::StrictPrefix => signer.is_prefix_of(data) && signer.len() < data.len(),
            Relation::Prefix => signer.is_prefix_of(data),
            Relation::Any => true,
        }
    }
}

/// Matches an object's name and its signer's key-locator name
#[derive(Debug, Clone)]
pub struct ChatPolicyRule {
    data_regex: NameRegex,

    data_expand: Expansion,

    signer_regex: NameRegex,

    signer_expand: Expansion,

    relation: Relation,
}

impl ChatPolicyRule {
    pub fn new(
        data_pattern: &str,
        data_expand: &str,
        signer_pattern: &str,
        signer_expand: &str,
        op: &str,
    ) -> Result<Self, PolicyError> {
        let data_regex = NameRegex::new(data_pattern)?;
        let data_expand = Expansion::parse(data_expand)?;
        data_regex.check_expansion(&data_expand)?;

        let signer_regex = NameRegex::new(signer_pattern)?;
        let signer_expand = Expansion::parse(signer_expand)?;
        signer_regex.check_expansion(&signer_expand)?;

        Ok(Self {
            data_regex,
            data_expand,
            signer_regex,
            signer_expand,
            relation: Relation::parse(op)?,
        })
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn match_data_name(&self, obj: &SignedObject) -> bool {
        self.data_regex.is_match(&obj.policy_name())
    }

    /// False when the signature has no usable name-typed key locator
    pub fn match_signer_name(&self, obj: &SignedObject) -> bool {
        obj.key_locator_name()
            .is_some_and(|signer| self.signer_regex.is_match(&signer))
    }

    pub fn satisfy(&self, obj: &SignedObject) -> bool {
        match obj.key_locator_name() {
            Some(signer) => self.satisfy_names(&obj.policy_name(), &signer),
            None => false,
        }
    }

    /// Pattern-only check, usable before the object exists
    pub fn satisfy_names(&self, data_name: &Name, signer_name: &Name) -> bool {
        let data = self.data_regex.expand(data_name, &self.data_expand);
        let signer = self.signer_regex.expand(signer_name, &self.signer_expand);
        match (data, signer) {
            (Some(data), Some(signer)) => self.relation.holds(&data, &signer),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Data, KeyLocator, Signature, SignatureInfo, SignatureType};

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn signed(data_name: &str, info: SignatureInfo) -> SignedObject {
        let mut data = Data::new(name(data_name), Vec::new());
        data.set_signature(Signature { info, value: vec![0; 64] });
        SignedObject::from(data)
    }

    fn prefix_rule(op: &str) -> ChatPolicyRule {
        ChatPolicyRule::new(
            "^(<>*)<DATA><>$",
            "\\1",
            "^([^<KEY>]*)<KEY>(<>*)<><ID-CERT>$",
            "\\1\\2",
            op,
        )
        .unwrap()
    }

    #[test]
    fn test_relations() {
        let a = name("/a");
        let ab = name("/a/b");
        assert!(Relation::Equal.holds(&a, &a));
        assert!(!Relation::Equal.holds(&ab, &a));
        assert!(Relation::StrictPrefix.holds(&ab, &a));
        assert!(!Relation::StrictPrefix.holds(&a, &a));
        assert!(Relation::Prefix.holds(&a, &a));
        assert!(Relation::Prefix.holds(&ab, &a));
        assert!(!Relation::Prefix.holds(&a, &ab));
        assert!(Relation::Any.holds(&a, &ab));
        assert!(Relation::parse("~").is_err());
        assert_eq!(Relation::parse(">=").unwrap().as_str(), ">=");
    }

    #[test]
    fn test_satisfy_names() {
        let equal = prefix_rule("==");
        assert!(equal.satisfy_names(&name("/alice/DATA/1"), &name("/alice/KEY/dsk-1/ID-CERT")));
        assert!(!equal.satisfy_names(&name("/alice/DATA/1"), &name("/bob/KEY/dsk-1/ID-CERT")));

        let prefix = prefix_rule(">");
        assert!(prefix.satisfy_names(&name("/org/alice/DATA/1"), &name("/org/KEY/dsk-1/ID-CERT")));
        assert!(!prefix.satisfy_names(&name("/org/DATA/1"), &name("/org/KEY/dsk-1/ID-CERT")));

        // signer does not match its pattern at all
        assert!(!equal.satisfy_names(&name("/alice/DATA/1"), &name("/alice/dsk-1")));
    }

    #[test]
    fn test_object_matching_fails_closed() {
        let rule = prefix_rule("==");

        let good = signed("/alice/DATA/1", SignatureInfo::ed25519(name("/alice/KEY/dsk-1/ID-CERT")));
        assert!(rule.match_data_name(&good));
        assert!(rule.match_signer_name(&good));
        assert!(rule.satisfy(&good));

        let digest = signed(
            "/alice/DATA/1",
            SignatureInfo {
                sig_type: SignatureType::Ed25519,
                key_locator: Some(KeyLocator::KeyDigest(vec![1; 32])),
            },
        );
        assert!(rule.match_data_name(&digest));
        assert!(!rule.match_signer_name(&digest));
        assert!(!rule.satisfy(&digest));

        let unsigned = SignedObject::from(Data::new(name("/alice/DATA/1"), Vec::new()));
        assert!(!rule.satisfy(&unsigned));
    }

    #[test]
    fn test_invalid_expansion_rejected() {
        let err = ChatPolicyRule::new("^(<>)$", "\\2", "^<>$", "", "==").unwrap_err();
        assert!(matches!(err, PolicyError::Regex(RegexError::InvalidExpansion(_))));
    }
}
