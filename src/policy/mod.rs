// policy/mod.rs - Policy Rule Engine

//! Name-template rules that decide which validation path applies.
//!
//! - **Regex**: component-level name patterns with capture expansion
//! - **Rule**: a data pattern and a signer pattern tied by a relation
//!
//! The standard rules used by the validator are built here. The invitation
//! rules are parameterized by the broadcast root so deployments outside
//! `/ndn/broadcast` work unchanged.

mod regex;
mod rule;

pub use regex::{literal_component, Captures, Expansion, NameRegex, RegexError};
pub use rule::{ChatPolicyRule, PolicyError, Relation};

use crate::name::Name;

pub const CHRONOS_COMPONENT: &str = "chronos";
pub const INVITATION_COMPONENT: &str = "invitation";
pub const CHATROOM_COMPONENT: &str = "chatroom";

/// Any DSK or KSK identity certificate name without version
pub const SIGNER_PATTERN: &str = "^([^<KEY>]*)<KEY>(<>*)[<dsk-.*><ksk-.*>]<ID-CERT>$";

/// Versioned KSK certificate name
pub const KSK_CERTIFICATE_PATTERN: &str = "^([^<KEY>]*)<KEY>(<>*<ksk-.*>)<ID-CERT><>$";

/// KSK certificate name without version, as found in key locators
pub const KSK_LOCATOR_PATTERN: &str = "^([^<KEY>]*)<KEY>(<>*<ksk-.*>)<ID-CERT>$";

/// Versioned DSK certificate name
pub const DSK_CERTIFICATE_PATTERN: &str = "^([^<KEY>]*)<KEY><dsk-.*><ID-CERT><>$";

/// KSK certificate signing a DSK certificate
pub const DSK_ISSUER_PATTERN: &str = "^([^<KEY>]*)<KEY>(<>*)<ksk-.*><ID-CERT>$";

/// Expansion turning a certificate name into its key name
pub const KEY_NAME_EXPANSION: &str = "\\1\\2";

/// `^<root...><chronos><invitation>([^<chatroom>]*)<chatroom>`
pub fn invitation_data_pattern(broadcast_root: &Name) -> String {
    let mut pattern = String::from("^");
    for component in broadcast_root.components() {
        pattern.push_str(&literal_component(component));
    }
    pattern.push_str(&format!(
        "<{}><{}>([^<{}>]*)<{}>",
        CHRONOS_COMPONENT, INVITATION_COMPONENT, CHATROOM_COMPONENT, CHATROOM_COMPONENT
    ));
    pattern
}

/// Invitation replies must be signed by the invitee namespace they were sent to
pub fn invitation_rule(broadcast_root: &Name) -> Result<ChatPolicyRule, PolicyError> {
    ChatPolicyRule::new(
        &invitation_data_pattern(broadcast_root),
        "\\1",
        SIGNER_PATTERN,
        KEY_NAME_EXPANSION,
        "==",
    )
}

/// Invitation requests are signed by the inviter; no name relation applies
pub fn invitation_request_rule(broadcast_root: &Name) -> Result<ChatPolicyRule, PolicyError> {
    ChatPolicyRule::new(
        &invitation_data_pattern(broadcast_root),
        "\\1",
        SIGNER_PATTERN,
        KEY_NAME_EXPANSION,
        "*",
    )
}

/// DSK certificates must be issued by a KSK of the same identity
pub fn dsk_rule() -> Result<ChatPolicyRule, PolicyError> {
    ChatPolicyRule::new(
        DSK_CERTIFICATE_PATTERN,
        "\\1",
        DSK_ISSUER_PATTERN,
        KEY_NAME_EXPANSION,
        "==",
    )
}
