// trust/anchors.rs - Trust Anchor Store

use std::collections::HashMap;
use tracing::debug;

use super::certificate::Certificate;
use super::identity::PublicKey;
use crate::name::Name;

/// Key names trusted directly, without chain resolution
#[derive(Debug, Clone, Default)]
pub struct TrustAnchorStore {
    anchors: HashMap<Name, PublicKey>,
}

impl TrustAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust the certificate's key; overwrites any previous key for that name
    pub fn add_trust_anchor(&mut self, cert: &Certificate) -> Option<PublicKey> {
        self.add_trust_anchor_key(cert.key_name().clone(), cert.public_key().clone())
    }

    pub fn add_trust_anchor_key(&mut self, key_name: Name, key: PublicKey) -> Option<PublicKey> {
        debug!(key_name = %key_name, key = %key.short(), "Trust anchor added");
        self.anchors.insert(key_name, key)
    }

    /// Idempotent removal
    pub fn remove_trust_anchor(&mut self, key_name: &Name) -> Option<PublicKey> {
        let removed = self.anchors.remove(key_name);
        if removed.is_some() {
            debug!(key_name = %key_name, "Trust anchor removed");
        }
        removed
    }

    /// Drop every anchor (identity switch)
    pub fn clean_trust_anchor(&mut self) {
        debug!(count = self.anchors.len(), "Trust anchors cleared");
        self.anchors.clear();
    }

    pub fn get(&self, key_name: &Name) -> Option<&PublicKey> {
        self.anchors.get(key_name)
    }

    pub fn contains(&self, key_name: &Name) -> bool {
        self.anchors.contains_key(key_name)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn key_names(&self) -> impl Iterator<Item = &Name> {
        self.anchors.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::identity::Identity;

    #[test]
    fn test_add_overwrite_remove() {
        let alice = Identity::generate(Name::from_uri("/ndn/alice").unwrap()).unwrap();
        let mut store = TrustAnchorStore::new();

        assert!(store.add_trust_anchor(alice.ksk_certificate()).is_none());
        let key_name = alice.ksk_certificate().key_name().clone();
        assert_eq!(store.get(&key_name), Some(alice.ksk_certificate().public_key()));

        let replacement = PublicKey::from_bytes(vec![9; 32]);
        let previous = store.add_trust_anchor_key(key_name.clone(), replacement.clone());
        assert_eq!(previous.as_ref(), Some(alice.ksk_certificate().public_key()));
        assert_eq!(store.get(&key_name), Some(&replacement));
        assert_eq!(store.len(), 1);

        assert!(store.remove_trust_anchor(&key_name).is_some());
        assert!(store.remove_trust_anchor(&key_name).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clean() {
        let mut store = TrustAnchorStore::new();
        store.add_trust_anchor_key(Name::from_uri("/a/ksk-1").unwrap(), PublicKey::from_bytes(vec![1]));
        store.add_trust_anchor_key(Name::from_uri("/b/ksk-1").unwrap(), PublicKey::from_bytes(vec![2]));
        assert_eq!(store.key_names().count(), 2);

        store.clean_trust_anchor();
        assert!(store.is_empty());
        assert!(!store.contains(&Name::from_uri("/a/ksk-1").unwrap()));
    }
}
