// trust/store.rs - Persistent Contact Store using Sled

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;

use super::anchors::TrustAnchorStore;
use super::certificate::Certificate;
use super::identity::{ExportedIdentity, Identity};
use crate::name::Name;

/// Errors related to contact store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Identity error: {0}")]
    IdentityError(String),
}

/// Tree names for different data types
const TREE_IDENTITY: &str = "identity";
const TREE_CONTACTS: &str = "contacts";
const TREE_CONF: &str = "conf";

const SELF_KEY: &[u8] = b"self";
const CONF_KEY: &[u8] = b"conf";

/// A known peer and the scope of trust placed in it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Identity namespace, e.g. `/ndn/bob`
    pub namespace: Name,

    /// Display alias
    pub alias: String,

    /// The contact's KSK certificate
    pub certificate: Certificate,

    /// Allowed to introduce further participants
    pub is_introducer: bool,
}

impl Contact {
    /// Contact whose namespace is derived from the certificate's key name
    pub fn new(alias: impl Into<String>, certificate: Certificate) -> Self {
        Self {
            namespace: certificate.key_name().prefix(-1),
            alias: alias.into(),
            certificate,
            is_introducer: false,
        }
    }

    pub fn with_introducer(mut self, is_introducer: bool) -> Self {
        self.is_introducer = is_introducer;
        self
    }
}

/// Last-used chatroom settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conf {
    pub identity: Name,

    pub nick: String,
}

/// Persistent store for the local identity, contacts and chat settings
pub struct ContactStore {
    db: Db,
    identity: Tree,
    contacts: Tree,
    conf: Tree,
}

impl ContactStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let identity = db.open_tree(TREE_IDENTITY)?;
        let contacts = db.open_tree(TREE_CONTACTS)?;
        let conf = db.open_tree(TREE_CONF)?;

        Ok(Self {
            db,
            identity,
            contacts,
            conf,
        })
    }

    /// Store our own identity (secret keys included)
    pub fn save_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        let bytes = encode(&identity.export())?;
        self.identity.insert(SELF_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load our own identity
    pub fn load_identity(&self) -> Result<Option<Identity>, StoreError> {
        match self.identity.get(SELF_KEY)? {
            Some(bytes) => {
                let exported: ExportedIdentity = decode(&bytes)?;
                let identity = Identity::import(&exported)
                    .map_err(|e| StoreError::IdentityError(e.to_string()))?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace a contact keyed by namespace
    pub fn add_contact(&self, contact: &Contact) -> Result<(), StoreError> {
        let bytes = encode(contact)?;
        self.contacts.insert(contact.namespace.to_uri().as_bytes(), bytes)?;
        Ok(())
    }

    pub fn contact(&self, namespace: &Name) -> Result<Option<Contact>, StoreError> {
        match self.contacts.get(namespace.to_uri().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove a contact; returns it if it existed
    pub fn remove_contact(&self, namespace: &Name) -> Result<Option<Contact>, StoreError> {
        match self.contacts.remove(namespace.to_uri().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load all contacts
    pub fn contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts = Vec::new();
        for result in self.contacts.iter() {
            let (_, bytes) = result?;
            contacts.push(decode(&bytes)?);
        }
        Ok(contacts)
    }

    /// Anchor every contact's certificate; returns how many were added
    pub fn load_anchors(&self, anchors: &mut TrustAnchorStore) -> Result<usize, StoreError> {
        let contacts = self.contacts()?;
        for contact in &contacts {
            anchors.add_trust_anchor(&contact.certificate);
        }
        Ok(contacts.len())
    }

    pub fn save_conf(&self, conf: &Conf) -> Result<(), StoreError> {
        self.conf.insert(CONF_KEY, encode(conf)?)?;
        Ok(())
    }

    pub fn load_conf(&self) -> Result<Option<Conf>, StoreError> {
        match self.conf.get(CONF_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush all pending writes
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(uri: &str) -> Identity {
        Identity::generate(Name::from_uri(uri).unwrap()).unwrap()
    }

    #[test]
    fn test_store_identity() {
        let store = ContactStore::in_memory().unwrap();
        assert!(store.load_identity().unwrap().is_none());

        let alice = identity("/ndn/alice");
        store.save_identity(&alice).unwrap();

        let loaded = store.load_identity().unwrap().unwrap();
        assert_eq!(loaded.namespace(), alice.namespace());
        assert_eq!(loaded.ksk_certificate(), alice.ksk_certificate());
    }

    #[test]
    fn test_contacts_and_anchors() {
        let store = ContactStore::in_memory().unwrap();
        let bob = identity("/ndn/bob");
        let carol = identity("/ndn/carol");

        let bob_contact = Contact::new("bob", bob.ksk_certificate().clone()).with_introducer(true);
        assert_eq!(bob_contact.namespace, Name::from_uri("/ndn/bob").unwrap());
        store.add_contact(&bob_contact).unwrap();
        store
            .add_contact(&Contact::new("carol", carol.ksk_certificate().clone()))
            .unwrap();

        assert_eq!(store.contacts().unwrap().len(), 2);
        assert_eq!(store.contact(&bob_contact.namespace).unwrap(), Some(bob_contact.clone()));

        let mut anchors = TrustAnchorStore::new();
        assert_eq!(store.load_anchors(&mut anchors).unwrap(), 2);
        assert!(anchors.contains(bob.ksk_certificate().key_name()));

        let removed = store.remove_contact(&bob_contact.namespace).unwrap();
        assert_eq!(removed, Some(bob_contact.clone()));
        assert!(store.remove_contact(&bob_contact.namespace).unwrap().is_none());
        assert_eq!(store.contacts().unwrap().len(), 1);
    }

    #[test]
    fn test_conf_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let conf = Conf {
            identity: Name::from_uri("/ndn/alice").unwrap(),
            nick: "alice".into(),
        };

        {
            let store = ContactStore::open(dir.path()).unwrap();
            store.save_conf(&conf).unwrap();
            store.flush().unwrap();
        }

        let reopened = ContactStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load_conf().unwrap(), Some(conf));
    }
}
