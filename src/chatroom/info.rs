// chatroom/info.rs - Chatroom Description

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::{Component, Name};
use crate::trust::IdentityError;

/// Errors related to chatroom descriptions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatroomError {
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Chatroom {0} lists no participants")]
    NoParticipants(String),

    #[error("Chatroom name is not valid UTF-8")]
    InvalidName,

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<IdentityError> for ChatroomError {
    fn from(e: IdentityError) -> Self {
        ChatroomError::Signing(e.to_string())
    }
}

/// How a chatroom decides whom to trust
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustModel {
    #[default]
    None,
    WebOfTrust,
    Hierarchical,
}

impl TrustModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustModel::None => "none",
            TrustModel::WebOfTrust => "web_of_trust",
            TrustModel::Hierarchical => "hierarchical",
        }
    }
}

/// What a chatroom advertises about itself on the discovery prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatroomInfo {
    pub name: String,

    pub trust_model: TrustModel,

    /// Sync prefix the room's digest tree runs under
    pub sync_prefix: Name,

    pub manager_prefix: Name,

    participants: Vec<Name>,
}

impl ChatroomInfo {
    pub fn new(name: impl Into<String>, sync_prefix: Name) -> Self {
        Self {
            name: name.into(),
            trust_model: TrustModel::default(),
            sync_prefix,
            manager_prefix: Name::new(),
            participants: Vec::new(),
        }
    }

    pub fn with_trust_model(mut self, trust_model: TrustModel) -> Self {
        self.trust_model = trust_model;
        self
    }

    pub fn with_manager(mut self, manager_prefix: Name) -> Self {
        self.manager_prefix = manager_prefix;
        self
    }

    /// Participant namespaces in the order they joined
    pub fn participants(&self) -> &[Name] {
        &self.participants
    }

    /// Returns `false` if already listed
    pub fn add_participant(&mut self, participant: Name) -> bool {
        if self.participants.contains(&participant) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    pub fn remove_participant(&mut self, participant: &Name) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p != participant);
        self.participants.len() != before
    }

    /// The room name as it appears in discovery names
    pub fn name_component(&self) -> Component {
        Component::from(self.name.as_str())
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChatroomError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ChatroomError::Encode(e.to_string()))
    }

    /// Strict decode; a room must list at least one participant
    pub fn decode(bytes: &[u8]) -> Result<Self, ChatroomError> {
        let (info, read): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ChatroomError::Decode(e.to_string()))?;
        if read != bytes.len() {
            return Err(ChatroomError::Decode(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        if info.participants.is_empty() {
            return Err(ChatroomError::NoParticipants(info.name));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn lobby() -> ChatroomInfo {
        let mut info = ChatroomInfo::new("lobby", name("/ndn/broadcast/chronos/lobby"))
            .with_trust_model(TrustModel::WebOfTrust)
            .with_manager(name("/ndn/alice"));
        info.add_participant(name("/ndn/alice"));
        info
    }

    #[test]
    fn test_participants_are_unique() {
        let mut info = lobby();
        assert!(!info.add_participant(name("/ndn/alice")));
        assert!(info.add_participant(name("/ndn/bob")));
        assert_eq!(info.participants(), &[name("/ndn/alice"), name("/ndn/bob")]);

        assert!(info.remove_participant(&name("/ndn/alice")));
        assert!(!info.remove_participant(&name("/ndn/alice")));
        assert_eq!(info.participants(), &[name("/ndn/bob")]);
    }

    #[test]
    fn test_decode() {
        let info = lobby();
        let decoded = ChatroomInfo::decode(&info.encode().unwrap()).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.trust_model.as_str(), "web_of_trust");
        assert_eq!(decoded.name_component(), Component::from("lobby"));
    }

    #[test]
    fn test_decode_rejects_empty_and_trailing() {
        let empty = ChatroomInfo::new("empty", name("/x"));
        assert_eq!(
            ChatroomInfo::decode(&empty.encode().unwrap()),
            Err(ChatroomError::NoParticipants("empty".into()))
        );

        let mut bytes = lobby().encode().unwrap();
        bytes.push(0);
        assert!(matches!(ChatroomInfo::decode(&bytes), Err(ChatroomError::Decode(_))));
        assert!(ChatroomInfo::decode(b"").is_err());
    }
}
