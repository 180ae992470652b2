// chat/message.rs - Chat Message Payloads

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::trust::IdentityError;

/// Sender name given to payloads that could not be decoded
pub const UNKNOWN_SENDER: &str = "inconnu";

/// Errors related to chat message encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid message: {0}")]
    Invalid(&'static str),

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl From<IdentityError> for MessageError {
    fn from(e: IdentityError) -> Self {
        MessageError::Signing(e.to_string())
    }
}

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Chat,
    Hello,
    Leave,
    Join,
    Other,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Hello => "hello",
            MessageType::Leave => "leave",
            MessageType::Join => "join",
            MessageType::Other => "other",
        }
    }
}

/// One payload published into the chatroom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender nick
    pub from: String,

    /// Chatroom
    pub to: String,

    pub data: String,

    /// Send time (ms)
    pub timestamp: Option<i64>,

    pub msg_type: MessageType,
}

impl ChatMessage {
    pub fn chat(from: impl Into<String>, to: impl Into<String>, data: impl Into<String>, timestamp: i64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            data: data.into(),
            timestamp: Some(timestamp),
            msg_type: MessageType::Chat,
        }
    }

    /// JOIN, HELLO or LEAVE
    pub fn control(from: impl Into<String>, to: impl Into<String>, msg_type: MessageType, timestamp: i64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            data: String::new(),
            timestamp: Some(timestamp),
            msg_type,
        }
    }

    /// Stand-in for an undecodable payload
    pub fn placeholder() -> Self {
        Self {
            from: UNKNOWN_SENDER.into(),
            to: String::new(),
            data: String::new(),
            timestamp: None,
            msg_type: MessageType::Other,
        }
    }

    pub fn validate(&self) -> Result<(), MessageError> {
        if self.from.is_empty() {
            return Err(MessageError::Invalid("empty sender"));
        }
        if self.msg_type == MessageType::Chat {
            if self.data.is_empty() {
                return Err(MessageError::Invalid("empty chat data"));
            }
            if self.timestamp.is_none() {
                return Err(MessageError::Invalid("chat message without timestamp"));
            }
        }
        Ok(())
    }

    /// A valid CHAT message the view should render
    pub fn is_displayable(&self) -> bool {
        self.msg_type == MessageType::Chat && self.validate().is_ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| MessageError::Encode(e.to_string()))
    }

    /// Strict decode: the whole buffer must be one message
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let (msg, read): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| MessageError::Decode(e.to_string()))?;
        if read != bytes.len() {
            return Err(MessageError::Decode(format!(
                "{} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(msg)
    }

    /// Decode, substituting [`ChatMessage::placeholder`] on failure
    pub fn decode_or_placeholder(bytes: &[u8]) -> Self {
        match Self::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Undecodable chat payload");
                Self::placeholder()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let msg = ChatMessage::chat("alice", "lobby", "hi there", 42);
        let decoded = ChatMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.is_displayable());
    }

    #[test]
    fn test_corrupt_payload_yields_placeholder() {
        let msg = ChatMessage::decode_or_placeholder(&[0xff, 0xfe, 0x00, 0x13, 0x37]);
        assert_eq!(msg.from, UNKNOWN_SENDER);
        assert_eq!(msg.msg_type, MessageType::Other);
        assert!(!msg.is_displayable());

        let mut bytes = ChatMessage::chat("alice", "lobby", "hi", 1).encode().unwrap();
        bytes.push(0);
        assert_eq!(ChatMessage::decode_or_placeholder(&bytes).from, UNKNOWN_SENDER);
    }

    #[test]
    fn test_validity() {
        assert!(ChatMessage::control("alice", "lobby", MessageType::Hello, 1).validate().is_ok());
        assert!(ChatMessage::chat("alice", "lobby", "", 1).validate().is_err());
        assert!(ChatMessage::chat("", "lobby", "hi", 1).validate().is_err());

        let mut undated = ChatMessage::chat("alice", "lobby", "hi", 1);
        undated.timestamp = None;
        assert_eq!(
            undated.validate(),
            Err(MessageError::Invalid("chat message without timestamp"))
        );
    }
}
