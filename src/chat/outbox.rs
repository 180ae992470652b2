// chat/outbox.rs - Outgoing Chat Data

use tracing::trace;

use super::message::{ChatMessage, MessageError, MessageType};
use crate::name::Name;
use crate::packet::Data;
use crate::protocol::IntroCertificate;
use crate::trust::Identity;

/// Builds the signed data this participant publishes
///
/// Chat payloads go to `<chat prefix>/<seq>` and introductions to
/// `<chat prefix>/INTRO-CERT/<seq>`, each with its own sequence.
#[derive(Debug)]
pub struct Outbox {
    chat_prefix: Name,

    chatroom: String,

    nick: String,

    seq: u64,

    intro_seq: u64,

    freshness_ms: u64,
}

impl Outbox {
    pub fn new(chat_prefix: Name, chatroom: impl Into<String>, nick: impl Into<String>, freshness_ms: u64) -> Self {
        Self {
            chat_prefix,
            chatroom: chatroom.into(),
            nick: nick.into(),
            seq: 0,
            intro_seq: 0,
            freshness_ms,
        }
    }

    pub fn chat_prefix(&self) -> &Name {
        &self.chat_prefix
    }

    pub fn chatroom(&self) -> &str {
        &self.chatroom
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn set_nick(&mut self, nick: impl Into<String>) {
        self.nick = nick.into();
    }

    /// Sequence the next chat payload will use
    pub fn next_seq(&self) -> u64 {
        self.seq
    }

    pub fn next_intro_seq(&self) -> u64 {
        self.intro_seq
    }

    pub fn chat(&mut self, text: &str, now: i64, identity: &Identity) -> Result<(ChatMessage, Data), MessageError> {
        let msg = ChatMessage::chat(&self.nick, &self.chatroom, text, now);
        msg.validate()?;
        let data = self.publish(&msg, identity)?;
        Ok((msg, data))
    }

    pub fn hello(&mut self, now: i64, identity: &Identity) -> Result<Data, MessageError> {
        self.control(MessageType::Hello, now, identity)
    }

    pub fn join(&mut self, now: i64, identity: &Identity) -> Result<Data, MessageError> {
        self.control(MessageType::Join, now, identity)
    }

    pub fn leave(&mut self, now: i64, identity: &Identity) -> Result<Data, MessageError> {
        self.control(MessageType::Leave, now, identity)
    }

    fn control(&mut self, msg_type: MessageType, now: i64, identity: &Identity) -> Result<Data, MessageError> {
        let msg = ChatMessage::control(&self.nick, &self.chatroom, msg_type, now);
        self.publish(&msg, identity)
    }

    fn publish(&mut self, msg: &ChatMessage, identity: &Identity) -> Result<Data, MessageError> {
        let name = self.chat_prefix.clone().append_number(self.seq);
        let mut data = Data::new(name, msg.encode()?).with_freshness(self.freshness_ms);
        identity.sign_data(&mut data)?;

        trace!(name = %data.name(), msg_type = msg.msg_type.as_str(), "Chat data built");
        self.seq += 1;
        Ok(data)
    }

    /// Signed introduction for a newly admitted participant
    pub fn intro(&mut self, intro: &IntroCertificate, identity: &Identity) -> Result<Data, MessageError> {
        let data = intro
            .to_data(&self.chat_prefix, self.intro_seq, identity)
            .map_err(|e| MessageError::Encode(e.to_string()))?;
        self.intro_seq += 1;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SignedObject;
    use crate::protocol::IntroRole;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_sequences_advance() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let prefix = name("/private/local/ndn/alice/lobby");
        let mut outbox = Outbox::new(prefix.clone(), "lobby", "alice", 60_000);

        let join = outbox.join(1, &alice).unwrap();
        let (msg, chat) = outbox.chat("hello", 2, &alice).unwrap();
        assert_eq!(join.name(), &prefix.clone().append_number(0));
        assert_eq!(chat.name(), &prefix.clone().append_number(1));
        assert_eq!(chat.freshness_ms(), Some(60_000));
        assert_eq!(outbox.next_seq(), 2);

        assert_eq!(ChatMessage::decode(chat.content()).unwrap(), msg);
        assert_eq!(ChatMessage::decode(join.content()).unwrap().msg_type, MessageType::Join);
        assert!(SignedObject::from(chat).verify_with(alice.dsk_certificate().public_key()));
    }

    #[test]
    fn test_empty_chat_is_refused() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let mut outbox = Outbox::new(name("/p"), "lobby", "alice", 1_000);
        assert!(outbox.chat("", 1, &alice).is_err());
        assert_eq!(outbox.next_seq(), 0);
    }

    #[test]
    fn test_intro_uses_own_sequence() {
        let alice = Identity::generate(name("/ndn/alice")).unwrap();
        let bob = Identity::generate(name("/ndn/bob")).unwrap();
        let prefix = name("/p/alice/lobby");
        let mut outbox = Outbox::new(prefix.clone(), "lobby", "alice", 1_000);
        outbox.hello(1, &alice).unwrap();

        let intro = IntroCertificate::new(bob.dsk_certificate().clone(), name("/p/bob/lobby"), IntroRole::Producer);
        let data = outbox.intro(&intro, &alice).unwrap();
        assert_eq!(data.name(), &IntroCertificate::sync_prefix(&prefix).append_number(0));
        assert_eq!(outbox.next_intro_seq(), 1);
        assert_eq!(outbox.next_seq(), 1);
    }
}
