//! Protocol messages carried by `PUT /message/`
//!
//! A message names what it is about (`kind`), where it is going (`target`)
//! and carries opaque bytes. Encoded with postcard.

use sealnet_core::RoutingKey;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Default cap on an encoded message (2 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Message codec errors
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message too large: {actual} bytes (max {limit})")]
    TooLarge { limit: usize, actual: usize },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<postcard::Error> for MessageError {
    fn from(e: postcard::Error) -> Self {
        MessageError::Serialization(e.to_string())
    }
}

/// Message kinds. On the wire the tag is the postcard variant index, so
/// new kinds are only ever appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Node announcing itself
    Join,
    /// Liveness check
    Echo,
    /// Request that a fragment be stored
    PutFragment,
    /// Request for a fragment
    GetFragment,
    /// A boxed capability for a user
    Share,
}

impl MessageKind {
    /// Stable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::Join => "join",
            MessageKind::Echo => "echo",
            MessageKind::PutFragment => "put_fragment",
            MessageKind::GetFragment => "get_fragment",
            MessageKind::Share => "share",
        }
    }
}

/// A protocol message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub target: RoutingKey,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageKind, target: RoutingKey, payload: Vec<u8>) -> Self {
        Self {
            kind,
            target,
            payload,
        }
    }

    pub fn echo(target: RoutingKey) -> Self {
        Self::new(MessageKind::Echo, target, Vec::new())
    }

    /// A boxed capability addressed to `username`'s inbox
    pub fn share(username: &str, boxed_capability: Vec<u8>) -> Self {
        Self::new(
            MessageKind::Share,
            RoutingKey::for_username(username),
            boxed_capability,
        )
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn encode(&self, max_size: usize) -> Result<Vec<u8>, MessageError> {
        let bytes = postcard::to_allocvec(self)?;
        if bytes.len() > max_size {
            return Err(MessageError::TooLarge {
                limit: max_size,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8], max_size: usize) -> Result<Self, MessageError> {
        if bytes.len() > max_size {
            return Err(MessageError::TooLarge {
                limit: max_size,
                actual: bytes.len(),
            });
        }
        let (message, rest) = postcard::take_from_bytes::<Message>(bytes)?;
        if !rest.is_empty() {
            return Err(MessageError::Serialization(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }
        Ok(message)
    }
}

// Identity of a message is what it is and where it goes, not its payload.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.target == other.target
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.target.hash(state);
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::new(MessageKind::Join, RoutingKey([7; 32]), vec![1, 2, 3]);
        let bytes = msg.encode(DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let decoded = Message::decode(&bytes, DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        assert_eq!(decoded.kind, MessageKind::Join);
        assert_eq!(decoded.target, msg.target);
        assert_eq!(decoded.payload, msg.payload);
    }

    #[test]
    fn test_equality_ignores_payload() {
        let a = Message::new(MessageKind::Echo, RoutingKey([1; 32]), vec![1]);
        let b = Message::new(MessageKind::Echo, RoutingKey([1; 32]), vec![2]);
        let c = Message::new(MessageKind::Join, RoutingKey([1; 32]), vec![1]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_size_cap() {
        let msg = Message::new(MessageKind::Share, RoutingKey([0; 32]), vec![0; 100]);
        assert!(matches!(msg.encode(64), Err(MessageError::TooLarge { limit: 64, .. })));

        let bytes = msg.encode(1024).unwrap();
        assert!(matches!(
            Message::decode(&bytes, 64),
            Err(MessageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Message::decode(&[0xff, 0xff, 0xff], 1024).is_err());

        let mut bytes = Message::echo(RoutingKey([3; 32])).encode(1024).unwrap();
        bytes.push(0);
        assert!(Message::decode(&bytes, 1024).is_err());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MessageKind::Share.name(), "share");
        let msg = Message::share("bob", vec![]);
        assert_eq!(msg.target, RoutingKey::for_username("bob"));
        assert!(msg.to_string().starts_with("share("));
    }

    #[test]
    fn test_kind_tag_is_variant_index() {
        let kinds = [
            MessageKind::Join,
            MessageKind::Echo,
            MessageKind::PutFragment,
            MessageKind::GetFragment,
            MessageKind::Share,
        ];
        for (index, kind) in kinds.into_iter().enumerate() {
            let bytes = Message::new(kind, RoutingKey([0; 32]), vec![]).encode(1024).unwrap();
            assert_eq!(bytes[0] as usize, index);
        }

        let mut bytes = Message::echo(RoutingKey([0; 32])).encode(1024).unwrap();
        bytes[0] = 5;
        assert!(matches!(
            Message::decode(&bytes, 1024),
            Err(MessageError::Serialization(_))
        ));
    }
}
