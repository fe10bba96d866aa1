//! Wire types for the room-based WebRTC signaling relay
//!
//! Every message travels as one JSON envelope per WebSocket text frame:
//!
//! ```json
//! {"event": "offer", "data": {"roomId": "abc", "offer": {"type": "offer", "sdp": "..."}}}
//! ```
//!
//! Session descriptions and ICE candidates are opaque to the relay. They are
//! modelled as the type parameter `S`, which is [`serde_json::Value`] for the
//! JSON wire format, so the server carries them through without looking
//! inside.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::*;

/// Server-assigned identifier of one transport connection
#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Generates a fresh random connection ID
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        ConnectionId(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller-chosen room name
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Room name as sent by the client
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty names are rejected by the server
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        RoomId(id.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-supplied user identifier, never verified by the server
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// User ID as sent by the client
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<ConnectionId> for UserId {
    fn from(id: ConnectionId) -> Self {
        UserId(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requests a client may send to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientRequest<S> {
    /// Enter a room. Without a user ID the server registers the connection
    /// ID in its place.
    JoinRoom {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
    },
    Offer {
        room_id: RoomId,
        offer: S,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user_id: Option<UserId>,
    },
    Answer {
        room_id: RoomId,
        answer: S,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user_id: Option<UserId>,
    },
    IceCandidate {
        room_id: RoomId,
        candidate: S,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user_id: Option<UserId>,
    },
}

impl<S> ClientRequest<S> {
    /// The room this request is scoped to
    pub fn room_id(&self) -> &RoomId {
        match self {
            ClientRequest::JoinRoom { room_id, .. }
            | ClientRequest::Offer { room_id, .. }
            | ClientRequest::Answer { room_id, .. }
            | ClientRequest::IceCandidate { room_id, .. } => room_id,
        }
    }

    /// Wire name of the request
    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::JoinRoom { .. } => "join-room",
            ClientRequest::Offer { .. } => "offer",
            ClientRequest::Answer { .. } => "answer",
            ClientRequest::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Events the relay pushes to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent<S> {
    /// Acknowledges a join, listing the users already in the room
    RoomJoined {
        room_id: RoomId,
        connection_ref: ConnectionId,
        user_ids: Vec<UserId>,
    },
    /// Another user entered the room
    UserJoined {
        user_id: UserId,
        connection_ref: ConnectionId,
    },
    /// A user's connection went away
    UserLeft { user_id: UserId },
    OfferReceived { offer: S, from_user_id: UserId },
    AnswerReceived { answer: S, from_user_id: UserId },
    IceCandidateReceived { candidate: S, from_user_id: UserId },
    /// The last request from this client was rejected
    Error { message: String },
}

/// A signaling payload on its way between two peers
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<S> {
    Offer(S),
    Answer(S),
    IceCandidate(S),
}

impl<S> Signal<S> {
    /// Wraps the payload into the event delivered to recipients
    pub fn into_event(self, from_user_id: UserId) -> ServerEvent<S> {
        match self {
            Signal::Offer(offer) => ServerEvent::OfferReceived {
                offer,
                from_user_id,
            },
            Signal::Answer(answer) => ServerEvent::AnswerReceived {
                answer,
                from_user_id,
            },
            Signal::IceCandidate(candidate) => ServerEvent::IceCandidateReceived {
                candidate,
                from_user_id,
            },
        }
    }
}
