//! Room-based WebRTC signaling relay
//!
//! Clients that know a shared room name use this server to exchange session
//! descriptions and ICE candidates before connecting to each other directly.
//! The server never sees media. Room state lives in memory only and is rebuilt
//! from the open connections, so a restart drops every call in progress.
//!
//! # Protocol
//!
//! One WebSocket per client, one JSON envelope per text frame:
//! `{"event": "<name>", "data": {...}}`.
//!
//! ## Requests (client → server)
//!
//! - `join-room` `{"roomId", "userId"?}`
//! - `offer` `{"roomId", "offer", "targetUserId"?}`
//! - `answer` `{"roomId", "answer", "targetUserId"?}`
//! - `ice-candidate` `{"roomId", "candidate", "targetUserId"?}`
//!
//! Without `targetUserId` a signal goes to every other member of the room.
//!
//! ## Events (server → client)
//!
//! - `room-joined` `{"roomId", "connectionRef", "userIds"}` - sent to the joiner
//! - `user-joined` `{"userId", "connectionRef"}` - sent to existing members
//! - `user-left` `{"userId"}` - a member disconnected
//! - `offer-received` `{"offer", "fromUserId"}`
//! - `answer-received` `{"answer", "fromUserId"}`
//! - `ice-candidate-received` `{"candidate", "fromUserId"}`
//! - `error` `{"message"}` - the last request was malformed
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! signal-relay --bind 127.0.0.1:3000
//!
//! # Join a room
//! websocat ws://127.0.0.1:3000
//! {"event":"join-room","data":{"roomId":"abc","userId":"alice"}}
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod outbox;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ClientRequestError, SignalingError};
pub use registry::{MemberRecord, Registry};
pub use server::SignalingServer;
pub use state::ServerState;
