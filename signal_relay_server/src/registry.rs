//! Room membership bookkeeping
//!
//! The registry keeps two indices that must always agree:
//!
//! - `rooms`: room -> members (connection ID -> user ID)
//! - `memberships`: connection -> rooms it is a member of
//!
//! A room exists only while it has at least one member. The call that removes
//! the last member also removes the room.

use signal_relay_protocol::{ConnectionId, RoomId, UserId};
use std::collections::{HashMap, HashSet};

/// One connection's entry in a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRecord {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// Result of [`Registry::join`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub record: MemberRecord,
    /// Members that were already in the room, excluding the joiner
    pub previous: Vec<MemberRecord>,
    /// User ID the connection was registered under before this join, if it
    /// was already a member
    pub replaced: Option<UserId>,
}

/// A room a departing connection was removed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vacated {
    pub room_id: RoomId,
    pub user_id: UserId,
    /// Members still in the room. Empty means the room was removed.
    pub remaining: Vec<MemberRecord>,
}

/// Rooms and their members, indexed both ways
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomId, HashMap<ConnectionId, UserId>>,
    memberships: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl Registry {
    /// Create a registry with no rooms
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to a room, creating the room if needed
    ///
    /// Joining a room the connection is already in replaces its user ID.
    pub fn join(&mut self, connection_id: ConnectionId, room_id: RoomId, user_id: UserId) -> Joined {
        let members = self.rooms.entry(room_id.clone()).or_default();

        let previous = members
            .iter()
            .filter(|(id, _)| **id != connection_id)
            .map(|(id, user)| MemberRecord {
                connection_id: *id,
                user_id: user.clone(),
            })
            .collect();

        let replaced = members.insert(connection_id, user_id.clone());
        self.memberships
            .entry(connection_id)
            .or_default()
            .insert(room_id);

        Joined {
            record: MemberRecord {
                connection_id,
                user_id,
            },
            previous,
            replaced,
        }
    }

    /// Removes a connection from every room it joined
    ///
    /// Rooms left without members are dropped. Calling this again for the
    /// same connection returns an empty list.
    pub fn leave_all(&mut self, connection_id: ConnectionId) -> Vec<Vacated> {
        let Some(room_ids) = self.memberships.remove(&connection_id) else {
            return Vec::new();
        };

        let mut vacated = Vec::with_capacity(room_ids.len());
        for room_id in room_ids {
            let Some(members) = self.rooms.get_mut(&room_id) else {
                continue;
            };
            let Some(user_id) = members.remove(&connection_id) else {
                continue;
            };

            let remaining: Vec<MemberRecord> = members
                .iter()
                .map(|(id, user)| MemberRecord {
                    connection_id: *id,
                    user_id: user.clone(),
                })
                .collect();

            if remaining.is_empty() {
                self.rooms.remove(&room_id);
            }

            vacated.push(Vacated {
                room_id,
                user_id,
                remaining,
            });
        }
        vacated
    }

    /// Snapshot of a room's members, empty if the room does not exist
    pub fn members_of(&self, room_id: &RoomId) -> Vec<MemberRecord> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(id, user)| MemberRecord {
                        connection_id: *id,
                        user_id: user.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// User ID a connection registered under in a room
    pub fn resolve_user_id(&self, connection_id: ConnectionId, room_id: &RoomId) -> Option<UserId> {
        self.rooms.get(room_id)?.get(&connection_id).cloned()
    }

    /// Rooms a connection is currently a member of
    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.memberships
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the room currently has members
    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of live rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Checks that no room is empty and that both indices describe the same
    /// memberships
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.rooms.iter().all(|(room_id, members)| {
            !members.is_empty()
                && members.keys().all(|id| {
                    self.memberships
                        .get(id)
                        .is_some_and(|rooms| rooms.contains(room_id))
                })
        });

        let reverse_ok = self.memberships.iter().all(|(id, rooms)| {
            !rooms.is_empty()
                && rooms.iter().all(|room_id| {
                    self.rooms
                        .get(room_id)
                        .is_some_and(|members| members.contains_key(id))
                })
        });

        forward_ok && reverse_ok
    }
}
