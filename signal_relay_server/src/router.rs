//! Routing of signaling requests between room members
//!
//! The router never looks inside offers, answers or candidates. It only
//! decides who receives them and stamps the sender's user ID on the way out.
//! Messages that cannot be routed are dropped without telling the sender.

use crate::error::ClientRequestError;
use crate::state::{InnerState, ServerState};
use serde_json::Value;
use signal_relay_protocol::{
    ClientRequest, ConnectionId, JsonClientRequest, JsonServerEvent, RoomId, Signal, UserId,
};
use tracing::{debug, info};

/// Handle one parsed request from `sender`
pub fn handle_request(
    state: &ServerState,
    sender: ConnectionId,
    request: JsonClientRequest,
) -> Result<(), ClientRequestError> {
    if request.room_id().is_empty() {
        return Err(ClientRequestError::Malformed(format!(
            "{} requires a non-empty roomId",
            request.kind()
        )));
    }

    match request {
        ClientRequest::JoinRoom { room_id, user_id } => {
            join_room(state, sender, room_id, user_id);
        }
        ClientRequest::Offer {
            room_id,
            offer,
            target_user_id,
        } => relay(state, sender, &room_id, target_user_id, Signal::Offer(offer)),
        ClientRequest::Answer {
            room_id,
            answer,
            target_user_id,
        } => relay(state, sender, &room_id, target_user_id, Signal::Answer(answer)),
        ClientRequest::IceCandidate {
            room_id,
            candidate,
            target_user_id,
        } => relay(
            state,
            sender,
            &room_id,
            target_user_id,
            Signal::IceCandidate(candidate),
        ),
    }
    Ok(())
}

fn join_room(state: &ServerState, sender: ConnectionId, room_id: RoomId, user_id: Option<UserId>) {
    let user_id = user_id
        .filter(|id| !id.as_str().is_empty())
        .unwrap_or_else(|| UserId::from(sender));

    let mut inner = state.lock();
    let joined = inner.registry.join(sender, room_id.clone(), user_id.clone());

    info!(
        %room_id,
        %user_id,
        connection = %sender,
        members = joined.previous.len() + 1,
        "user joined room"
    );

    match joined.replaced {
        // Repeated join under the same identity, peers already know it
        Some(old) if old == user_id => {}
        replaced => {
            if let Some(old) = replaced {
                let departure = JsonServerEvent::UserLeft { user_id: old };
                inner.fan_out(&joined.previous, &departure);
            }
            let announcement = JsonServerEvent::UserJoined {
                user_id,
                connection_ref: sender,
            };
            inner.fan_out(&joined.previous, &announcement);
        }
    }

    let ack = JsonServerEvent::RoomJoined {
        room_id,
        connection_ref: sender,
        user_ids: joined.previous.into_iter().map(|m| m.user_id).collect(),
    };
    inner.deliver(sender, &ack.to_string());
}

fn relay(
    state: &ServerState,
    sender: ConnectionId,
    room_id: &RoomId,
    target: Option<UserId>,
    signal: Signal<Value>,
) {
    let inner = state.lock();

    let Some(from_user_id) = inner.registry.resolve_user_id(sender, room_id) else {
        debug!(%room_id, connection = %sender, "sender is not in room, dropping signal");
        return;
    };

    let event = signal.into_event(from_user_id.clone());
    let delivered = route(&inner, sender, room_id, target.as_ref(), &event);

    debug!(
        %room_id,
        from = %from_user_id,
        target = ?target.as_ref().map(UserId::as_str),
        delivered,
        "relayed signal"
    );
}

/// Deliver `event` to the resolved recipients, returning how many got it
fn route(
    inner: &InnerState,
    sender: ConnectionId,
    room_id: &RoomId,
    target: Option<&UserId>,
    event: &JsonServerEvent,
) -> usize {
    let members = inner.registry.members_of(room_id);
    let recipients = members.iter().filter(|member| {
        member.connection_id != sender && target.is_none_or(|target| member.user_id == *target)
    });
    inner.fan_out(recipients, event)
}

/// Clean up after a connection went away
///
/// Removes the connection from every room and tells the remaining members
/// who left. Safe to call more than once.
pub fn handle_disconnect(state: &ServerState, connection: ConnectionId) {
    let mut inner = state.lock();

    if let Some(outbox) = inner.peers.remove(&connection) {
        outbox.close();
    }

    for vacated in inner.registry.leave_all(connection) {
        if vacated.remaining.is_empty() {
            info!(room_id = %vacated.room_id, user_id = %vacated.user_id, "room removed");
            continue;
        }

        info!(
            room_id = %vacated.room_id,
            user_id = %vacated.user_id,
            members = vacated.remaining.len(),
            "user left room"
        );
        let departure = JsonServerEvent::UserLeft {
            user_id: vacated.user_id,
        };
        inner.fan_out(&vacated.remaining, &departure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Outbox;
    use serde_json::json;
    use std::sync::Arc;

    struct Client {
        id: ConnectionId,
        outbox: Arc<Outbox>,
    }

    impl Client {
        fn connect(state: &ServerState) -> Self {
            let (id, outbox) = state.connect();
            Self { id, outbox }
        }

        fn events(&self) -> Vec<JsonServerEvent> {
            self.outbox
                .drain()
                .iter()
                .map(|text| text.parse::<JsonServerEvent>().unwrap())
                .collect()
        }

        fn join(&self, state: &ServerState, room: &str, user: &str) {
            handle_request(
                state,
                self.id,
                ClientRequest::JoinRoom {
                    room_id: RoomId::from(room),
                    user_id: Some(UserId::from(user)),
                },
            )
            .unwrap();
        }
    }

    fn offer(room: &str, target: Option<&str>) -> JsonClientRequest {
        ClientRequest::Offer {
            room_id: RoomId::from(room),
            offer: json!({"type": "offer", "sdp": "v=0"}),
            target_user_id: target.map(UserId::from),
        }
    }

    fn offer_received(from: &str) -> JsonServerEvent {
        JsonServerEvent::OfferReceived {
            offer: json!({"type": "offer", "sdp": "v=0"}),
            from_user_id: UserId::from(from),
        }
    }

    /// Three clients in room "abc", with join traffic already drained
    fn room_of_three(state: &ServerState) -> (Client, Client, Client) {
        let a = Client::connect(state);
        let b = Client::connect(state);
        let c = Client::connect(state);
        a.join(state, "abc", "alice");
        b.join(state, "abc", "bob");
        c.join(state, "abc", "carol");
        a.outbox.drain();
        b.outbox.drain();
        c.outbox.drain();
        (a, b, c)
    }

    #[test]
    fn join_announces_to_existing_members() {
        let state = ServerState::default();
        let x = Client::connect(&state);
        let y = Client::connect(&state);

        x.join(&state, "abc", "alice");
        assert_eq!(
            x.events(),
            vec![JsonServerEvent::RoomJoined {
                room_id: RoomId::from("abc"),
                connection_ref: x.id,
                user_ids: vec![],
            }]
        );

        y.join(&state, "abc", "bob");
        assert_eq!(
            x.events(),
            vec![JsonServerEvent::UserJoined {
                user_id: UserId::from("bob"),
                connection_ref: y.id,
            }]
        );
        assert_eq!(
            y.events(),
            vec![JsonServerEvent::RoomJoined {
                room_id: RoomId::from("abc"),
                connection_ref: y.id,
                user_ids: vec![UserId::from("alice")],
            }]
        );
    }

    #[test]
    fn join_without_user_id_uses_connection_id() {
        let state = ServerState::default();
        let x = Client::connect(&state);

        handle_request(
            &state,
            x.id,
            ClientRequest::JoinRoom {
                room_id: RoomId::from("abc"),
                user_id: None,
            },
        )
        .unwrap();

        let members = state.members_of(&RoomId::from("abc"));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, UserId::from(x.id));
    }

    #[test]
    fn untargeted_offer_reaches_everyone_but_sender() {
        let state = ServerState::default();
        let (a, b, c) = room_of_three(&state);

        handle_request(&state, a.id, offer("abc", None)).unwrap();

        assert!(a.events().is_empty());
        assert_eq!(b.events(), vec![offer_received("alice")]);
        assert_eq!(c.events(), vec![offer_received("alice")]);
    }

    #[test]
    fn targeted_offer_reaches_only_target() {
        let state = ServerState::default();
        let (a, b, c) = room_of_three(&state);

        handle_request(&state, a.id, offer("abc", Some("bob"))).unwrap();

        assert!(a.events().is_empty());
        assert_eq!(b.events(), vec![offer_received("alice")]);
        assert!(c.events().is_empty());
    }

    #[test]
    fn departed_target_is_silently_dropped() {
        let state = ServerState::default();
        let (a, b, c) = room_of_three(&state);
        handle_disconnect(&state, b.id);
        c.outbox.drain();
        a.outbox.drain();

        handle_request(&state, a.id, offer("abc", Some("bob"))).unwrap();

        assert!(a.events().is_empty());
        assert!(c.events().is_empty());
    }

    #[test]
    fn signal_to_unknown_room_is_dropped() {
        let state = ServerState::default();
        let (a, b, _c) = room_of_three(&state);

        handle_request(&state, a.id, offer("nowhere", None)).unwrap();

        assert!(b.events().is_empty());
        assert_eq!(state.room_count(), 1);
    }

    #[test]
    fn signal_from_non_member_is_dropped() {
        let state = ServerState::default();
        let (_a, b, c) = room_of_three(&state);
        let outsider = Client::connect(&state);

        handle_request(&state, outsider.id, offer("abc", None)).unwrap();

        assert!(b.events().is_empty());
        assert!(c.events().is_empty());
    }

    #[test]
    fn empty_room_id_is_malformed() {
        let state = ServerState::default();
        let a = Client::connect(&state);

        let result = handle_request(&state, a.id, offer("", None));

        assert!(matches!(result, Err(ClientRequestError::Malformed(_))));
        assert_eq!(state.room_count(), 0);
    }

    #[test]
    fn answer_and_candidates_are_symmetric() {
        let state = ServerState::default();
        let (a, b, c) = room_of_three(&state);
        let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMid": "0"});

        handle_request(
            &state,
            b.id,
            ClientRequest::Answer {
                room_id: RoomId::from("abc"),
                answer: json!({"type": "answer"}),
                target_user_id: Some(UserId::from("alice")),
            },
        )
        .unwrap();
        handle_request(
            &state,
            b.id,
            ClientRequest::IceCandidate {
                room_id: RoomId::from("abc"),
                candidate: candidate.clone(),
                target_user_id: None,
            },
        )
        .unwrap();

        assert_eq!(
            a.events(),
            vec![
                JsonServerEvent::AnswerReceived {
                    answer: json!({"type": "answer"}),
                    from_user_id: UserId::from("bob"),
                },
                JsonServerEvent::IceCandidateReceived {
                    candidate: candidate.clone(),
                    from_user_id: UserId::from("bob"),
                },
            ]
        );
        assert_eq!(
            c.events(),
            vec![JsonServerEvent::IceCandidateReceived {
                candidate,
                from_user_id: UserId::from("bob"),
            }]
        );
        assert!(b.events().is_empty());
    }

    #[test]
    fn relay_preserves_order_per_sender() {
        let state = ServerState::default();
        let (a, b, _c) = room_of_three(&state);

        for i in 0..10 {
            handle_request(
                &state,
                a.id,
                ClientRequest::IceCandidate {
                    room_id: RoomId::from("abc"),
                    candidate: json!(i),
                    target_user_id: Some(UserId::from("bob")),
                },
            )
            .unwrap();
        }

        let received: Vec<Value> = b
            .events()
            .into_iter()
            .map(|event| match event {
                JsonServerEvent::IceCandidateReceived { candidate, .. } => candidate,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(received, (0..10).map(|i| json!(i)).collect::<Vec<_>>());
    }

    #[test]
    fn repeated_join_is_not_announced_again() {
        let state = ServerState::default();
        let a = Client::connect(&state);
        let b = Client::connect(&state);
        b.join(&state, "abc", "bob");
        a.join(&state, "abc", "alice");
        b.outbox.drain();
        a.outbox.drain();

        a.join(&state, "abc", "alice");

        assert!(b.events().is_empty());
        assert_eq!(
            a.events(),
            vec![JsonServerEvent::RoomJoined {
                room_id: RoomId::from("abc"),
                connection_ref: a.id,
                user_ids: vec![UserId::from("bob")],
            }]
        );

        handle_disconnect(&state, a.id);
        assert_eq!(
            b.events(),
            vec![JsonServerEvent::UserLeft {
                user_id: UserId::from("alice"),
            }]
        );
    }

    #[test]
    fn join_under_new_user_id_retires_old_identity() {
        let state = ServerState::default();
        let a = Client::connect(&state);
        let b = Client::connect(&state);
        b.join(&state, "abc", "bob");
        a.join(&state, "abc", "alice");
        b.outbox.drain();

        a.join(&state, "abc", "alice-2");

        assert_eq!(
            b.events(),
            vec![
                JsonServerEvent::UserLeft {
                    user_id: UserId::from("alice"),
                },
                JsonServerEvent::UserJoined {
                    user_id: UserId::from("alice-2"),
                    connection_ref: a.id,
                },
            ]
        );
        assert_eq!(state.members_of(&RoomId::from("abc")).len(), 2);
        assert!(state.is_consistent());
    }

    #[test]
    fn disconnect_notifies_remaining_member() {
        let state = ServerState::default();
        let a = Client::connect(&state);
        let b = Client::connect(&state);
        a.join(&state, "abc", "alice");
        b.join(&state, "abc", "bob");
        a.outbox.drain();
        b.outbox.drain();

        handle_disconnect(&state, a.id);

        assert_eq!(
            b.events(),
            vec![JsonServerEvent::UserLeft {
                user_id: UserId::from("alice"),
            }]
        );
        let members = state.members_of(&RoomId::from("abc"));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, UserId::from("bob"));
        assert!(a.outbox.is_closed());
        assert!(state.is_consistent());
    }

    #[test]
    fn disconnect_of_last_member_removes_room() {
        let state = ServerState::default();
        let a = Client::connect(&state);
        a.join(&state, "abc", "alice");

        handle_disconnect(&state, a.id);
        handle_disconnect(&state, a.id);

        assert!(state.members_of(&RoomId::from("abc")).is_empty());
        assert_eq!(state.room_count(), 0);
        assert_eq!(state.connection_count(), 0);

        let b = Client::connect(&state);
        b.join(&state, "abc", "bob");
        assert_eq!(
            b.events(),
            vec![JsonServerEvent::RoomJoined {
                room_id: RoomId::from("abc"),
                connection_ref: b.id,
                user_ids: vec![],
            }]
        );
    }

    #[test]
    fn slow_peer_does_not_block_others() {
        let state = ServerState::new(2);
        let (a, b, c) = room_of_three(&state);

        for i in 0..5 {
            handle_request(
                &state,
                a.id,
                ClientRequest::Offer {
                    room_id: RoomId::from("abc"),
                    offer: json!(i),
                    target_user_id: None,
                },
            )
            .unwrap();
            // c keeps up, b never reads
            assert_eq!(c.events().len(), 1);
        }

        assert_eq!(b.outbox.len(), 2);
    }
}
