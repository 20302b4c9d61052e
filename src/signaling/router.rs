use crate::signaling::rooms::{CallRole, JoinError, PeerState, RoomRegistry};
use crate::websocket::message_types::ServerEvent;
use crate::websocket::ConnectionRegistry;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Forwards WebRTC handshake events between the two members of a room.
///
/// Pure pass-through: payloads are never inspected, persisted or reordered,
/// and delivery is fire-and-forget at-most-once. Events for unknown or
/// already-closed rooms are dropped and logged; they never fail a session.
#[derive(Clone)]
pub struct SignalingRouter {
    rooms: RoomRegistry,
    registry: ConnectionRegistry,
}

impl SignalingRouter {
    pub fn new(rooms: RoomRegistry, registry: ConnectionRegistry) -> Self {
        Self { rooms, registry }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Join a room: assign a role by join order, announce the newcomer to
    /// existing members and tell the newcomer its role. A third join gets
    /// `room-full` and nothing else.
    pub async fn join(&self, meeting_id: &str, user_id: Uuid) {
        match self.rooms.join(meeting_id, user_id).await {
            Ok(outcome) => {
                tracing::info!(%user_id, meeting_id, role = outcome.role.as_str(), "joined meeting");
                for peer in &outcome.peers {
                    self.push(*peer, ServerEvent::UserJoined { user_id }).await;
                }
                self.push(user_id, ServerEvent::RoleAssigned { role: outcome.role })
                    .await;
            }
            Err(JoinError::RoomFull) => {
                tracing::warn!(%user_id, meeting_id, "join rejected: room full");
                self.push(
                    user_id,
                    ServerEvent::RoomFull {
                        meeting_id: meeting_id.to_string(),
                    },
                )
                .await;
            }
            Err(JoinError::AlreadyJoined) => {
                // Duplicate join-meeting from a glitchy client; the role it
                // already holds stands. Re-send it so the client can recover.
                if let Some(role) = self.rooms.role_of(meeting_id, user_id).await {
                    tracing::debug!(%user_id, meeting_id, "duplicate join, re-sending role");
                    self.push(user_id, ServerEvent::RoleAssigned { role }).await;
                }
            }
        }
    }

    /// Forward an offer verbatim, tagged with the sender. Only meaningful
    /// from the initiator; anyone else's offer is dropped.
    pub async fn offer(&self, meeting_id: &str, from: Uuid, offer: JsonValue) {
        match self.rooms.role_of(meeting_id, from).await {
            Some(CallRole::Initiator) => {}
            Some(CallRole::Receiver) => {
                tracing::warn!(%from, meeting_id, "dropping offer from receiver");
                return;
            }
            None => {
                tracing::debug!(%from, meeting_id, "dropping offer for unknown room");
                return;
            }
        }

        let delivered = self
            .forward(meeting_id, from, ServerEvent::Offer { offer, from })
            .await;
        if delivered > 0 {
            self.rooms
                .set_state(meeting_id, from, PeerState::AwaitingAnswer)
                .await;
        }
    }

    /// Forward an answer from the receiver back to the initiator. On a
    /// successful forward both peers are considered connected; answer relay
    /// is the last handshake step the relay can witness.
    pub async fn answer(&self, meeting_id: &str, from: Uuid, answer: JsonValue) {
        match self.rooms.role_of(meeting_id, from).await {
            Some(CallRole::Receiver) => {}
            Some(CallRole::Initiator) => {
                tracing::warn!(%from, meeting_id, "dropping answer from initiator");
                return;
            }
            None => {
                tracing::debug!(%from, meeting_id, "dropping answer for unknown room");
                return;
            }
        }

        self.rooms
            .set_state(meeting_id, from, PeerState::AnswerSent)
            .await;

        let delivered = self
            .forward(meeting_id, from, ServerEvent::Answer { answer, from })
            .await;
        if delivered > 0 {
            self.rooms
                .set_state(meeting_id, from, PeerState::Connected)
                .await;
            if let Some(peers) = self.rooms.members_except(meeting_id, from).await {
                for peer in peers {
                    self.rooms
                        .set_state(meeting_id, peer, PeerState::Connected)
                        .await;
                }
            }
        }
    }

    /// Forward an ICE candidate to the other member regardless of handshake
    /// state. Candidates are order-insensitive and may arrive before or after
    /// offer/answer (trickle ICE); they are never rejected or buffered.
    pub async fn ice_candidate(&self, meeting_id: &str, from: Uuid, candidate: JsonValue) {
        if self.rooms.role_of(meeting_id, from).await.is_none() {
            tracing::debug!(%from, meeting_id, "dropping candidate for unknown room");
            return;
        }
        self.forward(meeting_id, from, ServerEvent::IceCandidate { candidate, from })
            .await;
    }

    /// Leave a room and tell the remaining member. Once this returns, no
    /// further signaling events are delivered to the departed participant for
    /// this room.
    pub async fn leave(&self, meeting_id: &str, user_id: Uuid) {
        match self.rooms.leave(meeting_id, user_id).await {
            Some(remaining) => {
                tracing::info!(%user_id, meeting_id, "left meeting");
                for peer in remaining {
                    self.rooms
                        .set_state(meeting_id, peer, PeerState::Ended)
                        .await;
                    self.push(peer, ServerEvent::UserLeft { user_id }).await;
                }
            }
            None => {
                tracing::debug!(%user_id, meeting_id, "leave for unknown room or non-member");
            }
        }
    }

    /// Disconnect path: sweep the user out of every room, broadcasting
    /// exactly one `user-left` per room it was in.
    pub async fn disconnect(&self, user_id: Uuid) {
        for (meeting_id, remaining) in self.rooms.leave_all(user_id).await {
            tracing::info!(%user_id, meeting_id, "left meeting on disconnect");
            for peer in remaining {
                self.rooms
                    .set_state(&meeting_id, peer, PeerState::Ended)
                    .await;
                self.push(peer, ServerEvent::UserLeft { user_id }).await;
            }
        }
    }

    /// Send `event` to every room member other than `from`. Returns how many
    /// channels accepted the payload.
    async fn forward(&self, meeting_id: &str, from: Uuid, event: ServerEvent) -> usize {
        let Some(peers) = self.rooms.members_except(meeting_id, from).await else {
            tracing::debug!(meeting_id, "dropping event for unknown room");
            return 0;
        };
        if peers.is_empty() {
            tracing::debug!(meeting_id, "no peers in room, dropping event");
            return 0;
        }

        let payload = event.to_json();
        let mut delivered = 0;
        for peer in peers {
            if self.registry.send_to(peer, payload.clone()).await {
                delivered += 1;
            }
        }
        delivered
    }

    async fn push(&self, user_id: Uuid, event: ServerEvent) {
        self.registry.send_to(user_id, event.to_json()).await;
    }
}
