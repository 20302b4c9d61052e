use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Relay-decided call role, deterministic by join order so both peers can
/// never believe they are the initiator (glare avoidance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
    Initiator,
    Receiver,
}

impl CallRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Receiver => "receiver",
        }
    }
}

/// Per-participant signaling state.
///
/// Initiator path: Joined -> AwaitingAnswer -> Connected.
/// Receiver path: AwaitingOffer -> AnswerSent -> Connected.
/// Either path ends at Ended on leave/disconnect. ICE candidates are
/// forwarded regardless of state (trickle semantics), so the states gate
/// nothing on the candidate path; they record handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Joined,
    AwaitingAnswer,
    AwaitingOffer,
    AnswerSent,
    Connected,
    Ended,
}

#[derive(Debug, Clone)]
struct RoomMember {
    user_id: Uuid,
    role: CallRole,
    state: PeerState,
}

#[derive(Debug, Default)]
struct Room {
    // Join order preserved; index 0 is the initiator.
    members: Vec<RoomMember>,
}

/// Outcome of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub role: CallRole,
    /// Members already present before this join.
    pub peers: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// Two-party cap reached. Rejected rather than queued or ignored.
    RoomFull,
    /// The user is already a member of this room.
    AlreadyJoined,
}

/// Room membership manager: tracks which users are in a call room and owns
/// role bookkeeping, because role depends on join order. Rooms are transient,
/// created on first join and destroyed when membership becomes empty; nothing
/// here survives the process.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to the room, creating it if absent. First member becomes
    /// the initiator, second the receiver; a third join is rejected and never
    /// reassigns existing roles.
    pub async fn join(&self, meeting_id: &str, user_id: Uuid) -> Result<JoinOutcome, JoinError> {
        let mut guard = self.rooms.write().await;
        let room = guard.entry(meeting_id.to_string()).or_default();

        if room.members.iter().any(|m| m.user_id == user_id) {
            return Err(JoinError::AlreadyJoined);
        }
        if room.members.len() >= 2 {
            return Err(JoinError::RoomFull);
        }

        let (role, state) = if room.members.is_empty() {
            (CallRole::Initiator, PeerState::Joined)
        } else {
            (CallRole::Receiver, PeerState::AwaitingOffer)
        };

        let peers = room.members.iter().map(|m| m.user_id).collect();
        room.members.push(RoomMember {
            user_id,
            role,
            state,
        });

        Ok(JoinOutcome { role, peers })
    }

    /// Remove `user_id` from the room. Returns the remaining members, or
    /// `None` when the user was not a member (or the room does not exist).
    /// An emptied room is destroyed.
    pub async fn leave(&self, meeting_id: &str, user_id: Uuid) -> Option<Vec<Uuid>> {
        let mut guard = self.rooms.write().await;
        let room = guard.get_mut(meeting_id)?;

        let before = room.members.len();
        room.members.retain(|m| m.user_id != user_id);
        if room.members.len() == before {
            return None;
        }

        let remaining: Vec<Uuid> = room.members.iter().map(|m| m.user_id).collect();
        if remaining.is_empty() {
            guard.remove(meeting_id);
        }
        Some(remaining)
    }

    /// Remove `user_id` from every room it is in (disconnect path). Returns
    /// `(meeting_id, remaining members)` per affected room.
    pub async fn leave_all(&self, user_id: Uuid) -> Vec<(String, Vec<Uuid>)> {
        let mut guard = self.rooms.write().await;
        let mut affected = Vec::new();

        for (meeting_id, room) in guard.iter_mut() {
            let before = room.members.len();
            room.members.retain(|m| m.user_id != user_id);
            if room.members.len() != before {
                affected.push((
                    meeting_id.clone(),
                    room.members.iter().map(|m| m.user_id).collect(),
                ));
            }
        }
        guard.retain(|_, room| !room.members.is_empty());

        affected
    }

    /// Role of `user_id` in the room, if a member.
    pub async fn role_of(&self, meeting_id: &str, user_id: Uuid) -> Option<CallRole> {
        let guard = self.rooms.read().await;
        guard
            .get(meeting_id)?
            .members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role)
    }

    /// Signaling state of `user_id` in the room, if a member.
    pub async fn state_of(&self, meeting_id: &str, user_id: Uuid) -> Option<PeerState> {
        let guard = self.rooms.read().await;
        guard
            .get(meeting_id)?
            .members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.state)
    }

    /// Record a handshake transition for `user_id`.
    pub async fn set_state(&self, meeting_id: &str, user_id: Uuid, state: PeerState) {
        let mut guard = self.rooms.write().await;
        if let Some(member) = guard
            .get_mut(meeting_id)
            .and_then(|r| r.members.iter_mut().find(|m| m.user_id == user_id))
        {
            member.state = state;
        }
    }

    /// Members of the room other than `except`. `None` for an unknown room.
    pub async fn members_except(&self, meeting_id: &str, except: Uuid) -> Option<Vec<Uuid>> {
        let guard = self.rooms.read().await;
        Some(
            guard
                .get(meeting_id)?
                .members
                .iter()
                .filter(|m| m.user_id != except)
                .map(|m| m.user_id)
                .collect(),
        )
    }

    pub async fn room_exists(&self, meeting_id: &str) -> bool {
        self.rooms.read().await.contains_key(meeting_id)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
