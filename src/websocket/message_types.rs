use crate::models::MessageDto;
use crate::signaling::CallRole;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Inbound WebSocket events from client to server.
///
/// One tagged variant per event kind, validated at the transport boundary
/// before any of it reaches the signaling router. SDP and ICE payloads stay
/// opaque JSON: the relay forwards them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join-meeting")]
    JoinMeeting {
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
    #[serde(rename = "offer")]
    Offer {
        offer: JsonValue,
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
    #[serde(rename = "answer")]
    Answer {
        answer: JsonValue,
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        candidate: JsonValue,
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
    #[serde(rename = "leave-meeting")]
    LeaveMeeting {
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
}

/// Outbound WebSocket events from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "newMessage")]
    NewMessage { message: MessageDto },
    #[serde(rename = "user-joined")]
    UserJoined {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    #[serde(rename = "role-assigned")]
    RoleAssigned { role: CallRole },
    #[serde(rename = "offer")]
    Offer { offer: JsonValue, from: Uuid },
    #[serde(rename = "answer")]
    Answer { answer: JsonValue, from: Uuid },
    #[serde(rename = "ice-candidate")]
    IceCandidate { candidate: JsonValue, from: Uuid },
    #[serde(rename = "user-left")]
    UserLeft {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
    /// Third join on a two-party room is rejected, not queued or ignored.
    #[serde(rename = "room-full")]
    RoomFull {
        #[serde(rename = "meetingId")]
        meeting_id: String,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        // Serialization of these variants cannot fail; fall back to an empty
        // object rather than poisoning a session on a bug.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
