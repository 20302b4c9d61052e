use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Attachment reference carried inside a message. The bytes live in the
/// upload collaborator's store; `path` is an opaque storage ref. Field names
/// are the upload middleware's, kept so existing clients parse unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub originalname: String,
    pub mimetype: String,
    pub path: String,
}

/// Message row as stored. Immutable once created except the two flags.
/// `ciphertext`/`nonce` are opaque hex produced at the sending edge; an
/// attachment-only message carries empty strings for both.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub ciphertext: String,
    pub nonce: String,
    pub documents: Json<Vec<DocumentRef>>,
    pub created_at: DateTime<Utc>,
    pub is_delivered: bool,
    pub is_read: bool,
}

/// Wire shape of a message, matching the contract deployed clients expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "senderId")]
    pub sender_id: Uuid,
    #[serde(rename = "receiverId")]
    pub receiver_id: Uuid,
    /// Hex ciphertext. Named `message` on the wire for client compatibility.
    pub message: String,
    pub nonce: String,
    pub documents: Vec<DocumentRef>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isDelivered")]
    pub is_delivered: bool,
    #[serde(rename = "isRead")]
    pub is_read: bool,
}

impl From<Message> for MessageDto {
    fn from(row: Message) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            message: row.ciphertext,
            nonce: row.nonce,
            documents: row.documents.0,
            created_at: row.created_at,
            is_delivered: row.is_delivered,
            is_read: row.is_read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dto_uses_legacy_wire_names() {
        let dto = MessageDto {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            message: "deadbeef".into(),
            nonce: "aa".into(),
            documents: vec![DocumentRef {
                originalname: "brief.pdf".into(),
                mimetype: "application/pdf".into(),
                path: "uploads/chat/brief.pdf".into(),
            }],
            created_at: Utc::now(),
            is_delivered: false,
            is_read: false,
        };

        let value = serde_json::to_value(&dto).unwrap();
        assert!(value.get("_id").is_some());
        assert!(value.get("senderId").is_some());
        assert!(value.get("isDelivered").is_some());
        assert_eq!(value["documents"][0]["originalname"], "brief.pdf");
    }
}
