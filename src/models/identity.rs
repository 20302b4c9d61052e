use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side of a conversation pair an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Client,
    Professional,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Professional => "professional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Self::Client),
            "professional" => Some(Self::Professional),
            _ => None,
        }
    }
}

/// Directory projection of an identity: the public half of its box keypair.
/// The private half is held exclusively by the owning client device; this
/// service never stores or transports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub user_id: Uuid,
    pub role: UserRole,
    /// Hex-encoded X25519 public key (32 bytes).
    pub public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [UserRole::Client, UserRole::Professional] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("admin"), None);
    }
}
