//! Seam to the upstream platform: who may talk to whom, and the public half
//! of each identity's keypair. The relay only ever consults this read-only
//! view; pair creation and key upload are upstream concerns.

use crate::error::AppError;
use crate::models::{PublicKeyRecord, UserRole};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether a persisted conversation pair links the two identities,
    /// regardless of direction.
    async fn pair_exists(&self, a: Uuid, b: Uuid) -> Result<bool, AppError>;

    /// Public key record for an identity, if the directory knows it.
    async fn public_key(&self, user_id: Uuid) -> Result<Option<PublicKeyRecord>, AppError>;
}

/// Postgres-backed directory projection.
pub struct PgDirectory {
    db: PgPool,
}

impl PgDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn pair_exists(&self, a: Uuid, b: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM conversation_pairs
                WHERE (client_id = $1 AND professional_id = $2)
                   OR (client_id = $2 AND professional_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn public_key(&self, user_id: Uuid) -> Result<Option<PublicKeyRecord>, AppError> {
        let row = sqlx::query("SELECT id, role, public_key FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.get("role");
        let role = UserRole::parse(&role)
            .ok_or_else(|| AppError::Database(format!("unknown role '{role}'")))?;

        Ok(Some(PublicKeyRecord {
            user_id: row.get("id"),
            role,
            public_key: row.get("public_key"),
        }))
    }
}

/// In-memory directory for tests and in-process harnesses.
#[derive(Default)]
pub struct StaticDirectory {
    pairs: Vec<(Uuid, Uuid)>,
    keys: Vec<PublicKeyRecord>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, client: Uuid, professional: Uuid) -> Self {
        self.pairs.push((client, professional));
        self
    }

    pub fn with_key(mut self, record: PublicKeyRecord) -> Self {
        self.keys.push(record);
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn pair_exists(&self, a: Uuid, b: Uuid) -> Result<bool, AppError> {
        Ok(self
            .pairs
            .iter()
            .any(|&(c, p)| (c == a && p == b) || (c == b && p == a)))
    }

    async fn public_key(&self, user_id: Uuid) -> Result<Option<PublicKeyRecord>, AppError> {
        Ok(self.keys.iter().find(|k| k.user_id == user_id).cloned())
    }
}
