//! End-to-end encryption contract.
//!
//! Encryption and decryption execute at the edges; the relay only validates
//! envelope well-formedness and stores ciphertext+nonce unmodified. This
//! module is the reference implementation of the box construction clients
//! use (X25519 Diffie-Hellman -> HKDF-SHA256 -> AES-256-GCM with a fresh
//! random nonce per message), plus the boundary validation the send route
//! applies. Everything is hex on the wire.

use crate::error::AppError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

/// AES-GCM nonce length in bytes (24 hex chars on the wire).
pub const NONCE_LEN: usize = 12;
/// Minimum ciphertext length: the GCM tag alone.
pub const TAG_LEN: usize = 16;

/// Non-crashing placeholder a client renders when opening fails.
pub const DECRYPT_FAILED_PLACEHOLDER: &str = "[Decryption failed]";
/// Placeholder when the sender's public key cannot be looked up.
pub const MISSING_KEY_PLACEHOLDER: &str = "[Failed to decrypt: missing sender key]";

/// Long-term box keypair owned by one identity. The secret half lives on the
/// owning device only; the service persists nothing but `public_hex()`.
pub struct BoxKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl BoxKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, AppError> {
        let bytes = decode_key(secret_hex)?;
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

/// Ciphertext + nonce pair as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub ciphertext: String,
    pub nonce: String,
}

fn decode_key(key_hex: &str) -> Result<[u8; 32], AppError> {
    let bytes = hex::decode(key_hex)
        .map_err(|e| AppError::Encryption(format!("key hex decode: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| AppError::Encryption("key must be 32 bytes".into()))
}

/// Derive the shared authenticated-encryption key for one direction of a
/// pair. Commutative: sender-secret x receiver-public and receiver-secret x
/// sender-public produce the same key.
fn derive_box_key(secret: &StaticSecret, peer_public: &PublicKey) -> Result<[u8; 32], AppError> {
    let shared = secret.diffie_hellman(peer_public);
    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"comms box v1", &mut key)
        .map_err(|e| AppError::Encryption(format!("HKDF expand failed: {e}")))?;
    Ok(key)
}

/// Encrypt `plaintext` for `receiver_public_hex`. The nonce is generated
/// fresh and random for every call; reuse under one key pair breaks
/// confidentiality, so there is deliberately no way to supply one.
pub fn seal(
    plaintext: &str,
    receiver_public_hex: &str,
    sender_secret: &StaticSecret,
) -> Result<SealedEnvelope, AppError> {
    let receiver_public = PublicKey::from(decode_key(receiver_public_hex)?);
    let key = derive_box_key(sender_secret, &receiver_public)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| AppError::Internal)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| AppError::Encryption("seal failed".into()))?;

    Ok(SealedEnvelope {
        ciphertext: hex::encode(ciphertext),
        nonce: hex::encode(nonce_bytes),
    })
}

/// Decrypt an envelope received from `sender_public_hex`.
pub fn open(
    ciphertext_hex: &str,
    nonce_hex: &str,
    sender_public_hex: &str,
    receiver_secret: &StaticSecret,
) -> Result<String, AppError> {
    let sender_public = PublicKey::from(decode_key(sender_public_hex)?);
    let key = derive_box_key(receiver_secret, &sender_public)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| AppError::Internal)?;

    let ciphertext = hex::decode(ciphertext_hex)
        .map_err(|e| AppError::Encryption(format!("ciphertext hex decode: {e}")))?;
    let nonce_bytes = hex::decode(nonce_hex)
        .map_err(|e| AppError::Encryption(format!("nonce hex decode: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(AppError::Encryption("nonce must be 12 bytes".into()));
    }

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| AppError::Encryption("open failed".into()))?;

    String::from_utf8(plaintext).map_err(|e| AppError::Encryption(format!("invalid utf8: {e}")))
}

/// Client-side degradation: decryption failures render a placeholder, never
/// crash and never surface to the relay.
pub fn open_or_placeholder(
    ciphertext_hex: &str,
    nonce_hex: &str,
    sender_public_hex: Option<&str>,
    receiver_secret: &StaticSecret,
) -> String {
    let Some(sender_public_hex) = sender_public_hex else {
        return MISSING_KEY_PLACEHOLDER.to_string();
    };
    open(ciphertext_hex, nonce_hex, sender_public_hex, receiver_secret)
        .unwrap_or_else(|_| DECRYPT_FAILED_PLACEHOLDER.to_string())
}

/// Boundary validation the send route applies before anything is persisted.
///
/// A normal message carries non-empty hex ciphertext and a 12-byte hex
/// nonce. An attachment-only message carries empty strings for both, and
/// must then carry at least one document.
pub fn validate_envelope(
    ciphertext: &str,
    nonce: &str,
    has_documents: bool,
) -> Result<(), AppError> {
    if ciphertext.is_empty() {
        if !nonce.is_empty() {
            return Err(AppError::BadRequest(
                "nonce without ciphertext".into(),
            ));
        }
        if !has_documents {
            return Err(AppError::BadRequest(
                "message must carry ciphertext or documents".into(),
            ));
        }
        return Ok(());
    }

    let ciphertext_bytes = hex::decode(ciphertext)
        .map_err(|_| AppError::BadRequest("ciphertext is not valid hex".into()))?;
    if ciphertext_bytes.len() < TAG_LEN {
        return Err(AppError::BadRequest("ciphertext too short".into()));
    }

    let nonce_bytes =
        hex::decode(nonce).map_err(|_| AppError::BadRequest("nonce is not valid hex".into()))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(AppError::BadRequest(format!(
            "nonce must be {NONCE_LEN} bytes"
        )));
    }

    Ok(())
}

/// Sender-side plaintext cache, keyed by message id.
///
/// A sender cannot open its own ciphertext (it lacks the receiver's secret),
/// so the client keeps the plaintext it just sent for immediate display.
/// Edge concern only; never leaves the device.
#[derive(Default)]
pub struct SentPlaintextCache {
    entries: HashMap<Uuid, String>,
}

impl SentPlaintextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, message_id: Uuid, plaintext: String) {
        self.entries.insert(message_id, plaintext);
    }

    pub fn get(&self, message_id: Uuid) -> Option<&str> {
        self.entries.get(&message_id).map(String::as_str)
    }
}
