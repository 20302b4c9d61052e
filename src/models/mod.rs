pub mod identity;
pub mod message;

pub use identity::{PublicKeyRecord, UserRole};
pub use message::{DocumentRef, Message, MessageDto};
