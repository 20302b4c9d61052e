pub mod directory;
pub mod e2ee;
pub mod message_service;

pub use directory::{Directory, PgDirectory};
pub use message_service::{HistoryPage, MessageService};
