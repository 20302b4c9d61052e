pub mod rooms;
pub mod router;

pub use rooms::{CallRole, JoinError, JoinOutcome, PeerState, RoomRegistry};
pub use router::SignalingRouter;
