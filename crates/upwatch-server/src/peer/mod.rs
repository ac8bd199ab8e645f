//! Peer federation: the pairing handshake and the two best-effort push
//! notifications (liveness heartbeat, dispatch-health webhook).
//!
//! Federation is fire-and-forget — a missed push is a missed data point,
//! never an error requiring repair, and no reconciliation pass exists.

pub mod pairing;
pub mod push;

pub use pairing::{PairingManager, PairingResponse, PairingToken};
pub use push::{PeerAction, PeerNotifier};
