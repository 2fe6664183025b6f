//! Watch-party synchronization server.
//!
//! Hosts the polling HTTP API that keeps party members on the same
//! playback position: party lifecycle, host-authoritative playback
//! snapshots, and chat. State lives in memory; parties expire after a
//! period of inactivity and are re-created on demand by clients.

pub mod errors;
pub mod handlers;
pub mod identity;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::build_app;
pub use state::AppState;
pub use store::{PartyStore, StoreConfig, StoreError};
