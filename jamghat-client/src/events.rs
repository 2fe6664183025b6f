//! Party event delivery.
//!
//! Observers are supplied when the session is constructed, so the full
//! contract is visible at the call site instead of being wired up through
//! mutable callback fields after the fact. Every method has a no-op
//! default; implement the ones the shell cares about.

use jamghat_model::{ChatMessage, PartyMember, UserId};

/// Receiver for everything a [`crate::session::PartySession`] observes.
///
/// Callbacks fire on the session's polling tasks. Implementations should
/// hand work off quickly (e.g. into a UI channel) rather than block.
pub trait PartyObserver: Send + Sync {
    /// The host's position diverged beyond the drift tolerance: hard-seek
    /// to `current_time` and match `is_playing`.
    fn playback_synced(&self, _current_time: f64, _is_playing: bool) {}

    /// Host resumed playback without a meaningful position change.
    fn played(&self) {}

    /// Host paused playback without a meaningful position change.
    fn paused(&self) {}

    fn member_joined(&self, _member: &PartyMember) {}

    fn member_left(&self, _user_id: &UserId) {}

    /// One call per new chat message, in arrival order.
    fn chat_message(&self, _message: &ChatMessage) {}

    /// The party expired or was deleted; local state is already cleared.
    fn party_closed(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PartyObserver for NoopObserver {}
