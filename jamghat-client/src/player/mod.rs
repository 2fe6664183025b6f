//! Playback engine: the state machine between a platform media surface
//! and the rest of the client.
//!
//! The engine never guesses at playback state. Play/pause are requests;
//! the state only flips when the element reports the transition through
//! its own event stream, so a rejected autoplay leaves the UI honest.
//! Seeking is the one locally authoritative operation and applies
//! optimistically.

pub mod adaptive;
pub mod engine;
pub mod media;

pub use adaptive::{
    AdaptiveLoader, LoaderFactory, StreamError, StreamErrorKind,
};
pub use engine::{
    EngineConfig, PlaybackEngine, PlaybackPhase, PlayerState, Quality,
    QualityVariants, SubtitleTrack,
};
pub use media::{CommandRejected, MediaElement, MediaEvent};
