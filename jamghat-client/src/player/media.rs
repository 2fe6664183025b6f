//! The platform media surface the engine drives.

use url::Url;

/// A playback command the platform refused.
///
/// The canonical case is an autoplay policy rejecting `play` before any
/// user gesture. Not an error state; the caller decides whether to
/// prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("playback command rejected: {reason}")]
pub struct CommandRejected {
    pub reason: String,
}

impl CommandRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Abstraction over the platform's media element.
///
/// Commands are requests; completed transitions come back through
/// [`MediaEvent`]s fed to the engine.
pub trait MediaElement: Send {
    fn set_source(&mut self, url: &Url);

    /// Begin loading the current source.
    fn load(&mut self);

    /// Request playback. May be refused (autoplay policy).
    fn request_play(&mut self) -> Result<(), CommandRejected>;

    fn request_pause(&mut self);

    fn set_position(&mut self, seconds: f64);

    /// Volume in `[0, 1]`.
    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    /// Request entering or leaving fullscreen presentation.
    fn request_fullscreen(&mut self, on: bool) -> Result<(), CommandRejected>;

    /// Whether the element plays adaptive manifests natively.
    fn supports_native_adaptive(&self) -> bool;
}

/// Events the media element reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Metadata is available; duration is known.
    MetadataLoaded { duration: f64 },
    /// Periodic position report during playback.
    TimeUpdate { seconds: f64 },
    /// Playback started (or resumed) for real.
    Play,
    /// Playback is advancing after a stall or seek.
    Playing,
    Pause,
    Ended,
    FullscreenChange { fullscreen: bool },
    /// The element failed to load or decode the current source.
    Failed { message: String },
}
