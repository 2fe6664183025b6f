use tracing::{debug, warn};
use url::Url;

use crate::player::adaptive::{
    AdaptiveLoader, LoaderFactory, StreamError, StreamErrorKind, is_manifest,
};
use crate::player::media::{CommandRejected, MediaElement, MediaEvent};

/// Where the engine is in the playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

/// Rendition selection. Manual picks are recorded intent; the adaptive
/// loader's own bitrate logic governs what actually streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Auto,
    P360,
    P720,
    P1080,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleTrack {
    #[default]
    Off,
    Nepali,
    English,
}

/// Per-rendition progressive URLs, when the catalog provides them.
#[derive(Debug, Clone, Default)]
pub struct QualityVariants {
    pub p360: Option<Url>,
    pub p720: Option<Url>,
    pub p1080: Option<Url>,
}

/// Client-local player state. Derived from the element's event stream;
/// never the source of truth for party sync.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub phase: PlaybackPhase,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub quality: Quality,
    pub subtitle: SubtitleTrack,
    pub fullscreen: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            quality: Quality::Auto,
            subtitle: SubtitleTrack::Off,
            fullscreen: false,
        }
    }
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Known-good progressive file substituted when a source fails.
    pub fallback_url: Url,
}

/// Playback engine state machine.
///
/// Generic over the platform element so shells (and tests) keep direct
/// access to their concrete surface.
pub struct PlaybackEngine<E: MediaElement> {
    element: E,
    loader: Option<Box<dyn AdaptiveLoader>>,
    loader_factory: Option<LoaderFactory>,
    config: EngineConfig,
    state: PlayerState,
    source: Option<Url>,
    variants: Option<QualityVariants>,
    /// The fallback source is tried exactly once per load.
    fallback_applied: bool,
}

impl<E: MediaElement> std::fmt::Debug for PlaybackEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state)
            .field("source", &self.source)
            .field("has_loader", &self.loader.is_some())
            .field("fallback_applied", &self.fallback_applied)
            .finish_non_exhaustive()
    }
}

impl<E: MediaElement> PlaybackEngine<E> {
    /// `loader_factory` is `None` on runtimes without a software ABR
    /// loader; such runtimes rely on native support or the fallback.
    pub fn new(
        element: E,
        loader_factory: Option<LoaderFactory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            element,
            loader: None,
            loader_factory,
            config,
            state: PlayerState::default(),
            source: None,
            variants: None,
            fallback_applied: false,
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn has_adaptive_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Progressive rendition URLs supplied with the current source, for
    /// shells building a quality menu.
    pub fn variants(&self) -> Option<&QualityVariants> {
        self.variants.as_ref()
    }

    /// Load a source. Idempotent: reloading the current source is a
    /// no-op unless the previous attempt ended in `Error`.
    pub fn load(&mut self, source: &Url, variants: Option<QualityVariants>) {
        if self.source.as_ref() == Some(source)
            && !matches!(
                self.state.phase,
                PlaybackPhase::Idle | PlaybackPhase::Error
            )
        {
            debug!(%source, "source already loaded");
            return;
        }

        if let Some(mut loader) = self.loader.take() {
            loader.destroy();
        }
        self.source = Some(source.clone());
        self.variants = variants;
        self.fallback_applied = false;
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        self.state.phase = PlaybackPhase::Loading;

        if !is_manifest(source) {
            self.element.set_source(source);
            self.element.load();
            return;
        }

        if let Some(factory) = &self.loader_factory {
            let mut loader = factory();
            match loader.attach(&mut self.element, source) {
                Ok(()) => self.loader = Some(loader),
                Err(err) => {
                    warn!(%source, "adaptive attach failed: {err}");
                    self.fall_back_once();
                }
            }
        } else if self.element.supports_native_adaptive() {
            self.element.set_source(source);
            self.element.load();
        } else {
            // No adaptive path on this runtime; go straight to the
            // progressive fallback and spend the one retry on it.
            self.fallback_applied = true;
            let fallback = self.config.fallback_url.clone();
            self.element.set_source(&fallback);
            self.element.load();
        }
    }

    /// Request playback. `playing` only flips once the element confirms
    /// through its event stream; a rejection (autoplay policy) is
    /// returned to the caller and changes nothing.
    pub fn play(&mut self) -> Result<(), CommandRejected> {
        self.element.request_play()
    }

    pub fn pause(&mut self) {
        self.element.request_pause();
    }

    pub fn toggle_play(&mut self) -> Result<(), CommandRejected> {
        if self.state.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Seek, clamped to `[0, duration]`. Locally authoritative: the
    /// position updates immediately.
    pub fn seek(&mut self, seconds: f64) {
        let clamped = if self.state.duration > 0.0 {
            seconds.clamp(0.0, self.state.duration)
        } else {
            seconds.max(0.0)
        };
        self.element.set_position(clamped);
        self.state.current_time = clamped;
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.element.set_volume(volume);
        self.state.volume = volume;
    }

    pub fn toggle_mute(&mut self) {
        self.state.muted = !self.state.muted;
        self.element.set_muted(self.state.muted);
    }

    /// Record the selected rendition. Actual switching is the adaptive
    /// loader's job; progressive variants re-load on the next source
    /// change.
    pub fn set_quality(&mut self, quality: Quality) {
        self.state.quality = quality;
    }

    pub fn set_subtitle(&mut self, subtitle: SubtitleTrack) {
        self.state.subtitle = subtitle;
    }

    /// Request a fullscreen transition; state follows the element's
    /// change event, mirroring the play/pause contract.
    pub fn toggle_fullscreen(&mut self) -> Result<(), CommandRejected> {
        self.element.request_fullscreen(!self.state.fullscreen)
    }

    /// Feed an element event into the state machine.
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::MetadataLoaded { duration } => {
                self.state.duration = duration;
                if self.state.phase == PlaybackPhase::Loading {
                    self.state.phase = PlaybackPhase::Ready;
                }
            }
            MediaEvent::TimeUpdate { seconds } => {
                self.state.current_time = seconds;
            }
            MediaEvent::Play | MediaEvent::Playing => {
                if self.state.phase != PlaybackPhase::Error {
                    self.state.phase = PlaybackPhase::Playing;
                }
            }
            MediaEvent::Pause => {
                if !matches!(
                    self.state.phase,
                    PlaybackPhase::Error | PlaybackPhase::Ended
                ) {
                    self.state.phase = PlaybackPhase::Paused;
                }
            }
            MediaEvent::Ended => {
                self.state.phase = PlaybackPhase::Ended;
                if self.state.duration > 0.0 {
                    self.state.current_time = self.state.duration;
                }
            }
            MediaEvent::FullscreenChange { fullscreen } => {
                self.state.fullscreen = fullscreen;
            }
            MediaEvent::Failed { message } => {
                warn!("media element failed: {message}");
                self.fall_back_once();
            }
        }
    }

    /// Apply the adaptive recovery policy to a loader-reported error.
    pub fn handle_stream_error(&mut self, error: StreamError) {
        if !error.fatal {
            debug!("non-fatal stream error: {error}");
            return;
        }

        match error.kind {
            StreamErrorKind::Network => {
                warn!("fatal network stream error, resuming load: {error}");
                if let Some(loader) = &mut self.loader {
                    loader.start_load();
                }
            }
            StreamErrorKind::Media => {
                warn!("fatal media stream error, recovering: {error}");
                if let Some(loader) = &mut self.loader {
                    loader.recover_media_error();
                }
            }
            StreamErrorKind::Other => {
                warn!("unrecoverable stream error: {error}");
                self.fall_back_once();
            }
        }
    }

    /// Substitute the fallback source, once. A second failure is
    /// terminal.
    fn fall_back_once(&mut self) {
        if let Some(mut loader) = self.loader.take() {
            loader.destroy();
        }
        if self.fallback_applied {
            self.state.phase = PlaybackPhase::Error;
            return;
        }
        self.fallback_applied = true;
        let fallback = self.config.fallback_url.clone();
        warn!(%fallback, "substituting fallback source");
        self.element.set_source(&fallback);
        self.element.load();
        self.state.phase = PlaybackPhase::Loading;
    }
}
