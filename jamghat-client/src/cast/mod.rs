//! Casting bridge: hand the current media off to an external renderer.
//!
//! One trait per concern: a [`CastTarget`] knows how to start and stop
//! playback on one class of device, and the [`CastController`] owns the
//! "at most one active cast" rule. Adding a device class means adding a
//! target implementation, not growing a dispatch switch.

pub mod airplay;
pub mod chromecast;
pub mod dlna;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

pub use airplay::AirplayTarget;
pub use chromecast::ChromecastTarget;
pub use dlna::DlnaTarget;

/// Device classes the bridge can output to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastDeviceKind {
    Chromecast,
    Airplay,
    Dlna,
}

/// A discovered renderer and how to reach it.
#[derive(Debug, Clone)]
pub struct CastDeviceDescriptor {
    pub id: String,
    pub name: String,
    pub kind: CastDeviceKind,
    /// Device (or proxy) control endpoint.
    pub control_url: Url,
}

/// Media handed to a renderer.
#[derive(Debug, Clone)]
pub struct CastMedia {
    pub url: Url,
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<Url>,
    /// Seconds, when known.
    pub duration: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("device rejected the request: {0}")]
    Rejected(String),
}

/// One class of renderer.
///
/// `cast` resolves to `Ok(false)` when the device declines cleanly (busy,
/// unsupported media); errors are reserved for failures to communicate.
#[async_trait]
pub trait CastTarget: Send + Sync {
    fn kind(&self) -> CastDeviceKind;

    fn device_name(&self) -> &str;

    async fn cast(&self, media: &CastMedia) -> Result<bool, CastError>;

    async fn stop(&self) -> Result<(), CastError>;
}

/// Build the target implementation for a discovered device.
pub fn cast_target_for(
    device: CastDeviceDescriptor,
) -> Box<dyn CastTarget> {
    match device.kind {
        CastDeviceKind::Chromecast => {
            Box::new(ChromecastTarget::new(device))
        }
        CastDeviceKind::Airplay => Box::new(AirplayTarget::new(device)),
        CastDeviceKind::Dlna => Box::new(DlnaTarget::new(device)),
    }
}

/// Owns the single active cast.
#[derive(Default)]
pub struct CastController {
    active: Mutex<Option<Box<dyn CastTarget>>>,
}

impl std::fmt::Debug for CastController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastController").finish_non_exhaustive()
    }
}

impl CastController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start casting to `target`, replacing any active cast first.
    ///
    /// Returns whether the device accepted the media.
    pub async fn cast_to(
        &self,
        target: Box<dyn CastTarget>,
        media: &CastMedia,
    ) -> Result<bool, CastError> {
        self.stop_casting().await;

        info!(
            device = target.device_name(),
            kind = ?target.kind(),
            "starting cast"
        );
        match target.cast(media).await {
            Ok(true) => {
                *self.active.lock().await = Some(target);
                Ok(true)
            }
            Ok(false) => {
                info!(device = target.device_name(), "device declined cast");
                Ok(false)
            }
            Err(err) => {
                warn!(device = target.device_name(), "cast failed: {err}");
                Err(err)
            }
        }
    }

    /// Stop the active cast. Safe to call when nothing is casting.
    pub async fn stop_casting(&self) {
        let Some(target) = self.active.lock().await.take() else {
            return;
        };
        if let Err(err) = target.stop().await {
            warn!(
                device = target.device_name(),
                "failed to stop cast cleanly: {err}"
            );
        }
    }

    /// Kind of the active cast target, if any.
    pub async fn active_kind(&self) -> Option<CastDeviceKind> {
        self.active.lock().await.as_ref().map(|t| t.kind())
    }
}
