//! Software adaptive-bitrate loader seam.
//!
//! When the platform cannot play a segmented manifest natively, a
//! software loader (an hls.js-class component) sits between the manifest
//! and the element. The engine only needs its lifecycle and the three
//! recovery levers below; everything else is the loader's business.

use url::Url;

use crate::player::media::MediaElement;

/// Classification of a stream error, mirroring the usual ABR loader
/// taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Segment or manifest fetch failed; the session is salvageable by
    /// resuming the load.
    Network,
    /// Demux/decode trouble; the loader can attempt internal recovery.
    Media,
    /// Anything else. Fatal ones end the adaptive session.
    Other,
}

/// An error reported by the adaptive loader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} stream error (fatal: {fatal}): {detail}")]
pub struct StreamError {
    pub kind: StreamErrorKind,
    pub fatal: bool,
    pub detail: String,
}

impl StreamError {
    pub fn fatal(kind: StreamErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            detail: detail.into(),
        }
    }

    pub fn recoverable(
        kind: StreamErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            fatal: false,
            detail: detail.into(),
        }
    }
}

/// Lifecycle contract for a software ABR loader.
pub trait AdaptiveLoader: Send {
    /// Bind the loader to the element and start fetching the manifest.
    fn attach(
        &mut self,
        element: &mut dyn MediaElement,
        manifest: &Url,
    ) -> Result<(), StreamError>;

    /// Resume loading after a fatal network error.
    fn start_load(&mut self);

    /// Attempt internal recovery after a fatal media error.
    fn recover_media_error(&mut self);

    /// Tear the loader down; the element keeps whatever source it has.
    fn destroy(&mut self);
}

/// Constructor for loaders, present only on runtimes that support one.
pub type LoaderFactory = Box<dyn Fn() -> Box<dyn AdaptiveLoader> + Send>;

/// Whether a source URL is a segmented manifest rather than a
/// progressive file.
pub fn is_manifest(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".m3u8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_detection_is_case_insensitive_and_path_based() {
        let hls = Url::parse("https://cdn.example/v/movie.M3U8?auth=1")
            .expect("url");
        assert!(is_manifest(&hls));

        let mp4 =
            Url::parse("https://cdn.example/v/movie.mp4").expect("url");
        assert!(!is_manifest(&mp4));

        // A query string mentioning m3u8 is not a manifest.
        let tricky = Url::parse("https://cdn.example/v/movie.mp4?src=x.m3u8")
            .expect("url");
        assert!(!is_manifest(&tricky));
    }
}
