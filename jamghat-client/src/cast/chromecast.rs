//! Chromecast output via DIAL application launch.
//!
//! Discovery hands us the device's DIAL application endpoint; launching
//! the default media receiver with a payload naming the stream starts
//! playback, and deleting the running app stops it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::cast::{
    CastDeviceDescriptor, CastDeviceKind, CastError, CastMedia, CastTarget,
};

/// The generic media receiver application.
const DEFAULT_RECEIVER_APP_ID: &str = "CC1AD845";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct ChromecastTarget {
    device: CastDeviceDescriptor,
    http_client: Client,
    receiver_app_id: String,
}

impl ChromecastTarget {
    pub fn new(device: CastDeviceDescriptor) -> Self {
        Self {
            device,
            http_client: Client::new(),
            receiver_app_id: DEFAULT_RECEIVER_APP_ID.to_string(),
        }
    }

    fn app_endpoint(&self) -> String {
        format!("{}apps/{}", self.device.control_url, self.receiver_app_id)
    }
}

#[async_trait]
impl CastTarget for ChromecastTarget {
    fn kind(&self) -> CastDeviceKind {
        CastDeviceKind::Chromecast
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }

    async fn cast(&self, media: &CastMedia) -> Result<bool, CastError> {
        let payload = json!({
            "media": {
                "contentId": media.url.to_string(),
                "contentType": "video/mp4",
                "metadata": {
                    "title": media.title,
                    "subtitle": media.description,
                    "images": media.poster_url.as_ref()
                        .map(|p| vec![p.to_string()])
                        .unwrap_or_default(),
                },
                "duration": media.duration,
            },
            "currentTime": 0,
        });

        debug!(device = %self.device.name, "launching receiver app");
        let response = self
            .http_client
            .post(self.app_endpoint())
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn stop(&self) -> Result<(), CastError> {
        let response = self
            .http_client
            .delete(format!("{}/run", self.app_endpoint()))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status().is_success()
            || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            // NOT_FOUND: the app already exited; stopped either way.
            Ok(())
        } else {
            Err(CastError::Rejected(format!(
                "receiver refused stop ({})",
                response.status()
            )))
        }
    }
}
