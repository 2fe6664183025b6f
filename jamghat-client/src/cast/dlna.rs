//! DLNA output through the platform's discovery/control proxy.
//!
//! SSDP discovery and SOAP control need a server on the local network;
//! clients talk to that proxy's plain HTTP API instead of speaking UPnP
//! themselves.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::cast::{
    CastDeviceDescriptor, CastDeviceKind, CastError, CastMedia, CastTarget,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct DlnaTarget {
    device: CastDeviceDescriptor,
    http_client: Client,
}

impl DlnaTarget {
    pub fn new(device: CastDeviceDescriptor) -> Self {
        Self {
            device,
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl CastTarget for DlnaTarget {
    fn kind(&self) -> CastDeviceKind {
        CastDeviceKind::Dlna
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }

    async fn cast(&self, media: &CastMedia) -> Result<bool, CastError> {
        let payload = json!({
            "deviceId": self.device.id,
            "mediaUrl": media.url.to_string(),
            "metadata": {
                "title": media.title,
                "description": media.description,
                "posterUrl": media.poster_url.as_ref().map(Url::to_string),
            },
        });

        debug!(device = %self.device.name, "casting via DLNA proxy");
        let response = self
            .http_client
            .post(format!("{}cast", self.device.control_url))
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn stop(&self) -> Result<(), CastError> {
        let response = self
            .http_client
            .post(format!("{}stop", self.device.control_url))
            .json(&json!({ "deviceId": self.device.id }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CastError::Rejected(format!(
                "proxy refused stop ({})",
                response.status()
            )))
        }
    }
}
