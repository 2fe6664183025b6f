//! AirPlay output over the receiver's HTTP control protocol.
//!
//! AirPlay video receivers expose `/play` and `/stop` on their control
//! port; `/play` takes a `text/parameters` body naming the content
//! location and start position.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::cast::{
    CastDeviceDescriptor, CastDeviceKind, CastError, CastMedia, CastTarget,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct AirplayTarget {
    device: CastDeviceDescriptor,
    http_client: Client,
}

impl AirplayTarget {
    pub fn new(device: CastDeviceDescriptor) -> Self {
        Self {
            device,
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl CastTarget for AirplayTarget {
    fn kind(&self) -> CastDeviceKind {
        CastDeviceKind::Airplay
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }

    async fn cast(&self, media: &CastMedia) -> Result<bool, CastError> {
        let body = format!(
            "Content-Location: {}\nStart-Position: 0\n",
            media.url
        );

        debug!(device = %self.device.name, "requesting AirPlay playback");
        let response = self
            .http_client
            .post(format!("{}play", self.device.control_url))
            .header("Content-Type", "text/parameters")
            .body(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn stop(&self) -> Result<(), CastError> {
        let response = self
            .http_client
            .post(format!("{}stop", self.device.control_url))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CastError::Rejected(format!(
                "receiver refused stop ({})",
                response.status()
            )))
        }
    }
}
