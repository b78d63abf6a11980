//! Handing the finished strip to the guest: a local file or an email relay.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::config::{OutputFormat, RelayConfig};
use crate::error::{BoothError, Result};
use crate::strip::PhotoStrip;

pub const DOWNLOAD_PREFIX: &str = "GOS_PhotoStrip_";

/// Sent as plain text so browsers skip the CORS preflight the relay cannot answer.
pub const RELAY_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// `GOS_PhotoStrip_<ISO-8601 with ':' and '.' replaced by '-'>.<ext>`
pub fn download_file_name(at: DateTime<Utc>, format: OutputFormat) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}{}.{}", DOWNLOAD_PREFIX, stamp, format.extension())
}

/// Write the strip into `dir` under its download name.
pub fn save_strip(strip: &PhotoStrip, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(download_file_name(at, strip.image().format()));
    std::fs::write(&path, strip.image().bytes())?;
    tracing::info!("Saved strip to {}", path.display());
    Ok(path)
}

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    email: &'a str,
    #[serde(rename = "pngDataUrl")]
    png_data_url: String,
}

/// Transport seam for the relay call.
pub trait RelayTransport: Send + Sync {
    /// POST `body` as [`RELAY_CONTENT_TYPE`]. Only transport failures are
    /// errors; the response is not consulted.
    fn post_text(&self, url: &str, body: &str) -> anyhow::Result<()>;
}

/// Blocking HTTP transport with a whole-request timeout.
pub struct HttpRelay {
    agent: ureq::Agent,
}

impl HttpRelay {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl RelayTransport for HttpRelay {
    fn post_text(&self, url: &str, body: &str) -> anyhow::Result<()> {
        match self
            .agent
            .post(url)
            .set("Content-Type", RELAY_CONTENT_TYPE)
            .send_string(body)
        {
            Ok(response) => {
                tracing::debug!("Relay answered {}", response.status());
                Ok(())
            }
            Err(ureq::Error::Status(code, _)) => {
                tracing::warn!("Relay answered {}, response ignored", code);
                Ok(())
            }
            Err(e) => Err(anyhow!("Relay request failed: {}", e)),
        }
    }
}

/// Emails strips through the configured relay endpoint.
pub struct EmailRelay {
    url: Option<String>,
    transport: Arc<dyn RelayTransport>,
    sending: Cell<bool>,
}

impl EmailRelay {
    pub fn new(url: Option<String>, transport: Arc<dyn RelayTransport>) -> Self {
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Self {
            url,
            transport,
            sending: Cell::new(false),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.url.clone(),
            Arc::new(HttpRelay::new(Duration::from_secs(config.timeout_secs))),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// True while a request is in flight; the send control stays disabled.
    pub fn is_sending(&self) -> bool {
        self.sending.get()
    }

    /// Submit `{ email, pngDataUrl }` to the relay. Inputs are checked before
    /// any network traffic. There is no automatic retry.
    pub async fn send(&self, email: &str, strip: Option<&PhotoStrip>) -> Result<()> {
        let url = self.url.clone().ok_or(BoothError::DeliveryMisconfigured)?;
        let email = email.trim();
        if email.is_empty() {
            return Err(BoothError::DeliveryInputMissing("recipient email"));
        }
        let strip = strip.ok_or(BoothError::DeliveryInputMissing("photo strip"))?;

        if self.sending.replace(true) {
            return Err(BoothError::DeliveryInFlight);
        }
        let _sending = SendingGuard(&self.sending);

        let body = serde_json::to_string(&RelayPayload {
            email,
            png_data_url: strip.image().to_data_url(),
        })
        .map_err(|e| BoothError::DeliveryTransport(e.to_string()))?;

        tracing::info!("Sending strip to {} ({} bytes)", email, body.len());
        let transport = Arc::clone(&self.transport);
        let outcome = tokio::task::spawn_blocking(move || transport.post_text(&url, &body)).await;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!("Email sent to {}", email);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!("Email failed: {:#}", e);
                Err(BoothError::DeliveryTransport(format!("{:#}", e)))
            }
            Err(e) => Err(BoothError::DeliveryTransport(e.to_string())),
        }
    }
}

struct SendingGuard<'a>(&'a Cell<bool>);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
