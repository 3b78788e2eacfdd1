//! # OCR Client
//!
//! Sends a label photo to the remote recognition service and turns its answer
//! into a [`ScanGuess`].
//!
//! ## Wire Format
//! ```text
//! POST <endpoint>
//! Authorization: Bearer <api_key>          (only when configured)
//! Content-Type: application/json
//!
//! { "image": "<raw base64, no data: prefix>" }
//!
//! 200 OK, either shape:
//!
//!   { "code": "8901234567890",             fields the service already
//!     "name": "Whole Milk 1L",             extracted; any may be missing
//!     "expiry_date": "2024-02-01" }        or null ("expiry" also accepted)
//!
//!   { "text": ["WHOLE MILK 1L",            raw recognised lines, parsed
//!              "8901234567890",            locally by
//!              "EXP 01/02/2024"] }         ScanGuess::from_text_lines
//! ```
//!
//! Any transport error, non-2xx status or unreadable body is
//! [`BillingError::OcrInvocationFailed`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture::ImagePayload;
use crate::config::OcrSettings;
use crate::error::{BillingError, BillingResult};
use tally_core::scan::parse_label_date;
use tally_core::ScanGuess;

#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Best-effort reading of one label.
    async fn recognize(&self, image: &ImagePayload) -> BillingResult<ScanGuess>;
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OcrResponse {
    Lines {
        text: Vec<String>,
    },
    Fields {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, alias = "expiry", alias = "expiryDate")]
        expiry_date: Option<String>,
    },
}

impl OcrResponse {
    fn into_guess(self) -> ScanGuess {
        match self {
            OcrResponse::Lines { text } => ScanGuess::from_text_lines(&text),
            OcrResponse::Fields {
                code,
                name,
                expiry_date,
            } => {
                let expiry = expiry_date.as_deref().and_then(|raw| {
                    let parsed = parse_label_date(raw);
                    if parsed.is_none() && !raw.trim().is_empty() {
                        warn!(expiry = %raw, "OCR returned an unreadable expiry date");
                    }
                    parsed
                });
                ScanGuess::new(code, name, expiry)
            }
        }
    }
}

/// [`OcrClient`] over HTTP.
pub struct HttpOcrClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpOcrClient {
    pub fn new(settings: &OcrSettings) -> BillingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| BillingError::Config(format!("OCR client: {}", e)))?;

        Ok(HttpOcrClient {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn recognize(&self, image: &ImagePayload) -> BillingResult<ScanGuess> {
        let encoded = image.to_base64();
        debug!(image = %image.label(), bytes = image.len(), "Sending image to OCR");

        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&OcrRequest { image: &encoded });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BillingError::OcrInvocationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BillingError::OcrInvocationFailed(format!("HTTP {}", status)));
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| BillingError::OcrInvocationFailed(format!("bad response: {}", e)))?;

        let guess = body.into_guess();
        debug!(
            image = %image.label(),
            code = ?guess.code,
            name = ?guess.name,
            expiry = ?guess.expiry_date,
            "OCR guess"
        );
        Ok(guess)
    }
}
