use thiserror::Error;

use crate::convert::InvalidDateTime;

/// Outcome of probing the vendor with a candidate API key.
///
/// A key the vendor rejects is not an error here; the probe reports that as
/// `Ok(false)`. These variants cover the cases where no verdict was possible.
#[derive(Debug, Error)]
pub enum ApiKeyError {
    /// The key is missing or empty; no request is made for this case.
    #[error("API key is missing or empty")]
    InvalidApiKey,

    /// The vendor could not be reached, so the key remains unverified.
    #[error("Cannot connect to WeatherAPI.com: {0}")]
    CannotConnect(#[source] reqwest::Error),
}

/// A refresh attempt failed end to end.
///
/// Field-level parsing problems never show up here; they degrade to `None`
/// values inside the snapshot. This type is reserved for envelope-level
/// failures where no usable payload exists at all.
#[derive(Debug, Error)]
pub enum UpdateFailed {
    #[error("Failed to retrieve data: HTTP status={status}, reason={reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Failed to retrieve data: no decodable body was provided: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Failed to retrieve data: error={code}, message={message}")]
    VendorError { code: String, message: String },

    #[error("Failed to parse forecast: {0}")]
    InvalidDate(#[from] InvalidDateTime),

    #[error("Timeout invoking endpoint: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Error invoking endpoint: {0}")]
    Connect(#[source] reqwest::Error),
}

impl UpdateFailed {
    /// Split transport failures into timeout vs. everything else.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { UpdateFailed::Timeout(err) } else { UpdateFailed::Connect(err) }
    }
}
