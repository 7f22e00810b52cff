//! Error type shared by the credential, ARM client and handler layers

use serde::Deserialize;

/// Result alias used throughout the library
pub type Result<T, E = AzureError> = std::result::Result<T, E>;

/// Any failure while talking to Azure or reshaping its response
#[derive(Debug, thiserror::Error)]
pub enum AzureError {
    /// No credential source could produce a token
    #[error("credential unavailable: {0}")]
    Credential(String),

    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Azure answered with a non-success status
    #[error("({code}) {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but lacks data the caller relies on
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Caller supplied an unusable argument
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AzureError {
    /// HTTP status a strict caller would want to see for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AzureError::Credential(_) => 401,
            AzureError::Http(e) if e.is_timeout() => 504,
            AzureError::Http(_) => 502,
            AzureError::Api { status, .. } => *status,
            AzureError::Decode(_) | AzureError::UnexpectedResponse(_) | AzureError::Url(_) => 502,
            AzureError::InvalidRequest(_) => 400,
        }
    }

    /// Build an API error from a failed ARM response body
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: Detail,
        }

        #[derive(Deserialize)]
        struct Detail {
            #[serde(default)]
            code: String,
            #[serde(default)]
            message: String,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => AzureError::Api {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => AzureError::Api {
                status,
                code: format!("HTTP{}", status),
                message: body.trim().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_parses_arm_envelope() {
        let body = r#"{"error":{"code":"AuthorizationFailed","message":"The client does not have authorization"}}"#;
        let err = AzureError::from_response(403, body);

        assert_eq!(
            err.to_string(),
            "(AuthorizationFailed) The client does not have authorization"
        );
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_from_response_falls_back_to_raw_body() {
        let err = AzureError::from_response(500, "upstream exploded\n");

        match err {
            AzureError::Api { code, message, .. } => {
                assert_eq!(code, "HTTP500");
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_request_maps_to_bad_request() {
        let err = AzureError::InvalidRequest("lookback_days must be at least 1".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.to_string(),
            "invalid request: lookback_days must be at least 1"
        );
    }
}
