//! Client for the external crypto service
//!
//! When `ENABLE_ENCRYPT_DECRYPT_FEATURE` is on, the service asks the crypto
//! service for a key pair at `POST {CRYPTO_BASE_URL}{CRYPTO_SERVICE_URL}`
//! with a fresh UUID as the correlation handle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{CryptoServiceConfig, EncryptionConfig};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Crypto service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Crypto service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Encryption feature is disabled")]
    Disabled,
}

#[derive(Debug, Serialize)]
struct KeyRequest {
    uuid: String,
}

/// Key material returned by the crypto service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyResponse {
    /// Correlation handle sent with the request
    #[serde(skip)]
    pub uuid: String,
    #[serde(flatten)]
    pub body: serde_json::Map<String, Value>,
}

#[derive(Clone)]
pub struct CryptoClient {
    http: reqwest::Client,
    endpoint: String,
    enabled: bool,
}

impl CryptoClient {
    pub fn new(
        http: reqwest::Client,
        service: &CryptoServiceConfig,
        encryption: &EncryptionConfig,
    ) -> Self {
        Self {
            http,
            endpoint: service.endpoint(),
            enabled: encryption.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requests a key pair for a new UUID
    pub async fn request_keys(&self) -> Result<KeyResponse, CryptoError> {
        if !self.enabled {
            return Err(CryptoError::Disabled);
        }

        let uuid = Uuid::new_v4().to_string();
        tracing::debug!(endpoint = %self.endpoint, %uuid, "Requesting keys from crypto service");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&KeyRequest { uuid: uuid.clone() })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CryptoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut keys: KeyResponse = response.json().await?;
        keys.uuid = uuid;
        Ok(keys)
    }
}
