//! Azure Blob Storage backend.
//!
//! Uploads use Put Blob authorized by a short-lived create/write service SAS,
//! and read links are blob service SAS URLs. Both are signed locally with the
//! account key, so issuing a read link never needs a round trip.

use crate::circuit_breaker::{create_storage_circuit_breaker, StorageCircuitBreaker};
use crate::errors::AppError;
use crate::object_store::ObjectStore;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the SAS string-to-sign layout corresponds to.
pub const SAS_VERSION: &str = "2022-11-02";

/// Lifetime, in minutes, of the SAS used to authorize a single upload.
const UPLOAD_SAS_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct AzureBlobConfig {
    pub account_name: String,
    /// Base64 account key, as shown in the Azure portal.
    pub account_key: String,
    pub container: String,
    /// Override for the blob endpoint (Azurite, private endpoints, tests).
    /// Defaults to `https://{account}.blob.core.windows.net`.
    pub endpoint: Option<String>,
}

/// Azure Blob Storage client for one container.
#[derive(Clone)]
pub struct AzureBlobStore {
    client: reqwest::Client,
    endpoint: Url,
    account_name: String,
    key: Vec<u8>,
    container: String,
    breaker: StorageCircuitBreaker,
}

impl AzureBlobStore {
    /// Creates a new `AzureBlobStore`.
    ///
    /// Fails if the account key is not valid base64 or the endpoint is not a URL.
    pub fn new(config: AzureBlobConfig) -> Result<Self, AppError> {
        let key = STANDARD.decode(config.account_key.trim()).map_err(|e| {
            AppError::InternalError(format!("Azure account key is not valid base64: {}", e))
        })?;

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", config.account_name));
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            AppError::InternalError(format!("Invalid blob endpoint '{}': {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create blob storage client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            account_name: config.account_name,
            key,
            container: config.container,
            breaker: create_storage_circuit_breaker(),
        })
    }

    /// Unsigned URL of a blob. Each `/`-separated segment of `name` is percent-encoded.
    pub fn blob_url(&self, name: &str) -> Result<Url, AppError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::InternalError("Blob endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(&self.container)
            .extend(name.split('/'));
        Ok(url)
    }

    /// Blob URL carrying a service SAS with `permissions` that expires at `expiry`.
    ///
    /// Deterministic for a given name, permission set, expiry and account key.
    pub fn signed_url_at(
        &self,
        name: &str,
        permissions: &str,
        expiry: DateTime<Utc>,
    ) -> Result<Url, AppError> {
        let expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let protocol = if self.endpoint.scheme() == "https" {
            "https"
        } else {
            "https,http"
        };
        let canonical_resource = format!("/blob/{}/{}/{}", self.account_name, self.container, name);

        // Field order is fixed by the service; empty lines are unused options.
        let string_to_sign = [
            permissions,
            "", // start
            expiry.as_str(),
            canonical_resource.as_str(),
            "", // stored access policy
            "", // ip range
            protocol,
            SAS_VERSION,
            "b", // resource: blob
            "",  // snapshot time
            "",  // encryption scope
            "",  // rscc
            "",  // rscd
            "",  // rsce
            "",  // rscl
            "",  // rsct
        ]
        .join("\n");

        let signature = self.sign(&string_to_sign)?;

        let mut url = self.blob_url(name)?;
        url.query_pairs_mut()
            .append_pair("sv", SAS_VERSION)
            .append_pair("se", &expiry)
            .append_pair("sr", "b")
            .append_pair("sp", permissions)
            .append_pair("spr", protocol)
            .append_pair("sig", &signature);
        Ok(url)
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::InternalError(format!("Invalid signing key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn put_blob(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), AppError> {
        let expiry = Utc::now() + chrono::Duration::minutes(UPLOAD_SAS_MINUTES);
        let url = self.signed_url_at(name, "cw", expiry)?;
        let size = body.len();

        tracing::debug!("Uploading blob '{}' ({} bytes, {})", name, size, content_type);

        let response = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", SAS_VERSION)
            .header("x-ms-blob-content-type", content_type)
            .header("x-ms-blob-content-disposition", "inline")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::UploadError(format!("Blob upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UploadError(format!(
                "Blob storage returned {} for '{}': {}",
                status, name, error_text
            )));
        }

        tracing::info!("Stored blob '{}' ({} bytes)", name, size);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), AppError> {
        match self.breaker.call(self.put_blob(name, body, content_type)).await {
            Ok(()) => Ok(()),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Blob storage circuit open; rejecting upload of '{}'", name);
                Err(AppError::UploadError(
                    "Blob storage temporarily unavailable".to_string(),
                ))
            }
        }
    }

    async fn signed_read_url(&self, name: &str, ttl: Duration) -> Result<Url, AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::InternalError(format!("Invalid URL lifetime: {}", e)))?;
        self.signed_url_at(name, "r", Utc::now() + ttl)
    }
}
