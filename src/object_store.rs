//! Object storage capability used for client documents.

use crate::errors::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

/// Storage backend for client documents.
///
/// Implementations store opaque bytes under a slash-separated name and hand
/// out time-limited, read-only links to them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `name`, replacing any existing object.
    ///
    /// Objects are served with `content_type` and an inline content
    /// disposition so browsers render rather than download them.
    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), AppError>;

    /// Issues a read-only URL for `name` valid for `ttl` from now.
    ///
    /// Generated locally; no request is made to the store.
    async fn signed_read_url(&self, name: &str, ttl: Duration) -> Result<Url, AppError>;
}
