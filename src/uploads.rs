//! Document intake and upload.
//!
//! Multipart file parts are spooled to temporary files as they stream in, then
//! pushed to object storage one document slot at a time. A spool file is removed
//! when its `SpooledFile` is dropped, on every exit path.

use crate::errors::{AppError, ResultExt};
use crate::models::{ClientInput, DocumentUrls};
use crate::object_store::ObjectStore;
use crate::schema::DocumentSlot;
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Content type recorded for documents uploaded without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Lifetime of the read URLs stored on client records.
pub const READ_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Storage namespace holding one client's documents.
pub fn client_namespace(client_id: &str) -> String {
    format!("clients/{}", client_id)
}

/// Storage name of an uploaded document: `{namespace}/{doc column}-{millis}-{filename}`.
pub fn blob_name(namespace: &str, slot: DocumentSlot, timestamp_ms: i64, original_name: &str) -> String {
    format!(
        "{}/{}-{}-{}",
        namespace,
        slot.doc_column(),
        timestamp_ms,
        original_name
    )
}

/// Reduces a client-supplied filename to its last path component.
pub fn base_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "document".to_string()
    } else {
        base.to_string()
    }
}

// ============ Spool Files ============

/// A temporary on-disk copy of an uploaded file.
#[derive(Debug)]
pub struct SpooledFile {
    path: Option<TempPath>,
}

impl SpooledFile {
    /// Creates an empty spool file in `dir` and returns it with a writable handle.
    pub fn create_in(dir: &Path) -> io::Result<(SpooledFile, tokio::fs::File)> {
        let (file, path) = tempfile::Builder::new()
            .prefix("client-upload-")
            .tempfile_in(dir)?
            .into_parts();
        Ok((
            SpooledFile { path: Some(path) },
            tokio::fs::File::from_std(file),
        ))
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(self.path()).await.map(Bytes::from)
    }
}

impl Drop for SpooledFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => tracing::trace!("Removed spooled upload {}", shown),
                Err(e) => tracing::warn!("Failed to remove spooled upload {}: {}", shown, e),
            }
        }
    }
}

/// A file received with a request, waiting to be stored.
#[derive(Debug)]
pub struct UploadedFile {
    /// Form field the file arrived under; matched against document columns.
    pub field_name: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size: u64,
    spool: SpooledFile,
}

impl UploadedFile {
    /// Spools an in-memory file; used by callers that already hold the bytes.
    pub async fn from_bytes(
        spool_dir: &Path,
        field_name: &str,
        original_name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> io::Result<UploadedFile> {
        let (spool, mut file) = SpooledFile::create_in(spool_dir)?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(UploadedFile {
            field_name: field_name.to_string(),
            original_name: base_file_name(original_name),
            content_type: content_type.map(str::to_string),
            size: data.len() as u64,
            spool,
        })
    }

    /// Content type to store the file with.
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn spool_path(&self) -> &Path {
        self.spool.path()
    }

    pub async fn read(&self) -> io::Result<Bytes> {
        self.spool.read().await
    }

    /// Removes the local copy now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

// ============ Multipart Intake ============

/// Text fields and spooled files from one multipart request.
#[derive(Debug, Default)]
pub struct ClientForm {
    pub input: ClientInput,
    pub files: Vec<UploadedFile>,
}

impl ClientForm {
    pub fn has_document(&self, slot: DocumentSlot) -> bool {
        self.files.iter().any(|f| f.field_name == slot.doc_column())
    }
}

/// Reads a multipart body, spooling parts that carry a filename into `spool_dir`.
///
/// Parts with an empty filename carry no document and are discarded.
///
/// If reading fails part-way, files spooled so far are removed as the partial
/// form is dropped.
pub async fn read_client_form(
    mut multipart: Multipart,
    spool_dir: &Path,
) -> Result<ClientForm, AppError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut files = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let file_name = field.file_name().map(|n| n.trim().to_string());
        match file_name {
            // A file input left empty still sends a part with `filename=""`
            Some(file_name) if file_name.is_empty() => {
                while field
                    .chunk()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?
                    .is_some()
                {}
                tracing::debug!("Skipping empty file input '{}'", name);
            }
            Some(file_name) => {
                let original_name = base_file_name(&file_name);
                let content_type = field.content_type().map(str::to_string);
                let (spool, mut file) = SpooledFile::create_in(spool_dir)?;
                let mut size = 0u64;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?
                {
                    file.write_all(&chunk).await?;
                    size += chunk.len() as u64;
                }
                file.flush().await?;

                tracing::debug!(
                    "Spooled upload '{}' for field '{}' ({} bytes)",
                    original_name,
                    name,
                    size
                );
                files.push(UploadedFile {
                    field_name: name,
                    original_name,
                    content_type,
                    size,
                    spool,
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
                pairs.push((name, text));
            }
        }
    }

    Ok(ClientForm {
        input: ClientInput::from_pairs(pairs),
        files,
    })
}

// ============ Upload Adapter ============

/// Stores client documents and returns their read URLs.
#[derive(Clone)]
pub struct DocumentUploader {
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl DocumentUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            url_ttl: READ_URL_TTL,
        }
    }

    /// Uploads at most one file per document slot into `namespace`.
    ///
    /// Slots without a matching file are absent from the result. The first
    /// failed upload aborts the call. Every spooled file, uploaded or not, is
    /// removed before this returns.
    pub async fn upload_documents(
        &self,
        mut files: Vec<UploadedFile>,
        namespace: &str,
    ) -> Result<DocumentUrls, AppError> {
        let mut urls = DocumentUrls::new();

        for slot in DocumentSlot::ALL {
            let Some(pos) = files.iter().position(|f| f.field_name == slot.doc_column()) else {
                continue;
            };
            let file = files.remove(pos);
            let url = self.upload_one(slot, file, namespace).await?;
            urls.insert(slot, url);
        }

        if !files.is_empty() {
            tracing::debug!(
                "Discarding {} upload(s) that match no document slot",
                files.len()
            );
        }

        Ok(urls)
    }

    async fn upload_one(
        &self,
        slot: DocumentSlot,
        file: UploadedFile,
        namespace: &str,
    ) -> Result<String, AppError> {
        let name = blob_name(
            namespace,
            slot,
            Utc::now().timestamp_millis(),
            &file.original_name,
        );

        let stored = async {
            let body = file.read().await.map_err(|e| {
                AppError::UploadError(format!("Failed to read spooled upload: {}", e))
            })?;
            self.store.put(&name, body, file.content_type()).await
        }
        .await;
        file.release();
        stored.with_context(|| format!("Uploading {}", slot.doc_column()))?;

        let url = self.store.signed_read_url(&name, self.url_ttl).await?;
        Ok(url.to_string())
    }
}
