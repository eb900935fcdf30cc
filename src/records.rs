use crate::client_store::ClientStore;
use crate::errors::AppError;
use crate::models::{ClientFields, ClientInput, ClientRecord, ClientSummary, DocumentUrls};
use crate::schema::DocumentSlot;
use crate::uploads::{client_namespace, DocumentUploader, UploadedFile};
use std::sync::Arc;

fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// Checks a create request before anything is written.
///
/// Required fields are checked first, then that every document slot has a
/// file. The first problem found is reported.
pub fn check_create_request(input: &ClientInput, files: &[UploadedFile]) -> Result<(), AppError> {
    if let Some(field) = input.missing_required().first() {
        return Err(AppError::BadRequest(format!("{} is required", field.label())));
    }

    for slot in DocumentSlot::ALL {
        if !files.iter().any(|f| f.field_name == slot.doc_column()) {
            return Err(AppError::BadRequest(format!(
                "{} document is required",
                slot.doc_column()
            )));
        }
    }

    Ok(())
}

/// Writes client records and their document URLs.
///
/// Structured fields and document URLs are written by separate statements with
/// no transaction spanning them: a failure between the two leaves a record
/// without documents, which a later update can fill in.
#[derive(Clone)]
pub struct ClientRecordWriter {
    store: Arc<dyn ClientStore>,
}

impl ClientRecordWriter {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    /// Inserts structured fields only. Required-field checks are the caller's job.
    pub async fn create(&self, fields: &ClientFields) -> Result<ClientRecord, AppError> {
        self.store.insert(fields).await
    }

    /// Sets document URLs on an existing record.
    ///
    /// An empty map writes nothing and returns the current record.
    pub async fn attach_documents(
        &self,
        id: &str,
        urls: &DocumentUrls,
    ) -> Result<ClientRecord, AppError> {
        if urls.is_empty() {
            return self.get(id).await;
        }

        let record = self
            .store
            .set_documents(id, urls)
            .await?
            .ok_or_else(not_found)?;

        tracing::info!("Attached {} document(s) to client {}", urls.len(), id);
        Ok(record)
    }

    /// Full create flow: insert, upload documents under `clients/{id}`, attach their URLs.
    pub async fn create_with_documents(
        &self,
        fields: &ClientFields,
        files: Vec<UploadedFile>,
        uploader: &DocumentUploader,
    ) -> Result<ClientRecord, AppError> {
        let record = self.create(fields).await?;
        tracing::info!("Created client {}", record.id);

        let namespace = client_namespace(&record.id);
        let urls = match uploader.upload_documents(files, &namespace).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::error!(
                    "Client {} was stored but its documents were not: {}",
                    record.id,
                    e
                );
                return Err(e);
            }
        };

        self.attach_documents(&record.id, &urls).await
    }

    /// Uploads replacement documents for an existing client.
    ///
    /// Only document URLs change; structured fields in `fields` are not applied.
    /// Slots without a new file keep their current URL.
    pub async fn update(
        &self,
        id: &str,
        fields: &ClientInput,
        files: Vec<UploadedFile>,
        uploader: &DocumentUploader,
    ) -> Result<ClientRecord, AppError> {
        let current = self.get(id).await?;

        if !fields.is_empty() {
            tracing::debug!(
                "Update of client {} carries {} structured field(s); only documents are updated",
                id,
                fields.len()
            );
        }

        let urls = uploader
            .upload_documents(files, &client_namespace(&current.id))
            .await?;
        self.attach_documents(&current.id, &urls).await
    }

    pub async fn get(&self, id: &str) -> Result<ClientRecord, AppError> {
        self.store.fetch(id).await?.ok_or_else(not_found)
    }

    pub async fn list(&self) -> Result<Vec<ClientSummary>, AppError> {
        self.store.list().await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        if self.store.delete(id).await? == 0 {
            return Err(not_found());
        }
        tracing::info!("Deleted client {}", id);
        Ok(())
    }

    /// Removes every client record. Stored documents are left in place.
    pub async fn delete_all(&self) -> Result<u64, AppError> {
        let deleted = self.store.delete_all().await?;
        tracing::warn!("Deleted all clients ({} rows)", deleted);
        Ok(deleted)
    }
}
