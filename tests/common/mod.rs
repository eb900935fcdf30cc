//! Shared test doubles and fixtures.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use client_records_api::auth::JwtVerifier;
use client_records_api::client_store::ClientStore;
use client_records_api::config::Config;
use client_records_api::errors::AppError;
use client_records_api::handlers::AppState;
use client_records_api::models::{
    ClientFields, ClientRecord, ClientSummary, DocumentUrls, FieldValue,
};
use client_records_api::object_store::ObjectStore;
use client_records_api::records::ClientRecordWriter;
use client_records_api::schema::{DocumentSlot, Field};
use client_records_api::uploads::{DocumentUploader, UploadedFile};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const JWT_SECRET: &str = "test-jwt-secret";

// ============ In-memory client store ============

/// `ClientStore` over a vector. Ids are `client-{n}` unless supplied.
#[derive(Default)]
pub struct InMemoryClientStore {
    rows: Mutex<Vec<ClientRecord>>,
    inserts: Mutex<u64>,
    /// Client names whose insert fails like a constraint violation.
    reject_names: Mutex<HashSet<String>>,
}

impl InMemoryClientStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_client_name(&self, name: &str) {
        self.reject_names.lock().unwrap().insert(name.to_string());
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn record(&self, id: &str) -> Option<ClientRecord> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    fn created_at(n: u64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::seconds(n as i64)
    }
}

fn text(record: &ClientRecord, field: Field) -> Option<String> {
    record.field(field).and_then(FieldValue::as_text).map(str::to_string)
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn insert(&self, fields: &ClientFields) -> Result<ClientRecord, AppError> {
        if let Some(FieldValue::Text(name)) = fields.get(Field::ClientName) {
            if self.reject_names.lock().unwrap().contains(name) {
                return Err(AppError::DatabaseError(sqlx::Error::Protocol(format!(
                    "value too long for client_name '{}'",
                    name
                ))));
            }
        }

        let mut count = self.inserts.lock().unwrap();
        *count += 1;
        let id = fields
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("client-{}", *count));

        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.id == id) {
            return Err(AppError::DatabaseError(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint \"clients_pkey\" ({})",
                id
            ))));
        }

        let record = ClientRecord {
            id,
            fields: fields.clone().into_values(),
            documents: DocumentUrls::new(),
            created_at: Self::created_at(*count),
            updated_at: None,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn set_documents(
        &self,
        id: &str,
        urls: &DocumentUrls,
    ) -> Result<Option<ClientRecord>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(record) = rows.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        for (slot, url) in urls {
            record.documents.insert(*slot, url.clone());
        }
        record.updated_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn fetch(&self, id: &str) -> Result<Option<ClientRecord>, AppError> {
        Ok(self.record(id))
    }

    async fn list(&self) -> Result<Vec<ClientSummary>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut summaries: Vec<ClientSummary> = rows
            .iter()
            .map(|r| ClientSummary {
                id: r.id.clone(),
                client_name: text(r, Field::ClientName),
                mobile_no: text(r, Field::MobileNo),
                product: text(r, Field::Product),
                policy_no: text(r, Field::PolicyNo),
                created_at: r.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let count = rows.len() as u64;
        rows.clear();
        Ok(count)
    }
}

// ============ In-memory object store ============

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub name: String,
    pub body: Bytes,
    pub content_type: String,
}

/// `ObjectStore` that keeps blobs in memory and signs nothing.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<Vec<StoredObject>>,
    /// Puts whose name contains this fragment fail.
    fail_on: Mutex<Option<String>>,
    ttls: Mutex<Vec<Duration>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_names_containing(&self, fragment: &str) {
        *self.fail_on.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn ttls(&self) -> Vec<Duration> {
        self.ttls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), AppError> {
        if let Some(fragment) = self.fail_on.lock().unwrap().as_deref() {
            if name.contains(fragment) {
                return Err(AppError::UploadError(format!("injected failure for {}", name)));
            }
        }
        self.objects.lock().unwrap().push(StoredObject {
            name: name.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    async fn signed_read_url(&self, name: &str, ttl: Duration) -> Result<Url, AppError> {
        self.ttls.lock().unwrap().push(ttl);
        let mut url = Url::parse("https://store.test/docs/").unwrap();
        url.path_segments_mut()
            .unwrap()
            .pop_if_empty()
            .extend(name.split('/'));
        url.query_pairs_mut()
            .append_pair("sp", "r")
            .append_pair("ttl", &ttl.as_secs().to_string());
        Ok(url)
    }
}

// ============ Fixtures ============

/// The five required fields with plausible values.
pub fn required_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("customer_type", "Individual"),
        ("product", "Motor"),
        ("insurance_provider", "Ceylinco"),
        ("client_name", "Nimal Perera"),
        ("mobile_no", "0771234567"),
    ]
}

pub async fn upload(dir: &Path, slot: DocumentSlot, file_name: &str) -> UploadedFile {
    UploadedFile::from_bytes(
        dir,
        slot.doc_column(),
        file_name,
        Some("application/pdf"),
        format!("%PDF {}", file_name).as_bytes(),
    )
    .await
    .unwrap()
}

/// One file for every document slot, named `{slot}.pdf`.
pub async fn all_documents(dir: &Path) -> Vec<UploadedFile> {
    let mut files = Vec::new();
    for slot in DocumentSlot::ALL {
        files.push(upload(dir, slot, &format!("{}.pdf", slot.doc_column())).await);
    }
    files
}

/// Number of entries left in a spool directory.
pub fn spooled_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

pub fn test_config(upload_dir: &Path) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 5000,
        jwt_secret: JWT_SECRET.to_string(),
        azure_account_name: "devstoreaccount1".to_string(),
        azure_account_key: "dGVzdC1rZXk=".to_string(),
        azure_container: "client-docs".to_string(),
        azure_endpoint: None,
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 10 * 1024 * 1024,
        db_max_connections: 1,
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clients: Arc<InMemoryClientStore>,
    pub objects: Arc<InMemoryObjectStore>,
}

pub fn test_app(upload_dir: &Path) -> TestApp {
    let clients = InMemoryClientStore::new();
    let objects = InMemoryObjectStore::new();
    let state = Arc::new(AppState {
        config: test_config(upload_dir),
        writer: ClientRecordWriter::new(clients.clone()),
        uploader: DocumentUploader::new(objects.clone()),
        verifier: Arc::new(JwtVerifier::new(JWT_SECRET)),
    });
    TestApp {
        state,
        clients,
        objects,
    }
}

pub fn token(role: &str) -> String {
    let claims = serde_json::json!({
        "id": 1,
        "username": format!("{}-user", role),
        "role": role,
        "exp": (Utc::now().timestamp() + 3600) as u64,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub const BOUNDARY: &str = "client-records-test-boundary";

/// Hand-assembled `multipart/form-data` body.
pub fn multipart_body(texts: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
