use crate::access::{can_bulk_delete, delete_confirmed};
use crate::auth::CredentialVerifier;
use crate::config::Config;
use crate::errors::AppError;
use crate::importer::{import_batch, import_rows};
use crate::models::*;
use crate::records::{check_create_request, ClientRecordWriter};
use crate::uploads::{read_client_form, ClientForm, DocumentUploader};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client record persistence.
    pub writer: ClientRecordWriter,
    /// Object-storage upload adapter for client documents.
    pub uploader: DocumentUploader,
    /// Bearer-token verifier.
    pub verifier: Arc<dyn CredentialVerifier>,
}

/// Body of a create or update request.
///
/// Multipart bodies are read into a [`ClientForm`] with files spooled to the
/// upload directory. JSON bodies are kept as-is so the create handler can
/// recognise a batch import. Any other body counts as an empty form.
pub enum ClientSubmission {
    Form(ClientForm),
    Json(Value),
}

impl ClientSubmission {
    /// Collapses the submission into a form. JSON bodies never carry files.
    fn into_form(self) -> Result<ClientForm, AppError> {
        match self {
            ClientSubmission::Form(form) => Ok(form),
            ClientSubmission::Json(value) => {
                let object = value.as_object().ok_or_else(|| {
                    AppError::BadRequest("Request body must be a JSON object".to_string())
                })?;
                let input = ClientInput::from_json(object).map_err(AppError::BadRequest)?;
                Ok(ClientForm {
                    input,
                    files: Vec::new(),
                })
            }
        }
    }
}

#[async_trait]
impl FromRequest<Arc<AppState>> for ClientSubmission {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let form = read_client_form(multipart, &state.config.upload_dir).await?;
            return Ok(ClientSubmission::Form(form));
        }

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(ClientSubmission::Json(value));
        }

        Ok(ClientSubmission::Form(ClientForm::default()))
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "client-records-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /clients
///
/// Creates one client from a multipart form, or imports a batch of clients
/// when the JSON body carries `_csv_import` and a `clients` array.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `principal` - The authenticated caller.
/// * `submission` - Multipart form with the five required fields and all eight documents,
///   or a batch-import JSON body.
///
/// # Returns
///
/// * `Result<Response, AppError>` - 201 with the full record, 200 with an `ImportReport`, or an error.
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    submission: ClientSubmission,
) -> Result<Response, AppError> {
    if let ClientSubmission::Json(ref body) = submission {
        if let Some(rows) = import_rows(body) {
            tracing::info!(
                "POST /clients - batch import of {} rows by {}",
                rows.len(),
                principal.username
            );
            let report = import_batch(&state.writer, rows).await;
            return Ok((StatusCode::OK, Json(report)).into_response());
        }
    }

    let form = submission.into_form()?;
    tracing::info!(
        "POST /clients - {} fields, {} files, by {}",
        form.input.len(),
        form.files.len(),
        principal.username
    );

    check_create_request(&form.input, &form.files)?;
    let ClientForm { input, files } = form;
    let fields = input.into_fields()?;

    let record = state
        .writer
        .create_with_documents(&fields, files, &state.uploader)
        .await?;

    Ok((StatusCode::CREATED, Json(record)).into_response())
}

/// GET /clients
///
/// # Returns
///
/// * `Result<Json<Vec<ClientSummary>>, AppError>` - Client summaries, newest first.
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<ClientSummary>>, AppError> {
    tracing::info!("GET /clients - by {}", principal.username);
    let clients = state.writer.list().await?;
    Ok(Json(clients))
}

/// GET /clients/:id
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - Client identifier.
///
/// # Returns
///
/// * `Result<Json<ClientRecord>, AppError>` - The full record, or 404.
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<ClientRecord>, AppError> {
    tracing::info!("GET /clients/{}", id);
    let record = state.writer.get(&id).await?;
    Ok(Json(record))
}

/// PUT /clients/:id
///
/// Uploads replacement documents. Structured fields in the body are not applied.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - Client identifier.
/// * `submission` - Multipart form carrying any of the eight document fields.
///
/// # Returns
///
/// * `Result<Json<ClientRecord>, AppError>` - The refreshed record, or 404.
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<String>,
    submission: ClientSubmission,
) -> Result<Json<ClientRecord>, AppError> {
    let ClientForm { input, files } = submission.into_form()?;
    tracing::info!(
        "PUT /clients/{} - {} files, by {}",
        id,
        files.len(),
        principal.username
    );

    let record = state
        .writer
        .update(&id, &input, files, &state.uploader)
        .await?;
    Ok(Json(record))
}

/// DELETE /clients/:id
///
/// # Returns
///
/// * `Result<StatusCode, AppError>` - 204 No Content, or 404.
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /clients/{} - by {}", id, principal.username);
    state.writer.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /clients
///
/// Deletes every client. Managers only, and only with `x-confirm-delete: true`.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `principal` - The authenticated caller; must be a manager.
/// * `headers` - Request headers carrying the confirmation flag.
///
/// # Returns
///
/// * `Result<Json<DeleteAllResponse>, AppError>` - Count of deleted rows, 403, or 400.
pub async fn delete_all_clients(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Json<DeleteAllResponse>, AppError> {
    tracing::warn!("DELETE /clients - requested by {}", principal.username);
    can_bulk_delete(&principal, delete_confirmed(&headers))?;

    let deleted_count = state.writer.delete_all().await?;
    Ok(Json(DeleteAllResponse {
        message: format!("Successfully deleted {} clients", deleted_count),
        deleted_count,
    }))
}
