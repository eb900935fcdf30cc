mod common;

use client_records_api::errors::AppError;
use client_records_api::models::{ClientInput, DocumentUrls, FieldValue};
use client_records_api::records::{check_create_request, ClientRecordWriter};
use client_records_api::schema::{DocumentSlot, Field};
use client_records_api::uploads::DocumentUploader;
use common::*;

fn input(extra: &[(&'static str, &'static str)]) -> ClientInput {
    let mut pairs = required_pairs();
    pairs.extend_from_slice(extra);
    ClientInput::from_pairs(pairs)
}

#[tokio::test]
async fn create_with_documents_attaches_every_slot() {
    let dir = tempfile::tempdir().unwrap();
    let clients = InMemoryClientStore::new();
    let objects = InMemoryObjectStore::new();
    let writer = ClientRecordWriter::new(clients.clone());
    let uploader = DocumentUploader::new(objects.clone());

    let fields = input(&[("sum_insured", "2,500,000")]).into_fields().unwrap();
    let files = all_documents(dir.path()).await;
    let record = writer
        .create_with_documents(&fields, files, &uploader)
        .await
        .unwrap();

    assert_eq!(record.documents.len(), 8);
    for slot in DocumentSlot::ALL {
        let url = url::Url::parse(record.document_url(slot).unwrap()).unwrap();
        assert!(url.path().contains(&format!("/clients/{}/", record.id)));
        assert!(url.path().ends_with(&format!("{}.pdf", slot.doc_column())));
    }
    assert_eq!(objects.objects().len(), 8);
    assert_eq!(spooled_count(dir.path()), 0);

    // Stored state matches what was returned
    assert_eq!(clients.record(&record.id).unwrap(), record);
}

#[tokio::test]
async fn upload_failure_leaves_structured_only_record() {
    let dir = tempfile::tempdir().unwrap();
    let clients = InMemoryClientStore::new();
    let objects = InMemoryObjectStore::new();
    objects.fail_names_containing("quotation_doc_url");
    let writer = ClientRecordWriter::new(clients.clone());
    let uploader = DocumentUploader::new(objects.clone());

    let fields = input(&[]).into_fields().unwrap();
    let files = all_documents(dir.path()).await;
    let err = writer
        .create_with_documents(&fields, files, &uploader)
        .await
        .unwrap_err();

    assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(clients.len(), 1);
    let stored = clients.record("client-1").unwrap();
    assert!(stored.documents.is_empty());
    assert_eq!(spooled_count(dir.path()), 0);
}

#[tokio::test]
async fn attach_documents_with_empty_map_returns_current_record() {
    let clients = InMemoryClientStore::new();
    let writer = ClientRecordWriter::new(clients.clone());
    let created = writer.create(&input(&[]).into_fields().unwrap()).await.unwrap();

    let same = writer
        .attach_documents(&created.id, &DocumentUrls::new())
        .await
        .unwrap();
    assert_eq!(same, created);
    assert!(same.updated_at.is_none());

    let err = writer
        .attach_documents("missing", &DocumentUrls::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn attach_documents_on_unknown_id_is_not_found() {
    let writer = ClientRecordWriter::new(InMemoryClientStore::new());
    let mut urls = DocumentUrls::new();
    urls.insert(DocumentSlot::Invoice, "https://store.test/x".to_string());
    let err = writer.attach_documents("nope", &urls).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "Not found"));
}

#[tokio::test]
async fn update_replaces_one_slot_and_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let clients = InMemoryClientStore::new();
    let writer = ClientRecordWriter::new(clients.clone());
    let uploader = DocumentUploader::new(InMemoryObjectStore::new());

    let created = writer
        .create_with_documents(
            &input(&[]).into_fields().unwrap(),
            all_documents(dir.path()).await,
            &uploader,
        )
        .await
        .unwrap();

    let first = writer
        .update(
            &created.id,
            &ClientInput::default(),
            vec![upload(dir.path(), DocumentSlot::Invoice, "invoice-v2.pdf").await],
            &uploader,
        )
        .await
        .unwrap();
    let second = writer
        .update(
            &created.id,
            &ClientInput::default(),
            vec![upload(dir.path(), DocumentSlot::Invoice, "invoice-v3.pdf").await],
            &uploader,
        )
        .await
        .unwrap();

    assert!(first.document_url(DocumentSlot::Invoice).unwrap().contains("invoice-v2.pdf"));
    assert!(second.document_url(DocumentSlot::Invoice).unwrap().contains("invoice-v3.pdf"));
    for slot in DocumentSlot::ALL {
        if slot != DocumentSlot::Invoice {
            assert_eq!(second.document_url(slot), created.document_url(slot));
        }
    }
    assert!(second.updated_at.is_some());
}

#[tokio::test]
async fn update_does_not_apply_structured_fields() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ClientRecordWriter::new(InMemoryClientStore::new());
    let uploader = DocumentUploader::new(InMemoryObjectStore::new());
    let created = writer.create(&input(&[]).into_fields().unwrap()).await.unwrap();

    let changes = ClientInput::from_pairs([("client_name", "Renamed"), ("city", "Kandy")]);
    let updated = writer
        .update(
            &created.id,
            &changes,
            vec![upload(dir.path(), DocumentSlot::Schedule, "schedule.pdf").await],
            &uploader,
        )
        .await
        .unwrap();

    assert_eq!(
        updated.field(Field::ClientName),
        Some(&FieldValue::Text("Nimal Perera".to_string()))
    );
    assert_eq!(updated.field(Field::City), None);
    assert!(updated.document_url(DocumentSlot::Schedule).is_some());
}

#[tokio::test]
async fn update_of_unknown_client_uploads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let objects = InMemoryObjectStore::new();
    let writer = ClientRecordWriter::new(InMemoryClientStore::new());
    let uploader = DocumentUploader::new(objects.clone());

    let err = writer
        .update(
            "ghost",
            &ClientInput::default(),
            vec![upload(dir.path(), DocumentSlot::Invoice, "invoice.pdf").await],
            &uploader,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(objects.objects().is_empty());
    assert_eq!(spooled_count(dir.path()), 0);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let writer = ClientRecordWriter::new(InMemoryClientStore::new());
    let created = writer.create(&input(&[]).into_fields().unwrap()).await.unwrap();

    assert!(matches!(writer.delete("unknown").await, Err(AppError::NotFound(_))));
    writer.delete(&created.id).await.unwrap();
    assert!(matches!(writer.get(&created.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(writer.delete(&created.id).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn list_is_newest_first_and_delete_all_counts_rows() {
    let clients = InMemoryClientStore::new();
    let writer = ClientRecordWriter::new(clients.clone());
    for name in ["A", "B", "C"] {
        let fields = input(&[("client_name", name)]).into_fields().unwrap();
        writer.create(&fields).await.unwrap();
    }

    let names: Vec<_> = writer
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.client_name.unwrap())
        .collect();
    assert_eq!(names, ["C", "B", "A"]);

    assert_eq!(writer.delete_all().await.unwrap(), 3);
    assert_eq!(writer.delete_all().await.unwrap(), 0);
    assert!(writer.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn supplied_id_is_kept() {
    let writer = ClientRecordWriter::new(InMemoryClientStore::new());
    let fields = input(&[("id", "CL-2024-001")]).into_fields().unwrap();
    let record = writer.create(&fields).await.unwrap();
    assert_eq!(record.id, "CL-2024-001");
}

#[tokio::test]
async fn create_request_checks_fields_before_documents() {
    let dir = tempfile::tempdir().unwrap();

    let missing_mobile = ClientInput::from_pairs(
        required_pairs()
            .into_iter()
            .filter(|(k, _)| *k != "mobile_no"),
    );
    let err = check_create_request(&missing_mobile, &[]).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "mobile no is required"));

    let mut files = all_documents(dir.path()).await;
    files.retain(|f| f.field_name != "cr_copy_doc_url");
    let err = check_create_request(&input(&[]), &files).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "cr_copy_doc_url document is required"));

    let files = all_documents(dir.path()).await;
    assert!(check_create_request(&input(&[]), &files).is_ok());
}
