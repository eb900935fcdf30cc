//! Persistence for client records.
//!
//! Statements are assembled from registry column names with every value
//! bound as a parameter; request data never reaches SQL text.

use crate::errors::{AppError, ResultExt};
use crate::models::{ClientFields, ClientRecord, ClientSummary, DocumentUrls, FieldValue};
use crate::schema::{DocumentSlot, Field, FieldKind, CLIENTS_TABLE, ID_COLUMN};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use std::collections::BTreeMap;

/// Record store for client rows.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Inserts the supplied fields and returns the row as stored, including the
    /// generated id and timestamps.
    async fn insert(&self, fields: &ClientFields) -> Result<ClientRecord, AppError>;

    /// Sets the given document URL columns. `None` if no row has `id`.
    async fn set_documents(
        &self,
        id: &str,
        urls: &DocumentUrls,
    ) -> Result<Option<ClientRecord>, AppError>;

    async fn fetch(&self, id: &str) -> Result<Option<ClientRecord>, AppError>;

    /// Summaries ordered newest first, ties broken by id descending.
    async fn list(&self) -> Result<Vec<ClientSummary>, AppError>;

    /// Removes one row; returns the number of rows removed.
    async fn delete(&self, id: &str) -> Result<u64, AppError>;

    /// Removes every row; returns the number of rows removed.
    async fn delete_all(&self) -> Result<u64, AppError>;
}

// ============ Statement Builders ============

fn push_value(
    separated: &mut sqlx::query_builder::Separated<'_, 'static, Postgres, &'static str>,
    value: &FieldValue,
) {
    match value {
        FieldValue::Text(s) => separated.push_bind(s.clone()),
        FieldValue::Decimal(d) => separated.push_bind(d.clone()),
        FieldValue::Date(d) => separated.push_bind(*d),
    };
}

/// `INSERT ... RETURNING *` over the supplied fields only.
///
/// The id column is included only when the caller supplied an id; otherwise
/// the table default generates one.
pub fn insert_statement(fields: &ClientFields) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {} ", CLIENTS_TABLE));

    if fields.id().is_none() && fields.is_empty() {
        builder.push("DEFAULT VALUES RETURNING *");
        return builder;
    }

    builder.push("(");
    {
        let mut columns = builder.separated(", ");
        if fields.id().is_some() {
            columns.push(ID_COLUMN);
        }
        for (field, _) in fields.iter() {
            columns.push(field.column());
        }
    }
    builder.push(") VALUES (");
    {
        let mut values = builder.separated(", ");
        if let Some(id) = fields.id() {
            values.push_bind(id.to_string());
        }
        for (_, value) in fields.iter() {
            push_value(&mut values, value);
        }
    }
    builder.push(") RETURNING *");
    builder
}

/// `UPDATE ... RETURNING *` touching exactly the supplied document columns.
///
/// Callers must not pass an empty map.
pub fn attach_documents_statement(id: &str, urls: &DocumentUrls) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", CLIENTS_TABLE));
    {
        let mut assignments = builder.separated(", ");
        for (slot, url) in urls {
            assignments.push(format!("{} = ", slot.doc_column()));
            assignments.push_bind_unseparated(url.clone());
        }
        assignments.push("updated_at = now()");
    }
    builder.push(format!(" WHERE {} = ", ID_COLUMN));
    builder.push_bind(id.to_string());
    builder.push(" RETURNING *");
    builder
}

// ============ Row Mapping ============

fn read_field(row: &PgRow, field: Field) -> Result<Option<FieldValue>, sqlx::Error> {
    let column = field.column();
    Ok(match field.kind() {
        FieldKind::Text => row
            .try_get::<Option<String>, _>(column)?
            .map(FieldValue::Text),
        FieldKind::Decimal => row
            .try_get::<Option<BigDecimal>, _>(column)?
            .map(FieldValue::Decimal),
        FieldKind::Date => row
            .try_get::<Option<NaiveDate>, _>(column)?
            .map(FieldValue::Date),
    })
}

impl<'r> FromRow<'r, PgRow> for ClientRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let mut fields = BTreeMap::new();
        for field in Field::ALL {
            if let Some(value) = read_field(row, *field)? {
                fields.insert(*field, value);
            }
        }

        let mut documents = DocumentUrls::new();
        for slot in DocumentSlot::ALL {
            if let Some(url) = row.try_get::<Option<String>, _>(slot.doc_column())? {
                documents.insert(slot, url);
            }
        }

        Ok(ClientRecord {
            id: row.try_get(ID_COLUMN)?,
            fields,
            documents,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
        })
    }
}

// ============ Postgres Store ============

/// `ClientStore` backed by the `clients` table.
#[derive(Clone)]
pub struct PgClientStore {
    pool: PgPool,
}

impl PgClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for PgClientStore {
    async fn insert(&self, fields: &ClientFields) -> Result<ClientRecord, AppError> {
        let mut statement = insert_statement(fields);
        let record = statement
            .build_query_as::<ClientRecord>()
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Inserted client {} ({} fields)", record.id, fields.len());
        Ok(record)
    }

    async fn set_documents(
        &self,
        id: &str,
        urls: &DocumentUrls,
    ) -> Result<Option<ClientRecord>, AppError> {
        if urls.is_empty() {
            return self.fetch(id).await;
        }

        let mut statement = attach_documents_statement(id, urls);
        statement
            .build_query_as::<ClientRecord>()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Attaching {} document(s) to client {}", urls.len(), id))
    }

    async fn fetch(&self, id: &str) -> Result<Option<ClientRecord>, AppError> {
        let record = sqlx::query_as::<_, ClientRecord>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ClientSummary>, AppError> {
        let clients = sqlx::query_as::<_, ClientSummary>(
            "SELECT id, client_name, mobile_no, product, policy_no, created_at
             FROM clients
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn delete(&self, id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM clients")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
