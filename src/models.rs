use crate::errors::AppError;
use crate::schema::{DocumentSlot, Field, FieldKind, ID_COLUMN, REQUIRED_FIELDS};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

/// Retrieval URLs keyed by document slot.
pub type DocumentUrls = BTreeMap<DocumentSlot, String>;

// ============ Field Values ============

/// A typed value for a structured field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Decimal(BigDecimal),
    Date(NaiveDate),
}

impl FieldValue {
    /// Parses a non-blank raw input according to the field's kind.
    pub fn parse(field: Field, raw: &str) -> Result<FieldValue, String> {
        match field.kind() {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Decimal => parse_decimal(raw)
                .map(FieldValue::Decimal)
                .ok_or_else(|| format!("{} must be a number, got '{}'", field.label(), raw)),
            FieldKind::Date => parse_date(raw)
                .map(FieldValue::Date)
                .ok_or_else(|| format!("{} must be a date, got '{}'", field.label(), raw)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            // Amounts go out as strings so no precision is lost in JSON clients
            FieldValue::Decimal(d) => serializer.serialize_str(&d.to_string()),
            FieldValue::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Accepts plain amounts and amounts with thousands separators (`1,500.00`).
fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    BigDecimal::from_str(cleaned.trim()).ok()
}

/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, or an RFC 3339 timestamp (date part).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn client_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$").expect("client id pattern is valid")
    })
}

/// Whether a caller-supplied identifier is safe to use as a key and a storage path segment.
pub fn is_valid_client_id(id: &str) -> bool {
    client_id_pattern().is_match(id)
}

// ============ Client Input ============

/// Untyped client data as received, restricted to registry fields.
///
/// Blank values are treated as absent and unknown keys are dropped, so a
/// `ClientInput` only ever holds columns the registry knows about.
#[derive(Debug, Clone, Default)]
pub struct ClientInput {
    id: Option<String>,
    values: BTreeMap<Field, String>,
}

impl ClientInput {
    /// Builds input from form-style key/value pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut input = ClientInput::default();
        for (key, value) in pairs {
            input.insert(key.as_ref(), value.as_ref());
        }
        input
    }

    /// Builds input from a JSON object, as sent in batch-import rows.
    ///
    /// Scalars are accepted for any field; nested arrays or objects on a known
    /// field are rejected.
    pub fn from_json(row: &serde_json::Map<String, Value>) -> Result<Self, String> {
        let mut input = ClientInput::default();
        for (key, value) in row {
            let raw = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    if key == ID_COLUMN || Field::from_column(key).is_some() {
                        return Err(format!("{} must be a single value", key.replace('_', " ")));
                    }
                    continue;
                }
            };
            input.insert(key, &raw);
        }
        Ok(input)
    }

    fn insert(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if key == ID_COLUMN {
            self.id = (!value.is_empty()).then(|| value.to_string());
            return;
        }
        match Field::from_column(key) {
            Some(field) if value.is_empty() => {
                self.values.remove(&field);
            }
            Some(field) => {
                self.values.insert(field, value.to_string());
            }
            None => tracing::debug!("Ignoring unknown client field '{}'", key),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Number of known, non-blank fields (the id is not counted).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Required fields that are absent, in registry order.
    pub fn missing_required(&self) -> Vec<Field> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.values.contains_key(f))
            .collect()
    }

    /// Parses every value into its typed form.
    pub fn into_fields(self) -> Result<ClientFields, AppError> {
        if let Some(ref id) = self.id {
            if !is_valid_client_id(id) {
                return Err(AppError::BadRequest(format!(
                    "id '{}' may only contain letters, digits, '.', '_' and '-'",
                    id
                )));
            }
        }

        let mut values = BTreeMap::new();
        for (field, raw) in self.values {
            let value = FieldValue::parse(field, &raw).map_err(AppError::BadRequest)?;
            values.insert(field, value);
        }

        Ok(ClientFields {
            id: self.id,
            values,
        })
    }
}

/// Validated, typed client data ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientFields {
    id: Option<String>,
    values: BTreeMap<Field, FieldValue>,
}

impl ClientFields {
    /// Caller-supplied identifier, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Supplied fields in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> BTreeMap<Field, FieldValue> {
        self.values
    }
}

// ============ Database Models ============

/// A persisted client record.
///
/// Serializes as a flat object with every registry column present; absent
/// values are `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub id: String,
    pub fields: BTreeMap<Field, FieldValue>,
    pub documents: DocumentUrls,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ClientRecord {
    pub fn field(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn document_url(&self, slot: DocumentSlot) -> Option<&str> {
        self.documents.get(&slot).map(String::as_str)
    }
}

impl Serialize for ClientRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(3 + Field::ALL.len() + DocumentSlot::ALL.len()))?;
        map.serialize_entry(ID_COLUMN, &self.id)?;
        for field in Field::ALL {
            map.serialize_entry(field.column(), &self.fields.get(field))?;
        }
        for slot in DocumentSlot::ALL {
            map.serialize_entry(slot.doc_column(), &self.documents.get(&slot))?;
        }
        map.serialize_entry("created_at", &self.created_at)?;
        map.serialize_entry("updated_at", &self.updated_at)?;
        map.end()
    }
}

/// Row shape returned by the client list.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, PartialEq)]
pub struct ClientSummary {
    pub id: String,
    pub client_name: Option<String>,
    pub mobile_no: Option<String>,
    pub product: Option<String>,
    pub policy_no: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============ Principals ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Employee,
}

/// The authenticated actor behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub role: Role,
}

// ============ API Response Models ============

/// A batch-import row that was not imported. `row` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

/// Outcome of one batch import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
    pub results: Vec<ClientRecord>,
}

impl ImportReport {
    pub fn record_success(&mut self, record: ClientRecord) {
        self.imported += 1;
        self.results.push(record);
    }

    pub fn record_failure(&mut self, row: usize, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(ImportRowError {
            row,
            error: error.into(),
        });
    }
}

/// Response for a confirmed bulk delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub message: String,
    pub deleted_count: u64,
}
