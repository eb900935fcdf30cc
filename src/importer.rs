//! Batch import of client rows.
//!
//! Rows are validated and inserted one at a time with no surrounding
//! transaction. A bad row is recorded in the report and the next row is tried.

use crate::errors::AppError;
use crate::models::{ClientInput, ImportReport};
use crate::records::ClientRecordWriter;
use crate::schema::{Field, REQUIRED_FIELDS};
use serde_json::{Map, Value};

/// Request flag marking a JSON body as a batch import.
pub const IMPORT_FLAG: &str = "_csv_import";

/// Key holding the rows of a batch import.
pub const IMPORT_ROWS: &str = "clients";

/// Rows of a batch-import body, if the body asks for an import.
///
/// The flag counts when it is `true`, a non-zero number, or a non-empty
/// string other than `"false"`/`"0"`.
pub fn import_rows(body: &Value) -> Option<&Vec<Value>> {
    let flagged = match body.get(IMPORT_FLAG)? {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && s != "false" && s != "0"
        }
        _ => false,
    };
    if !flagged {
        return None;
    }
    body.get(IMPORT_ROWS)?.as_array()
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Required fields a row lacks, in registry order. Blank, `null`, `false`
/// and `0` all count as missing; other fields keep `false`/`0` as values.
fn missing_required(input: &ClientInput, row: &Map<String, Value>) -> Vec<Field> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|f| input.get(*f).is_none() || row.get(f.column()).is_some_and(is_falsy))
        .collect()
}

/// Message stored against a failed row. Validation messages are kept as-is;
/// anything else carries its error category.
fn row_error_message(err: &AppError) -> String {
    match err {
        AppError::BadRequest(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Imports `rows` in order. Never fails as a whole; see [`ImportReport`].
pub async fn import_batch(writer: &ClientRecordWriter, rows: &[Value]) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;

        let Some(object) = row.as_object() else {
            report.record_failure(row_number, "Row must be an object");
            continue;
        };

        let input = match ClientInput::from_json(object) {
            Ok(input) => input,
            Err(msg) => {
                report.record_failure(row_number, msg);
                continue;
            }
        };

        let missing = missing_required(&input, object);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.column()).collect();
            report.record_failure(
                row_number,
                format!("Missing required fields: {}", names.join(", ")),
            );
            continue;
        }

        let result = match input.into_fields() {
            Ok(fields) => writer.create(&fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                tracing::debug!("Import row {} created client {}", row_number, record.id);
                report.record_success(record);
            }
            Err(e) => {
                tracing::warn!("Import row {} failed: {}", row_number, e);
                report.record_failure(row_number, row_error_message(&e));
            }
        }
    }

    tracing::info!(
        "Batch import finished: {} imported, {} failed",
        report.imported,
        report.failed
    );
    report
}
