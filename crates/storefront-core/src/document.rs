//! Schemaless storefront documents.
//!
//! Every resource (product, order, voucher, ...) is stored as a JSON object.
//! The only fields the backend owns are the identifier and the two
//! timestamps; everything else belongs to the caller.

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::id::{generate_id, validate_id};
use crate::time::now_utc;

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Convert an arbitrary JSON payload into a document, rejecting non-objects.
pub fn document_from_value(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::invalid_document(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Assign `_id` (unless the caller supplied a valid one) and both timestamps.
pub fn stamp_created(doc: &mut Document) -> Result<String> {
    let id = match document_id(doc) {
        Some(id) => {
            validate_id(id).map_err(|e| CoreError::invalid_id(format!("{id}: {e}")))?;
            id.to_string()
        }
        None => generate_id(),
    };
    let now = now_utc().to_rfc3339()?;
    doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    doc.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
    doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
    Ok(id)
}

/// Merge `patch` into `existing`, keeping the owned fields intact.
pub fn stamp_updated(existing: &mut Document, patch: Document) -> Result<()> {
    for (field, value) in patch {
        if field == ID_FIELD || field == CREATED_AT_FIELD || field == UPDATED_AT_FIELD {
            continue;
        }
        existing.insert(field, value);
    }
    existing.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(now_utc().to_rfc3339()?),
    );
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
