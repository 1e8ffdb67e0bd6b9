use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ownership proof attached to a listing. Only `document_type` is mandatory; the remaining
/// attributes depend on the document kind (certificate number, plot, issuing ministry, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipDocument {
    pub document_type: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl OwnershipDocument {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("ownership documents must be valid JSON: {0}")]
    InvalidJson(String),
    #[error("ownership documents must be a JSON object or array")]
    NotObjectOrArray,
    #[error("ownership document {index} must be a JSON object")]
    NotAnObject { index: usize },
    #[error("ownership document {index} is missing document_type")]
    MissingDocumentType { index: usize },
    #[error("ownership document {index} has an empty document_type")]
    EmptyDocumentType { index: usize },
}

/// Parse ownership documents as submitted by clients: a single object, an array of objects,
/// or either of those encoded as a JSON string.
pub fn parse_ownership_documents(raw: &Value) -> Result<Vec<OwnershipDocument>, DocumentError> {
    match raw {
        Value::String(encoded) => {
            let decoded: Value = serde_json::from_str(encoded)
                .map_err(|err| DocumentError::InvalidJson(err.to_string()))?;
            if decoded.is_string() {
                return Err(DocumentError::NotObjectOrArray);
            }
            parse_ownership_documents(&decoded)
        }
        Value::Object(_) => Ok(vec![parse_document(0, raw)?]),
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_document(index, entry))
            .collect(),
        _ => Err(DocumentError::NotObjectOrArray),
    }
}

fn parse_document(index: usize, raw: &Value) -> Result<OwnershipDocument, DocumentError> {
    let Value::Object(fields) = raw else {
        return Err(DocumentError::NotAnObject { index });
    };

    let mut attributes = BTreeMap::new();
    let mut document_type = None;
    for (key, value) in fields {
        if key == "document_type" {
            document_type = Some(value);
        } else {
            attributes.insert(key.clone(), value.clone());
        }
    }

    let document_type = document_type
        .and_then(Value::as_str)
        .ok_or(DocumentError::MissingDocumentType { index })?
        .trim();
    if document_type.is_empty() {
        return Err(DocumentError::EmptyDocumentType { index });
    }

    Ok(OwnershipDocument {
        document_type: document_type.to_string(),
        attributes,
    })
}
