//! Read-only views over catalog node descriptors.
//!
//! Descriptors come from untrusted servers. A missing or wrongly-typed key is
//! treated as "feature absent": accessors return empty lists or `None` and
//! never fail.

use serde_json::{Map, Value};

/// Descriptor keys understood by the crawler.
pub mod keys {
    pub const FOLDERS: &str = "folders";
    pub const SERVICES: &str = "services";
    pub const LAYERS: &str = "layers";
    pub const TABLES: &str = "tables";
    pub const FIELDS: &str = "fields";
    pub const CAPABILITIES: &str = "capabilities";
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const ALIAS: &str = "alias";
    pub const DOMAIN: &str = "domain";
    pub const CODED_VALUES: &str = "codedValues";
    pub const CODE: &str = "code";
    pub const MAP_NAME: &str = "mapName";
    pub const DESCRIPTION: &str = "description";
    pub const SERVICE_DESCRIPTION: &str = "serviceDescription";
    pub const ERROR: &str = "error";
    pub const MESSAGE: &str = "message";
    pub const COUNT: &str = "count";
}

/// Capability token that marks a layer as queryable.
const QUERY_CAPABILITY: &str = "query";

/// A child service as declared in a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub name: String,
    pub service_type: String,
}

/// A layer or table reference as declared in a service listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRef {
    /// Text form of the declared `id`, used as the child URL segment.
    pub id: String,
    /// The listing entry itself; persisted when the child cannot be fetched.
    pub summary: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedValue {
    /// `None` when the entry declares no code; the entry is still kept.
    pub code: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: Option<String>,
    pub alias: Option<String>,
    pub coded_values: Vec<CodedValue>,
}

/// Display attributes derived from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Error object embedded in an otherwise successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: Option<i64>,
    pub message: String,
}

/// The metadata persisted for nodes whose descriptor could not be fetched.
pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// String value of `key`, if present and a non-empty string.
pub fn str_field(descriptor: &Value, key: &str) -> Option<String> {
    descriptor
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn list<'a>(descriptor: &'a Value, key: &str) -> &'a [Value] {
    descriptor
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Scalar rendered as text: strings verbatim, everything else in JSON spelling.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn child_folders(descriptor: &Value) -> Vec<String> {
    list(descriptor, keys::FOLDERS)
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub fn child_services(descriptor: &Value) -> Vec<ServiceRef> {
    list(descriptor, keys::SERVICES)
        .iter()
        .filter_map(|entry| {
            Some(ServiceRef {
                name: str_field(entry, keys::NAME)?,
                service_type: str_field(entry, keys::TYPE)?,
            })
        })
        .collect()
}

pub fn layer_refs(descriptor: &Value) -> Vec<ChildRef> {
    child_refs(descriptor, keys::LAYERS)
}

pub fn table_refs(descriptor: &Value) -> Vec<ChildRef> {
    child_refs(descriptor, keys::TABLES)
}

fn child_refs(descriptor: &Value, key: &str) -> Vec<ChildRef> {
    list(descriptor, key)
        .iter()
        .filter_map(|entry| {
            let id = entry.get(keys::ID).filter(|id| !id.is_null())?;
            Some(ChildRef {
                id: scalar_text(id),
                summary: entry.clone(),
            })
        })
        .collect()
}

pub fn fields(descriptor: &Value) -> Vec<FieldSpec> {
    list(descriptor, keys::FIELDS)
        .iter()
        .filter_map(|field| {
            Some(FieldSpec {
                name: str_field(field, keys::NAME)?,
                field_type: str_field(field, keys::TYPE),
                alias: str_field(field, keys::ALIAS),
                coded_values: coded_values(field),
            })
        })
        .collect()
}

fn coded_values(field: &Value) -> Vec<CodedValue> {
    let Some(domain) = field.get(keys::DOMAIN) else {
        return Vec::new();
    };
    list(domain, keys::CODED_VALUES)
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| CodedValue {
            code: entry
                .get(keys::CODE)
                .filter(|code| !code.is_null())
                .map(scalar_text),
            value: entry.get(keys::NAME).and_then(Value::as_str).map(ToOwned::to_owned),
        })
        .collect()
}

/// Service display name falls back from `mapName` to `name`.
pub fn service_display(descriptor: &Value) -> DisplayInfo {
    DisplayInfo {
        name: str_field(descriptor, keys::MAP_NAME).or_else(|| str_field(descriptor, keys::NAME)),
        description: str_field(descriptor, keys::SERVICE_DESCRIPTION),
    }
}

pub fn leaf_display(descriptor: &Value) -> DisplayInfo {
    DisplayInfo {
        name: str_field(descriptor, keys::NAME),
        description: str_field(descriptor, keys::DESCRIPTION),
    }
}

/// True when the `capabilities` string mentions querying, case-insensitively.
pub fn is_queryable(descriptor: &Value) -> bool {
    descriptor
        .get(keys::CAPABILITIES)
        .and_then(Value::as_str)
        .is_some_and(|caps| caps.to_ascii_lowercase().contains(QUERY_CAPABILITY))
}

/// Error object returned with a success status, as catalog servers do for
/// missing tokens or unknown services.
pub fn service_error(body: &Value) -> Option<ServiceError> {
    let error = body.get(keys::ERROR)?;
    if error.is_null() {
        return None;
    }
    Some(ServiceError {
        code: error.get(keys::CODE).and_then(Value::as_i64),
        message: error
            .get(keys::MESSAGE)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string()),
    })
}

pub fn record_count(body: &Value) -> Option<u64> {
    body.get(keys::COUNT).and_then(Value::as_u64)
}

/// Serialize with object keys sorted at every level, so semantically equal
/// descriptors produce identical text regardless of source key order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
