use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    /// Sealing and patching only operate on JSON objects.
    #[error("order is not a JSON object (got {0})")]
    NotObject(&'static str),

    /// The order list could not be loaded into the cache.
    #[error("Order load failed: {0}")]
    Load(String),
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// Name of the JSON type, for error messages.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
