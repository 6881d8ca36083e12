use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{json_type, OrderError, Result};
use crate::hash::{attach_immutable_order_hash_at, HASH_FIELD};

/// Every key a court name has been stored under over the years.
const COURT_NAME_KEYS: [&str; 3] = ["courtName", "court_name", "court"];
/// Every key a court number has been stored under.
const COURT_NO_KEYS: [&str; 4] = ["courtNo", "court_no", "courtNumber", "court_number"];
/// Order fields that hold line items, newest name first.
const LINE_KEYS: [&str; 2] = ["lines", "items"];

/// Court assignment correction for an order.
#[derive(Debug, Clone, Default)]
pub struct CourtPatch {
    pub court_name: Option<String>,
    pub court_no: Option<String>,
    /// Replace values that are already filled in.
    pub overwrite: bool,
}

/// Audit details recorded when an order is re-sealed.
#[derive(Debug, Clone, Default)]
pub struct AdminPatch {
    pub patched_by: Option<String>,
    pub patch_note: Option<String>,
}

/// Write court name/number onto the purchaser and onto each line's
/// attendee `meta`, under all historical key names.
///
/// A key is only written when blank (absent, null or whitespace) unless
/// `overwrite` is set. Does not touch the hash; re-seal afterwards with
/// [`rehash_order_after_admin_patch`].
pub fn patch_order_court_fields(order: Value, patch: &CourtPatch) -> Result<Value> {
    let mut map = into_object(order)?;

    if let Some(purchaser) = map.get_mut("purchaser").and_then(Value::as_object_mut) {
        apply_court(purchaser, patch);
    }
    for key in LINE_KEYS {
        let Some(lines) = map.get_mut(key).and_then(Value::as_array_mut) else {
            continue;
        };
        for line in lines.iter_mut().filter_map(Value::as_object_mut) {
            let meta = line
                .entry("meta")
                .or_insert_with(|| Value::Object(Map::new()));
            if meta.is_null() {
                *meta = Value::Object(Map::new());
            }
            if let Some(meta) = meta.as_object_mut() {
                apply_court(meta, patch);
            }
        }
    }
    Ok(Value::Object(map))
}

fn apply_court(target: &mut Map<String, Value>, patch: &CourtPatch) {
    let fields = [
        (patch.court_name.as_deref(), COURT_NAME_KEYS.as_slice()),
        (patch.court_no.as_deref(), COURT_NO_KEYS.as_slice()),
    ];
    for (value, keys) in fields {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        for key in keys {
            if patch.overwrite || is_blank(target.get(*key)) {
                target.insert((*key).to_string(), Value::String(value.to_string()));
            }
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Re-seal an administratively patched order as of now.
pub fn rehash_order_after_admin_patch(order: Value, patch: &AdminPatch) -> Result<Value> {
    rehash_order_after_admin_patch_at(order, patch, Utc::now())
}

/// Stamp the admin audit fields and replace the hash triple.
///
/// The superseded digest is logged alongside the new one.
pub fn rehash_order_after_admin_patch_at(
    order: Value,
    patch: &AdminPatch,
    now: DateTime<Utc>,
) -> Result<Value> {
    let mut map = into_object(order)?;
    let previous = map
        .get(HASH_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);

    map.insert("admin_patched".into(), Value::Bool(true));
    map.insert(
        "admin_patched_at".into(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    if let Some(by) = patch.patched_by.as_deref().filter(|s| !s.trim().is_empty()) {
        map.insert("admin_patched_by".into(), Value::String(by.to_string()));
    }
    if let Some(note) = patch.patch_note.as_deref().filter(|s| !s.trim().is_empty()) {
        map.insert("admin_patch_note".into(), Value::String(note.to_string()));
    }

    let sealed = attach_immutable_order_hash_at(Value::Object(map), now)?;
    info!(
        order_id = order_id(&sealed).unwrap_or("-"),
        previous_hash = previous.as_deref().unwrap_or("-"),
        new_hash = sealed.get(HASH_FIELD).and_then(serde_json::Value::as_str).unwrap_or("-"),
        patched_by = patch.patched_by.as_deref().unwrap_or("-"),
        "order re-sealed after admin patch"
    );
    Ok(sealed)
}

fn into_object(order: Value) -> Result<Map<String, Value>> {
    match order {
        Value::Object(map) => Ok(map),
        other => Err(OrderError::NotObject(json_type(&other))),
    }
}

fn order_id(order: &Value) -> Option<&str> {
    ["id", "orderId", "order_id"]
        .iter()
        .find_map(|key| order.get(*key).and_then(Value::as_str))
}
