use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::canonical::stable_stringify;
use crate::error::{json_type, OrderError, Result};

/// Digest scheme version stamped into every sealed order.
pub const HASH_VERSION: u64 = 1;

pub const HASH_FIELD: &str = "hash";
pub const HASH_VERSION_FIELD: &str = "hashVersion";
pub const HASH_CREATED_AT_FIELD: &str = "hashCreatedAt";

/// Fields left out of the digest input. `hashCreatedAt` stays in, so the
/// digest binds the moment of issuance.
const DIGEST_EXCLUDED: [&str; 2] = [HASH_FIELD, HASH_VERSION_FIELD];

/// Why an order failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyFailure {
    NotObject,
    MissingHash,
    UnsupportedVersion,
    Mismatch,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerifyFailure::NotObject => "not-object",
            VerifyFailure::MissingHash => "missing-hash",
            VerifyFailure::UnsupportedVersion => "unsupported-version",
            VerifyFailure::Mismatch => "mismatch",
        })
    }
}

/// Outcome of [`verify_order_hash`].
///
/// `expected` is the stored digest, `actual` the recomputed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyFailure>,
}

impl Verification {
    fn failed(reason: VerifyFailure) -> Self {
        Self {
            ok: false,
            expected: None,
            actual: None,
            reason: Some(reason),
        }
    }
}

/// SHA-256 (lowercase hex) of the canonical order without its digest fields.
pub fn compute_order_hash(order: &Value) -> Result<String> {
    let map = order
        .as_object()
        .ok_or_else(|| OrderError::NotObject(json_type(order)))?;
    Ok(digest_map(map))
}

fn digest_map(map: &Map<String, Value>) -> String {
    let mut stripped = map.clone();
    for field in DIGEST_EXCLUDED {
        stripped.remove(field);
    }
    let canonical = stable_stringify(&Value::Object(stripped));
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Seal `order` as of now. See [`attach_immutable_order_hash_at`].
pub fn attach_immutable_order_hash(order: Value) -> Result<Value> {
    attach_immutable_order_hash_at(order, Utc::now())
}

/// Stamp `hashVersion` and `hashCreatedAt = now`, then the digest over the
/// stamped record. Any previous hash triple is replaced.
pub fn attach_immutable_order_hash_at(order: Value, now: DateTime<Utc>) -> Result<Value> {
    let mut map = match order {
        Value::Object(map) => map,
        other => return Err(OrderError::NotObject(json_type(&other))),
    };
    map.insert(HASH_VERSION_FIELD.to_string(), Value::from(HASH_VERSION));
    map.insert(
        HASH_CREATED_AT_FIELD.to_string(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    let digest = digest_map(&map);
    map.insert(HASH_FIELD.to_string(), Value::String(digest));
    Ok(Value::Object(map))
}

/// Recompute the digest and compare it with the stored one.
///
/// Never repairs anything; a mismatch is reported to the caller as is.
pub fn verify_order_hash(order: &Value) -> Verification {
    let Some(map) = order.as_object() else {
        return Verification::failed(VerifyFailure::NotObject);
    };
    let stored = map.get(HASH_FIELD).and_then(Value::as_str);
    let version = map.get(HASH_VERSION_FIELD).filter(|v| !v.is_null());
    let (Some(stored), Some(version)) = (stored, version) else {
        return Verification::failed(VerifyFailure::MissingHash);
    };
    if version.as_u64() != Some(HASH_VERSION) {
        return Verification {
            expected: Some(stored.to_string()),
            ..Verification::failed(VerifyFailure::UnsupportedVersion)
        };
    }

    let actual = digest_map(map);
    let ok = actual == stored;
    Verification {
        ok,
        expected: Some(stored.to_string()),
        actual: Some(actual),
        reason: (!ok).then_some(VerifyFailure::Mismatch),
    }
}
