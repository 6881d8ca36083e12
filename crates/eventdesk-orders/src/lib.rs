//! `eventdesk-orders`: tamper-evident sealing of order records.
//!
//! Orders are plain JSON objects. Sealing stamps a version, an issuance
//! timestamp and a SHA-256 digest of the canonical serialization; any later
//! change to the record makes [`verify_order_hash`] fail. Corrections go
//! through [`patch_order_court_fields`] followed by
//! [`rehash_order_after_admin_patch`], which records who re-sealed it.

pub mod cache;
pub mod canonical;
pub mod error;
pub mod hash;
pub mod patch;

pub use cache::OrderCache;
pub use canonical::stable_stringify;
pub use error::{OrderError, Result};
pub use hash::{
    attach_immutable_order_hash, attach_immutable_order_hash_at, compute_order_hash, verify_order_hash, VerifyFailure,
    Verification, HASH_VERSION,
};
pub use patch::{
    patch_order_court_fields, rehash_order_after_admin_patch, rehash_order_after_admin_patch_at,
    AdminPatch, CourtPatch,
};
