//! Soft-deletion lifecycle shared by every relational entity.
//!
//! Entities embed a [`Lifecycle`] value instead of inheriting delete columns
//! from a base type. Rows are never physically removed; reads filter on
//! `is_deleted`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Returns the lifecycle with the deletion flag set and the deletion time
/// recorded. The caller is responsible for persisting the returned value.
pub fn soft_delete(mut lifecycle: Lifecycle, at: DateTime<Utc>) -> Lifecycle {
    lifecycle.is_deleted = true;
    lifecycle.deleted_at = Some(at);
    lifecycle
}
