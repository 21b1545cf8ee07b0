//! Local group model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted group row. Group names are globally unique.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub created_utc: DateTime<Utc>,
}
