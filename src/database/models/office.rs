use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Office hours are kept as instants whose local wall-clock time is the only
/// meaningful part; the date component is arbitrary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub id: Uuid,
    pub name: String,
    pub checkin: DateTime<Utc>,
    pub checkout: DateTime<Utc>,
    pub break_minutes: i32, // informational only
    pub created_at: DateTime<Utc>,
}
