use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

/// Ledger row. Amounts are positive magnitudes; `pay_type` carries the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub amount: BigDecimal, // NUMERIC(12,2)
    pub pay_type: PayType,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum PayType {
        Salary => "salary",
        Overtime => "overtime",
        Deduction => "deduction",
        Advance => "advance",
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub employee_id: Uuid,
    pub amount: BigDecimal,
    pub pay_type: PayType,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
}
