use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub reason: String,
    pub from_date: NaiveDate, // inclusive civil day
    pub to_date: NaiveDate,   // inclusive civil day
    pub total_days: i32,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
    pub apply_date: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Leave {
    /// Closed-interval intersection with `[from, to]`.
    ///
    /// Covers all four cases: this leave contains the start, contains the end,
    /// is contained by the range, or brackets it exactly.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        let contains_start = self.from_date <= from && from <= self.to_date;
        let contains_end = self.from_date <= to && to <= self.to_date;
        let inside_request = from <= self.from_date && self.to_date <= to;
        contains_start || contains_end || inside_request
    }

    pub fn covers(&self, day: NaiveDate) -> bool {
        self.from_date <= day && day <= self.to_date
    }

    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum LeaveType {
        Paid => "paid",
        Unpaid => "unpaid",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum LeaveStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone)]
pub struct NewLeave {
    pub employee_id: Uuid,
    pub reason: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub total_days: i32,
    pub leave_type: LeaveType,
    pub apply_date: DateTime<Utc>,
}
