use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: DateTime<Utc>, // UTC instant of local midnight
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub overtime_minutes: i32,
    pub status: AttendanceStatus,
    pub origin: AttendanceOrigin,
    pub created_at: DateTime<Utc>,
}

impl Attendance {
    pub fn day_state(&self) -> DayState {
        match self.status {
            AttendanceStatus::Absent => DayState::Absent,
            AttendanceStatus::Leave => DayState::OnLeave,
            AttendanceStatus::Holiday => DayState::Holiday,
            AttendanceStatus::Present | AttendanceStatus::Late => {
                if self.check_out_time.is_some() {
                    DayState::CheckedOut
                } else {
                    DayState::CheckedIn
                }
            }
        }
    }

    pub fn is_bulk_created(&self) -> bool {
        self.origin == AttendanceOrigin::Reconciliation
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum AttendanceStatus {
        Present => "present",
        Late => "late",
        Absent => "absent",
        Leave => "leave",
        Holiday => "holiday",
    }
}

string_enum! {
    /// Which flow created the row.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum AttendanceOrigin {
        CheckIn => "check_in",
        Reconciliation => "reconciliation",
        Holiday => "holiday",
    }
}

/// Per-employee, per-day position in the attendance state machine.
/// A day without a row is `None` and is represented by the absence of an `Attendance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayState {
    CheckedIn,
    CheckedOut,
    Absent,
    OnLeave,
    Holiday,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub employee_id: Uuid,
    pub date: DateTime<Utc>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub origin: AttendanceOrigin,
}

impl NewAttendance {
    /// A row written without a check-in by a batch flow.
    pub fn terminal(
        employee_id: Uuid,
        date: DateTime<Utc>,
        status: AttendanceStatus,
        origin: AttendanceOrigin,
    ) -> Self {
        Self {
            employee_id,
            date,
            check_in_time: None,
            status,
            origin,
        }
    }
}
