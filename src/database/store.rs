//! Abstract transactional data store consumed by the services.
//!
//! Every read and write happens inside a [`StoreTx`]. Dropping a transaction
//! without calling [`StoreTx::commit`] discards its writes.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::models::{
    Attendance, AttendanceOrigin, Employee, Holiday, Leave, LeaveStatus, NewAttendance,
    NewHoliday, NewLeave, NewTransaction, Office, PayType, Transaction,
};
use crate::error::AppResult;

#[allow(async_fn_in_trait)]
pub trait Store: Clone {
    type Tx: StoreTx;

    async fn begin(&self) -> AppResult<Self::Tx>;
}

/// Filter for ledger reads.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub employee_ids: Option<Vec<Uuid>>,
    pub pay_type: Option<PayType>,
    pub from: Option<DateTime<Utc>>, // inclusive
    pub to: Option<DateTime<Utc>>,   // exclusive
}

#[allow(async_fn_in_trait)]
pub trait StoreTx {
    async fn commit(self) -> AppResult<()>;
    async fn rollback(self) -> AppResult<()>;

    // Employees and offices

    async fn find_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>>;
    /// Like `find_employee`, but holds the employee row until the transaction ends.
    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>>;
    async fn list_active_employees(&mut self, office_id: Option<Uuid>) -> AppResult<Vec<Employee>>;
    async fn set_leave_balance(&mut self, employee_id: Uuid, balance: i32) -> AppResult<()>;
    async fn find_office(&mut self, id: Uuid) -> AppResult<Option<Office>>;
    /// Serialises concurrent batch runs over the same scope key.
    async fn lock_batch_scope(&mut self, key: &str) -> AppResult<()>;

    // Attendance

    async fn find_attendance(&mut self, employee_id: Uuid, date: DateTime<Utc>) -> AppResult<Option<Attendance>>;
    async fn list_attendance_for_date(&mut self, date: DateTime<Utc>) -> AppResult<Vec<Attendance>>;
    async fn list_attendance_for_employee(
        &mut self,
        employee_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>>;
    /// Returns `None` when a row for `(employee_id, date)` already exists.
    async fn try_insert_attendance(&mut self, new: NewAttendance) -> AppResult<Option<Attendance>>;
    async fn record_check_out(
        &mut self,
        attendance_id: Uuid,
        check_out_time: DateTime<Utc>,
        overtime_minutes: i32,
    ) -> AppResult<Attendance>;
    async fn delete_attendance_by_origin(&mut self, date: DateTime<Utc>, origin: AttendanceOrigin) -> AppResult<u64>;

    // Leave

    async fn find_leave(&mut self, id: Uuid) -> AppResult<Option<Leave>>;
    async fn list_leaves_for_employee(&mut self, employee_id: Uuid) -> AppResult<Vec<Leave>>;
    /// Newest `apply_date` first.
    async fn list_leaves_by_status(&mut self, status: LeaveStatus, limit: Option<i64>) -> AppResult<Vec<Leave>>;
    async fn insert_leave(&mut self, new: NewLeave) -> AppResult<Leave>;
    async fn set_leave_status(
        &mut self,
        id: Uuid,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
    ) -> AppResult<Leave>;

    // Holidays

    async fn find_holiday(&mut self, id: Uuid) -> AppResult<Option<Holiday>>;
    /// Inclusive on both ends, ascending by date.
    async fn list_holidays_between(&mut self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Holiday>>;
    async fn insert_holiday(&mut self, new: NewHoliday) -> AppResult<Holiday>;
    async fn delete_holiday(&mut self, id: Uuid) -> AppResult<()>;

    // Ledger

    async fn insert_transaction(&mut self, new: NewTransaction) -> AppResult<Transaction>;
    /// Ascending by date.
    async fn list_transactions(&mut self, filter: TransactionFilter) -> AppResult<Vec<Transaction>>;
}
