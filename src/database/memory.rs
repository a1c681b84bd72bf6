//! In-process store with the same transactional semantics as the Postgres one.
//!
//! A transaction takes the store-wide lock for its whole lifetime and works on a
//! copy of the state; commit writes the copy back. Transactions are therefore
//! fully serialised.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::models::{
    Attendance, AttendanceOrigin, Employee, EmployeeStatus, Holiday, Leave, LeaveStatus,
    NewAttendance, NewHoliday, NewLeave, NewTransaction, Office, Transaction,
};
use crate::database::store::{Store, StoreTx, TransactionFilter};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub offices: Vec<Office>,
    pub employees: Vec<Employee>,
    pub attendance: Vec<Attendance>,
    pub leaves: Vec<Leave>,
    pub holidays: Vec<Holiday>,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

/// Input for seeding an employee; record management lives outside this crate.
#[derive(Debug, Clone)]
pub struct EmployeeSeed {
    pub name: String,
    pub email: String,
    pub office_id: Uuid,
    pub base_salary: BigDecimal,
    pub overtime_rate: BigDecimal,
    pub leave_balance: i32,
    pub status: EmployeeStatus,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_office(
        &self,
        name: &str,
        checkin: DateTime<Utc>,
        checkout: DateTime<Utc>,
        break_minutes: i32,
    ) -> Office {
        let office = Office {
            id: Uuid::new_v4(),
            name: name.to_string(),
            checkin,
            checkout,
            break_minutes,
            created_at: Utc::now(),
        };
        self.state.lock().await.offices.push(office.clone());
        office
    }

    pub async fn seed_employee(&self, seed: EmployeeSeed) -> Employee {
        let employee = Employee {
            id: Uuid::new_v4(),
            name: seed.name,
            email: seed.email,
            office_id: seed.office_id,
            base_salary: seed.base_salary,
            overtime_rate: seed.overtime_rate,
            leave_balance: seed.leave_balance,
            status: seed.status,
            created_at: Utc::now(),
        };
        self.state.lock().await.employees.push(employee.clone());
        employee
    }

    pub async fn set_leave_balance(&self, employee_id: Uuid, balance: i32) {
        let mut state = self.state.lock().await;
        if let Some(employee) = state.employees.iter_mut().find(|e| e.id == employee_id) {
            employee.leave_balance = balance;
        }
    }

    /// Point-in-time copy of everything committed so far.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }
}

impl StoreTx for MemoryTx {
    async fn commit(mut self) -> AppResult<()> {
        *self.guard = self.work;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        Ok(())
    }

    async fn find_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.work.employees.iter().find(|e| e.id == id).cloned())
    }

    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        // The store-wide lock already excludes every other transaction
        self.find_employee(id).await
    }

    async fn list_active_employees(&mut self, office_id: Option<Uuid>) -> AppResult<Vec<Employee>> {
        Ok(self
            .work
            .employees
            .iter()
            .filter(|e| e.is_active())
            .filter(|e| office_id.is_none_or(|id| e.office_id == id))
            .cloned()
            .collect())
    }

    async fn set_leave_balance(&mut self, employee_id: Uuid, balance: i32) -> AppResult<()> {
        let employee = self
            .work
            .employees
            .iter_mut()
            .find(|e| e.id == employee_id)
            .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;
        employee.leave_balance = balance;
        Ok(())
    }

    async fn find_office(&mut self, id: Uuid) -> AppResult<Option<Office>> {
        Ok(self.work.offices.iter().find(|o| o.id == id).cloned())
    }

    async fn lock_batch_scope(&mut self, _key: &str) -> AppResult<()> {
        Ok(())
    }

    async fn find_attendance(&mut self, employee_id: Uuid, date: DateTime<Utc>) -> AppResult<Option<Attendance>> {
        Ok(self
            .work
            .attendance
            .iter()
            .find(|a| a.employee_id == employee_id && a.date == date)
            .cloned())
    }

    async fn list_attendance_for_date(&mut self, date: DateTime<Utc>) -> AppResult<Vec<Attendance>> {
        Ok(self.work.attendance.iter().filter(|a| a.date == date).cloned().collect())
    }

    async fn list_attendance_for_employee(
        &mut self,
        employee_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        let mut rows: Vec<Attendance> = self
            .work
            .attendance
            .iter()
            .filter(|a| a.employee_id == employee_id && a.date >= from && a.date < to)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.date);
        Ok(rows)
    }

    async fn try_insert_attendance(&mut self, new: NewAttendance) -> AppResult<Option<Attendance>> {
        let exists = self
            .work
            .attendance
            .iter()
            .any(|a| a.employee_id == new.employee_id && a.date == new.date);
        if exists {
            return Ok(None);
        }

        let row = Attendance {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            date: new.date,
            check_in_time: new.check_in_time,
            check_out_time: None,
            overtime_minutes: 0,
            status: new.status,
            origin: new.origin,
            created_at: Utc::now(),
        };
        self.work.attendance.push(row.clone());
        Ok(Some(row))
    }

    async fn record_check_out(
        &mut self,
        attendance_id: Uuid,
        check_out_time: DateTime<Utc>,
        overtime_minutes: i32,
    ) -> AppResult<Attendance> {
        let row = self
            .work
            .attendance
            .iter_mut()
            .find(|a| a.id == attendance_id)
            .ok_or_else(|| AppError::not_found(format!("attendance {}", attendance_id)))?;
        if row.check_out_time.is_some() {
            return Err(AppError::Consistency(format!(
                "attendance {} was checked out concurrently",
                attendance_id
            )));
        }
        row.check_out_time = Some(check_out_time);
        row.overtime_minutes = overtime_minutes;
        Ok(row.clone())
    }

    async fn delete_attendance_by_origin(&mut self, date: DateTime<Utc>, origin: AttendanceOrigin) -> AppResult<u64> {
        let before = self.work.attendance.len();
        self.work
            .attendance
            .retain(|a| !(a.date == date && a.origin == origin));
        Ok((before - self.work.attendance.len()) as u64)
    }

    async fn find_leave(&mut self, id: Uuid) -> AppResult<Option<Leave>> {
        Ok(self.work.leaves.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leaves_for_employee(&mut self, employee_id: Uuid) -> AppResult<Vec<Leave>> {
        let mut rows: Vec<Leave> = self
            .work
            .leaves
            .iter()
            .filter(|l| l.employee_id == employee_id)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.from_date);
        Ok(rows)
    }

    async fn list_leaves_by_status(&mut self, status: LeaveStatus, limit: Option<i64>) -> AppResult<Vec<Leave>> {
        let mut rows: Vec<Leave> = self
            .work
            .leaves
            .iter()
            .filter(|l| l.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.apply_date.cmp(&a.apply_date));
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn insert_leave(&mut self, new: NewLeave) -> AppResult<Leave> {
        let row = Leave {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            reason: new.reason,
            from_date: new.from_date,
            to_date: new.to_date,
            total_days: new.total_days,
            leave_type: new.leave_type,
            status: LeaveStatus::Pending,
            apply_date: new.apply_date,
            decided_at: None,
        };
        self.work.leaves.push(row.clone());
        Ok(row)
    }

    async fn set_leave_status(
        &mut self,
        id: Uuid,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
    ) -> AppResult<Leave> {
        let row = self
            .work
            .leaves
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::not_found(format!("leave {}", id)))?;
        row.status = status;
        row.decided_at = Some(decided_at);
        Ok(row.clone())
    }

    async fn find_holiday(&mut self, id: Uuid) -> AppResult<Option<Holiday>> {
        Ok(self.work.holidays.iter().find(|h| h.id == id).cloned())
    }

    async fn list_holidays_between(&mut self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Holiday>> {
        let mut rows: Vec<Holiday> = self
            .work
            .holidays
            .iter()
            .filter(|h| h.date >= from && h.date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.date);
        Ok(rows)
    }

    async fn insert_holiday(&mut self, new: NewHoliday) -> AppResult<Holiday> {
        if self.work.holidays.iter().any(|h| h.date == new.date) {
            return Err(AppError::Consistency(format!("holiday on {} already exists", new.date)));
        }
        let row = Holiday {
            id: Uuid::new_v4(),
            date: new.date,
            description: new.description,
            created_at: Utc::now(),
        };
        self.work.holidays.push(row.clone());
        Ok(row)
    }

    async fn delete_holiday(&mut self, id: Uuid) -> AppResult<()> {
        let before = self.work.holidays.len();
        self.work.holidays.retain(|h| h.id != id);
        if before == self.work.holidays.len() {
            return Err(AppError::not_found(format!("holiday {}", id)));
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, new: NewTransaction) -> AppResult<Transaction> {
        let row = Transaction {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            amount: new.amount,
            pay_type: new.pay_type,
            date: new.date,
            description: new.description,
            created_at: Utc::now(),
        };
        self.work.transactions.push(row.clone());
        Ok(row)
    }

    async fn list_transactions(&mut self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .work
            .transactions
            .iter()
            .filter(|t| {
                filter
                    .employee_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&t.employee_id))
            })
            .filter(|t| filter.pay_type.is_none_or(|p| t.pay_type == p))
            .filter(|t| filter.from.is_none_or(|from| t.date >= from))
            .filter(|t| filter.to.is_none_or(|to| t.date < to))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.date);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::AttendanceStatus;
    use crate::services::civil_day::CivilCalendar;
    use chrono::TimeZone;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let day = Utc.with_ymd_and_hms(2025, 1, 1, 18, 30, 0).unwrap();
        let employee_id = Uuid::new_v4();

        {
            let mut tx = store.begin().await.unwrap();
            tx.try_insert_attendance(NewAttendance::terminal(
                employee_id,
                day,
                AttendanceStatus::Absent,
                AttendanceOrigin::Reconciliation,
            ))
            .await
            .unwrap();
            // dropped without commit
        }

        assert!(store.snapshot().await.attendance.is_empty());
    }

    #[tokio::test]
    async fn second_insert_for_same_day_is_refused() {
        let store = MemoryStore::new();
        let calendar = CivilCalendar::ist();
        let employees = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        // Local midnights falling on the previous UTC date, across month and year turns
        let days: Vec<DateTime<Utc>> = [(2024, 12, 31), (2025, 1, 1), (2025, 1, 31), (2025, 2, 1), (2025, 2, 28)]
            .into_iter()
            .map(|(y, m, d)| calendar.day_start(NaiveDate::from_ymd_opt(y, m, d).unwrap()))
            .collect();

        let mut tx = store.begin().await.unwrap();
        for day in &days {
            for employee_id in employees {
                let new = NewAttendance::terminal(
                    employee_id,
                    *day,
                    AttendanceStatus::Absent,
                    AttendanceOrigin::Reconciliation,
                );
                assert!(tx.try_insert_attendance(new.clone()).await.unwrap().is_some());
                let again = NewAttendance::terminal(
                    employee_id,
                    *day,
                    AttendanceStatus::Holiday,
                    AttendanceOrigin::Holiday,
                );
                assert!(tx.try_insert_attendance(again).await.unwrap().is_none());
                assert!(tx.try_insert_attendance(new).await.unwrap().is_none());
            }
        }
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.attendance.len(), days.len() * employees.len());
        assert!(state.attendance.iter().all(|row| row.status == AttendanceStatus::Absent));
    }
}
