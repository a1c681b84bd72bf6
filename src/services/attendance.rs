use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{
    Attendance, AttendanceOrigin, AttendanceStatus, Employee, EmployeeRef, Leave, LeaveStatus,
    NewAttendance, NewTransaction, Office, PayType, Transaction,
};
use crate::database::store::{Store, StoreTx};
use crate::database::transaction::{finish, retry_on_conflict};
use crate::error::{AppError, AppResult};
use crate::services::OfficeScope;
use crate::services::civil_day::{CivilCalendar, CivilDay};
use crate::services::clock::Clock;
use crate::services::ledger::overtime_pay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// How long after office check-in an arrival still counts as on time (inclusive).
    pub late_grace: Duration,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_grace: Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
    pub local_time: String,
    pub attendance: Attendance,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutOutcome {
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
    pub local_time: String,
    pub overtime_minutes: i32,
    pub overtime_payment: Option<Transaction>,
    pub attendance: Attendance,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub date: String,
    pub total_employees: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub on_leave: usize,
    pub holiday: usize,
    pub absentees: Vec<EmployeeRef>,
    pub pending_leaves: Vec<Leave>,
}

const DASHBOARD_PENDING_LEAVES: usize = 5;

/// PRESENT when `now` falls on or before office check-in plus the grace period,
/// compared at minute precision in local time.
pub fn arrival_status(
    calendar: &CivilCalendar,
    office: &Office,
    now: DateTime<Utc>,
    policy: &AttendancePolicy,
) -> AttendanceStatus {
    let threshold = calendar.minute_of_day(office.checkin) + policy.late_grace.num_minutes();
    if calendar.minute_of_day(now) <= threshold {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}

/// Minutes worked beyond the office's scheduled day.
///
/// Both spans are computed from local time-of-day deltas, so the check-in and
/// check-out must fall on the same civil day.
pub fn overtime_minutes(
    calendar: &CivilCalendar,
    office: &Office,
    check_in: DateTime<Utc>,
    check_out: DateTime<Utc>,
) -> AppResult<i32> {
    if calendar.civil_date(check_in) != calendar.civil_date(check_out) {
        return Err(AppError::CrossDayCheckout);
    }
    if check_out < check_in {
        return Err(AppError::validation("check-out precedes check-in"));
    }

    let office_minutes = calendar.minute_of_day(office.checkout) - calendar.minute_of_day(office.checkin);
    if office_minutes <= 0 {
        return Err(AppError::validation(format!(
            "office {} has a checkout time that does not follow its checkin time",
            office.id
        )));
    }

    let worked_minutes = calendar.minute_of_day(check_out) - calendar.minute_of_day(check_in);
    Ok((worked_minutes - office_minutes).max(0) as i32)
}

pub struct AttendanceService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    calendar: CivilCalendar,
    policy: AttendancePolicy,
}

impl<S: Store> AttendanceService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, calendar: CivilCalendar, policy: AttendancePolicy) -> Self {
        Self {
            store,
            clock,
            calendar,
            policy,
        }
    }

    pub async fn check_in(&self, employee_id: Uuid) -> AppResult<CheckInOutcome> {
        retry_on_conflict("check-in", || self.try_check_in(employee_id)).await
    }

    pub async fn check_out(&self, employee_id: Uuid) -> AppResult<CheckOutOutcome> {
        retry_on_conflict("check-out", || self.try_check_out(employee_id)).await
    }

    /// All attendance rows for an employee in a civil month, oldest first.
    pub async fn attendance_for_month(&self, employee_id: Uuid, month: u32, year: i32) -> AppResult<Vec<Attendance>> {
        let range = self.calendar.month_bounds(year, month, self.clock.now())?;
        let mut tx = self.store.begin().await?;
        let result: AppResult<Vec<Attendance>> = async {
            tx.find_employee(employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;
            if range.is_empty() {
                return Ok(Vec::new());
            }
            tx.list_attendance_for_employee(employee_id, range.start, range.end).await
        }
        .await;
        finish(tx, result).await
    }

    /// Headcount by status for today across the scoped employees.
    pub async fn today_dashboard(&self, scope: OfficeScope) -> AppResult<DashboardSummary> {
        let today = self.calendar.today(self.clock.now());
        let mut tx = self.store.begin().await?;
        let result: AppResult<DashboardSummary> = async {
            let employees = tx.list_active_employees(scope.office_id()).await?;
            let rows = tx.list_attendance_for_date(today.start).await?;
            let pending = tx.list_leaves_by_status(LeaveStatus::Pending, None).await?;
            Ok(summarize_day(&today, &employees, &rows, pending))
        }
        .await;
        finish(tx, result).await
    }

    async fn try_check_in(&self, employee_id: Uuid) -> AppResult<CheckInOutcome> {
        let now = self.clock.now();
        let today = self.calendar.today(now);
        let mut tx = self.store.begin().await?;
        let result = self.check_in_within(&mut tx, employee_id, now, &today).await;
        finish(tx, result).await
    }

    async fn check_in_within(
        &self,
        tx: &mut S::Tx,
        employee_id: Uuid,
        now: DateTime<Utc>,
        today: &CivilDay,
    ) -> AppResult<CheckInOutcome> {
        let employee = self.active_employee(tx, employee_id).await?;

        if tx.find_attendance(employee_id, today.start).await?.is_some() {
            return Err(AppError::AlreadyCheckedIn);
        }

        let office = self.office_of(tx, &employee).await?;
        let status = arrival_status(&self.calendar, &office, now, &self.policy);

        let attendance = tx
            .try_insert_attendance(NewAttendance {
                employee_id,
                date: today.start,
                check_in_time: Some(now),
                status,
                origin: AttendanceOrigin::CheckIn,
            })
            .await?
            .ok_or_else(|| {
                AppError::Consistency(format!(
                    "attendance for employee {} on {} was created concurrently",
                    employee_id, today.date
                ))
            })?;

        log::info!(
            "Employee {} checked in {} on {} at {}",
            employee_id,
            status,
            today.date,
            self.format_local(now)
        );

        Ok(CheckInOutcome {
            status,
            timestamp: now,
            local_time: self.format_local(now),
            attendance,
        })
    }

    async fn try_check_out(&self, employee_id: Uuid) -> AppResult<CheckOutOutcome> {
        let now = self.clock.now();
        let today = self.calendar.today(now);
        let mut tx = self.store.begin().await?;
        let result = self.check_out_within(&mut tx, employee_id, now, &today).await;
        finish(tx, result).await
    }

    async fn check_out_within(
        &self,
        tx: &mut S::Tx,
        employee_id: Uuid,
        now: DateTime<Utc>,
        today: &CivilDay,
    ) -> AppResult<CheckOutOutcome> {
        let employee = self.active_employee(tx, employee_id).await?;

        let Some(attendance) = tx.find_attendance(employee_id, today.start).await? else {
            return Err(self.missing_check_in(tx, employee_id, today).await?);
        };

        // Terminal rows written by batch flows have no check-in to close
        let Some(check_in_time) = attendance.check_in_time else {
            return Err(self.missing_check_in(tx, employee_id, today).await?);
        };
        if attendance.check_out_time.is_some() {
            return Err(AppError::AlreadyCheckedOut);
        }

        let office = self.office_of(tx, &employee).await?;
        let overtime = overtime_minutes(&self.calendar, &office, check_in_time, now)?;

        let attendance = tx.record_check_out(attendance.id, now, overtime).await?;

        let overtime_payment = if overtime > 0 {
            self.record_overtime_payment(tx, &employee, overtime, now).await?
        } else {
            None
        };

        log::info!(
            "Employee {} checked out on {} at {} with {} overtime minute(s)",
            employee_id,
            today.date,
            self.format_local(now),
            overtime
        );

        Ok(CheckOutOutcome {
            status: attendance.status,
            timestamp: now,
            local_time: self.format_local(now),
            overtime_minutes: overtime,
            overtime_payment,
            attendance,
        })
    }

    /// An open shift from the previous civil day means the checkout crossed midnight.
    async fn missing_check_in(&self, tx: &mut S::Tx, employee_id: Uuid, today: &CivilDay) -> AppResult<AppError> {
        let yesterday = self.calendar.day_start(today.date.pred_opt().unwrap_or(today.date));
        let crossed = tx
            .find_attendance(employee_id, yesterday)
            .await?
            .is_some_and(|previous| previous.check_in_time.is_some() && previous.check_out_time.is_none());
        Ok(if crossed {
            AppError::CrossDayCheckout
        } else {
            AppError::NoCheckIn
        })
    }

    async fn record_overtime_payment(
        &self,
        tx: &mut S::Tx,
        employee: &Employee,
        overtime: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Transaction>> {
        let amount = overtime_pay(overtime, &employee.overtime_rate);
        if amount <= bigdecimal::BigDecimal::from(0) {
            log::debug!(
                "Overtime of {} minute(s) for employee {} rounds to zero, no payment recorded",
                overtime,
                employee.id
            );
            return Ok(None);
        }

        let hours = f64::from(overtime) / 60.0;
        let transaction = tx
            .insert_transaction(NewTransaction {
                employee_id: employee.id,
                amount,
                pay_type: PayType::Overtime,
                date: now,
                description: Some(format!(
                    "Overtime payment for {:.2} hr(s) on {}",
                    hours,
                    self.calendar.civil_date(now)
                )),
            })
            .await?;
        Ok(Some(transaction))
    }

    async fn active_employee(&self, tx: &mut S::Tx, employee_id: Uuid) -> AppResult<Employee> {
        let employee = tx
            .lock_employee(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;
        if !employee.is_active() {
            return Err(AppError::validation(format!("employee {} is not active", employee_id)));
        }
        Ok(employee)
    }

    async fn office_of(&self, tx: &mut S::Tx, employee: &Employee) -> AppResult<Office> {
        tx.find_office(employee.office_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("office {}", employee.office_id)))
    }

    fn format_local(&self, instant: DateTime<Utc>) -> String {
        self.calendar
            .local_datetime(instant)
            .format("%d/%m/%Y, %I:%M:%S %p")
            .to_string()
    }
}

fn summarize_day(
    today: &CivilDay,
    employees: &[Employee],
    rows: &[Attendance],
    pending: Vec<Leave>,
) -> DashboardSummary {
    let mut summary = DashboardSummary {
        date: today.date.format("%Y-%m-%d").to_string(),
        total_employees: employees.len(),
        present: 0,
        late: 0,
        absent: 0,
        on_leave: 0,
        holiday: 0,
        absentees: Vec::new(),
        pending_leaves: Vec::new(),
    };

    for employee in employees {
        let Some(row) = rows.iter().find(|a| a.employee_id == employee.id) else {
            continue;
        };
        match row.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::Absent => {
                summary.absent += 1;
                summary.absentees.push(EmployeeRef::from(employee));
            }
            AttendanceStatus::Leave => summary.on_leave += 1,
            AttendanceStatus::Holiday => summary.holiday += 1,
        }
    }

    summary.pending_leaves = pending
        .into_iter()
        .filter(|leave| employees.iter().any(|e| e.id == leave.employee_id))
        .take(DASHBOARD_PENDING_LEAVES)
        .collect();

    summary
}
