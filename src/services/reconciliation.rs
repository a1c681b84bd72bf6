//! End-of-day sweep giving every unrecorded employee a terminal attendance row.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{
    AttendanceOrigin, AttendanceStatus, Employee, EmployeeRef, LeaveStatus, NewAttendance, Transaction,
};
use crate::database::store::{Store, StoreTx};
use crate::database::transaction::finish;
use crate::error::{AppError, AppResult};
use crate::services::OfficeScope;
use crate::services::civil_day::{CivilCalendar, CivilDay};
use crate::services::clock::Clock;
use crate::services::ledger::append_day_deduction;

/// Runs are serialised globally; a scoped run and an all-offices run touch the same rows.
const BATCH_LOCK_KEY: &str = "paytrack:reconciliation";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ReconciliationOutcome {
    #[serde(rename = "ABSENT")]
    Absent { deduction: Option<Transaction> },
    #[serde(rename = "LEAVE", rename_all = "camelCase")]
    OnLeave { leave_id: Uuid },
    #[serde(rename = "HOLIDAY")]
    Holiday,
    #[serde(rename = "SKIPPED")]
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationEntry {
    pub employee: EmployeeRef,
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub date: String,
    pub scope: OfficeScope,
    pub processed_count: usize,
    pub absent: usize,
    pub on_leave: usize,
    pub holiday: usize,
    pub skipped: usize,
    pub entries: Vec<ReconciliationEntry>,
}

impl ReconciliationSummary {
    fn new(today: &CivilDay, scope: OfficeScope) -> Self {
        Self {
            date: today.date.format("%Y-%m-%d").to_string(),
            scope,
            processed_count: 0,
            absent: 0,
            on_leave: 0,
            holiday: 0,
            skipped: 0,
            entries: Vec::new(),
        }
    }

    fn record(&mut self, employee: &Employee, outcome: ReconciliationOutcome) {
        match outcome {
            ReconciliationOutcome::Absent { .. } => self.absent += 1,
            ReconciliationOutcome::OnLeave { .. } => self.on_leave += 1,
            ReconciliationOutcome::Holiday => self.holiday += 1,
            ReconciliationOutcome::Skipped { .. } => self.skipped += 1,
        }
        if !matches!(outcome, ReconciliationOutcome::Skipped { .. }) {
            self.processed_count += 1;
        }
        self.entries.push(ReconciliationEntry {
            employee: EmployeeRef::from(employee),
            outcome,
        });
    }
}

pub struct ReconciliationService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    calendar: CivilCalendar,
}

impl<S: Store> ReconciliationService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, calendar: CivilCalendar) -> Self {
        Self { store, clock, calendar }
    }

    /// Marks every scoped active employee without a row today as LEAVE, HOLIDAY or
    /// ABSENT (with a one-day deduction). All writes commit together.
    pub async fn run(&self, scope: OfficeScope) -> AppResult<ReconciliationSummary> {
        let today = self.calendar.today(self.clock.now());
        log::info!("Starting reconciliation for {} on {}", scope, today.date);

        let mut tx = self.store.begin().await?;
        let result = self.run_within(&mut tx, scope, &today).await;
        let summary = finish(tx, result).await?;

        log::info!(
            "Reconciliation for {} on {} processed {} employee(s): {} absent, {} on leave, {} holiday, {} skipped",
            scope,
            today.date,
            summary.processed_count,
            summary.absent,
            summary.on_leave,
            summary.holiday,
            summary.skipped
        );
        Ok(summary)
    }

    async fn run_within(
        &self,
        tx: &mut S::Tx,
        scope: OfficeScope,
        today: &CivilDay,
    ) -> AppResult<ReconciliationSummary> {
        tx.lock_batch_scope(BATCH_LOCK_KEY).await?;

        if let OfficeScope::Office(office_id) = scope {
            tx.find_office(office_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("office {}", office_id)))?;
        }

        let employees = tx.list_active_employees(scope.office_id()).await?;
        let rows = tx.list_attendance_for_date(today.start).await?;

        let already_run = rows
            .iter()
            .filter(|row| row.is_bulk_created())
            .any(|row| employees.iter().any(|e| e.id == row.employee_id));
        if already_run {
            log::warn!("Reconciliation for {} on {} already ran", scope, today.date);
            return Err(AppError::AlreadyProcessed);
        }

        let is_holiday = !tx.list_holidays_between(today.date, today.date).await?.is_empty();

        let mut summary = ReconciliationSummary::new(today, scope);
        let remaining = employees
            .iter()
            .filter(|employee| !rows.iter().any(|row| row.employee_id == employee.id));

        for employee in remaining {
            let outcome = self.reconcile_employee(tx, employee, today, is_holiday).await?;
            if let ReconciliationOutcome::Skipped { reason } = &outcome {
                log::warn!("Skipping employee {} during reconciliation: {}", employee.id, reason);
            }
            summary.record(employee, outcome);
        }

        Ok(summary)
    }

    async fn reconcile_employee(
        &self,
        tx: &mut S::Tx,
        employee: &Employee,
        today: &CivilDay,
        is_holiday: bool,
    ) -> AppResult<ReconciliationOutcome> {
        let approved_leave = tx
            .list_leaves_for_employee(employee.id)
            .await?
            .into_iter()
            .find(|leave| leave.status == LeaveStatus::Approved && leave.covers(today.date));

        let status = match (&approved_leave, is_holiday) {
            (Some(_), _) => AttendanceStatus::Leave,
            (None, true) => AttendanceStatus::Holiday,
            (None, false) => AttendanceStatus::Absent,
        };

        let inserted = tx
            .try_insert_attendance(NewAttendance::terminal(
                employee.id,
                today.start,
                status,
                AttendanceOrigin::Reconciliation,
            ))
            .await?;
        if inserted.is_none() {
            return Ok(ReconciliationOutcome::Skipped {
                reason: "attendance was recorded concurrently".to_string(),
            });
        }

        Ok(match (approved_leave, status) {
            (Some(leave), _) => ReconciliationOutcome::OnLeave { leave_id: leave.id },
            (None, AttendanceStatus::Holiday) => ReconciliationOutcome::Holiday,
            _ => {
                let deduction = append_day_deduction(tx, &self.calendar, employee, today.date, "Absent").await?;
                ReconciliationOutcome::Absent { deduction }
            }
        })
    }
}
