use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Employee, Leave, LeaveStatus, LeaveType, NewLeave};
use crate::database::store::{Store, StoreTx};
use crate::database::transaction::{finish, retry_on_conflict};
use crate::error::{AppError, AppResult};
use crate::services::civil_day::{CivilCalendar, days_inclusive};
use crate::services::clock::Clock;
use crate::services::ledger::append_day_deduction;

const SUMMARY_DECIDED_LIMIT: i64 = 10;

/// One contiguous run of working days with a single pay type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePlanSegment {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub total_days: i32,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveDecision {
    Approved,
    Rejected,
}

impl From<LeaveDecision> for LeaveStatus {
    fn from(decision: LeaveDecision) -> Self {
        match decision {
            LeaveDecision::Approved => LeaveStatus::Approved,
            LeaveDecision::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSummary {
    pub approved: Vec<Leave>,
    pub rejected: Vec<Leave>,
    pub pending: Vec<Leave>,
}

/// Splits `[from, to]` into at most one PAID and one UNPAID segment.
///
/// Holidays are removed from the working-day set; the first `balance` working
/// days are paid and the rest unpaid. A holiday on either boundary is rejected.
pub fn plan_leave(
    from: NaiveDate,
    to: NaiveDate,
    holidays: &[NaiveDate],
    balance: i32,
) -> AppResult<Vec<LeavePlanSegment>> {
    if from > to {
        return Err(AppError::validation(format!("leave starts {} after it ends {}", from, to)));
    }
    if holidays.contains(&from) || holidays.contains(&to) {
        return Err(AppError::HolidayBoundary);
    }

    let working: Vec<NaiveDate> = days_inclusive(from, to)
        .filter(|day| !holidays.contains(day))
        .collect();
    if working.is_empty() {
        return Err(AppError::NoWorkingDays);
    }

    let paid_days = usize::try_from(balance.max(0)).unwrap_or(0).min(working.len());
    let (paid, unpaid) = working.split_at(paid_days);

    Ok([(paid, LeaveType::Paid), (unpaid, LeaveType::Unpaid)]
        .into_iter()
        .filter_map(|(days, leave_type)| segment(days, leave_type))
        .collect())
}

fn segment(days: &[NaiveDate], leave_type: LeaveType) -> Option<LeavePlanSegment> {
    let (first, last) = (days.first()?, days.last()?);
    Some(LeavePlanSegment {
        from_date: *first,
        to_date: *last,
        total_days: days.len() as i32,
        leave_type,
    })
}

pub struct LeaveService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    calendar: CivilCalendar,
}

impl<S: Store> LeaveService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, calendar: CivilCalendar) -> Self {
        Self { store, clock, calendar }
    }

    /// Stores the planned segments as PENDING. The balance is left untouched.
    pub async fn apply_leave(
        &self,
        employee_id: Uuid,
        reason: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<Leave>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("leave reason is required"));
        }
        if from > to {
            return Err(AppError::validation(format!("leave starts {} after it ends {}", from, to)));
        }

        retry_on_conflict("apply-leave", || self.try_apply_leave(employee_id, reason, from, to)).await
    }

    pub async fn decide(&self, leave_id: Uuid, decision: LeaveDecision) -> AppResult<Leave> {
        retry_on_conflict("decide-leave", || self.try_decide(leave_id, decision)).await
    }

    pub async fn approve_leave(&self, leave_id: Uuid) -> AppResult<Leave> {
        self.decide(leave_id, LeaveDecision::Approved).await
    }

    pub async fn reject_leave(&self, leave_id: Uuid) -> AppResult<Leave> {
        self.decide(leave_id, LeaveDecision::Rejected).await
    }

    /// Latest decided leaves of each kind and every pending request, newest first.
    pub async fn leave_summary(&self) -> AppResult<LeaveSummary> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<LeaveSummary> = async {
            Ok(LeaveSummary {
                approved: tx
                    .list_leaves_by_status(LeaveStatus::Approved, Some(SUMMARY_DECIDED_LIMIT))
                    .await?,
                rejected: tx
                    .list_leaves_by_status(LeaveStatus::Rejected, Some(SUMMARY_DECIDED_LIMIT))
                    .await?,
                pending: tx.list_leaves_by_status(LeaveStatus::Pending, None).await?,
            })
        }
        .await;
        finish(tx, result).await
    }

    pub async fn leaves_for_employee(&self, employee_id: Uuid) -> AppResult<Vec<Leave>> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<Vec<Leave>> = async {
            tx.find_employee(employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;
            tx.list_leaves_for_employee(employee_id).await
        }
        .await;
        finish(tx, result).await
    }

    async fn try_apply_leave(
        &self,
        employee_id: Uuid,
        reason: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<Leave>> {
        let apply_date = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result: AppResult<Vec<Leave>> = async {
            let employee = active_employee(&mut tx, employee_id).await?;

            let overlapping = tx
                .list_leaves_for_employee(employee_id)
                .await?
                .into_iter()
                .filter(|leave| leave.status != LeaveStatus::Rejected)
                .any(|leave| leave.overlaps(from, to));
            if overlapping {
                return Err(AppError::OverlappingLeave);
            }

            let holidays: Vec<NaiveDate> = tx
                .list_holidays_between(from, to)
                .await?
                .into_iter()
                .map(|holiday| holiday.date)
                .collect();
            let plan = plan_leave(from, to, &holidays, employee.leave_balance)?;

            let mut leaves = Vec::with_capacity(plan.len());
            for segment in plan {
                let leave = tx
                    .insert_leave(NewLeave {
                        employee_id,
                        reason: reason.to_string(),
                        from_date: segment.from_date,
                        to_date: segment.to_date,
                        total_days: segment.total_days,
                        leave_type: segment.leave_type,
                        apply_date,
                    })
                    .await?;
                leaves.push(leave);
            }

            log::info!(
                "Employee {} applied for leave {} to {} as {} segment(s) against a balance of {}",
                employee_id,
                from,
                to,
                leaves.len(),
                employee.leave_balance
            );
            Ok(leaves)
        }
        .await;
        finish(tx, result).await
    }

    async fn try_decide(&self, leave_id: Uuid, decision: LeaveDecision) -> AppResult<Leave> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result: AppResult<Leave> = async {
            let leave = tx
                .find_leave(leave_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("leave {}", leave_id)))?;
            let employee = tx
                .lock_employee(leave.employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {}", leave.employee_id)))?;

            // Re-read under the employee lock so two deciders cannot both see PENDING
            let leave = tx
                .find_leave(leave_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("leave {}", leave_id)))?;
            if !leave.is_pending() {
                return Err(AppError::LeaveAlreadyDecided(leave.status.to_string()));
            }

            if decision == LeaveDecision::Approved {
                match leave.leave_type {
                    LeaveType::Paid => self.consume_balance(&mut tx, &employee, &leave).await?,
                    LeaveType::Unpaid => self.deduct_unpaid_days(&mut tx, &employee, &leave).await?,
                }
            }

            let decided = tx.set_leave_status(leave_id, decision.into(), now).await?;
            log::info!(
                "Leave {} for employee {} marked {}",
                leave_id,
                leave.employee_id,
                decided.status
            );
            Ok(decided)
        }
        .await;
        finish(tx, result).await
    }

    async fn consume_balance(&self, tx: &mut S::Tx, employee: &Employee, leave: &Leave) -> AppResult<()> {
        if employee.leave_balance < leave.total_days {
            return Err(AppError::InsufficientLeaveBalance {
                needed: leave.total_days,
                available: employee.leave_balance,
            });
        }
        let remaining = employee.leave_balance - leave.total_days;
        tx.set_leave_balance(employee.id, remaining).await?;
        log::debug!(
            "Leave balance for employee {} reduced from {} to {}",
            employee.id,
            employee.leave_balance,
            remaining
        );
        Ok(())
    }

    /// One DEDUCTION per calendar day of the leave, each priced by its own month length.
    async fn deduct_unpaid_days(&self, tx: &mut S::Tx, employee: &Employee, leave: &Leave) -> AppResult<()> {
        let mut written = 0;
        for day in days_inclusive(leave.from_date, leave.to_date) {
            if append_day_deduction(tx, &self.calendar, employee, day, "Unpaid leave")
                .await?
                .is_some()
            {
                written += 1;
            }
        }
        log::debug!(
            "Wrote {} unpaid leave deduction(s) for employee {} on leave {}",
            written,
            employee.id,
            leave.id
        );
        Ok(())
    }
}

async fn active_employee<T: StoreTx>(tx: &mut T, employee_id: Uuid) -> AppResult<Employee> {
    let employee = tx
        .lock_employee(employee_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;
    if !employee.is_active() {
        return Err(AppError::validation(format!("employee {} is not active", employee_id)));
    }
    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn total(plan: &[LeavePlanSegment]) -> i32 {
        plan.iter().map(|s| s.total_days).sum()
    }

    #[test]
    fn working_days_exclude_embedded_holidays() {
        let start = d(2025, 3, 3);
        for length in [1u64, 7, 30] {
            let end = start + chrono::Days::new(length - 1);
            let mut embedded = Vec::new();
            for holidays in 0..=2usize {
                if length < 3 && holidays > 0 {
                    continue;
                }
                let plan = plan_leave(start, end, &embedded, 100).unwrap();
                assert_eq!(total(&plan), length as i32 - holidays as i32, "length {} holidays {}", length, holidays);
                embedded.push(start + chrono::Days::new(holidays as u64 + 1));
            }
        }
    }

    #[test]
    fn balance_splits_into_paid_then_unpaid() {
        let plan = plan_leave(d(2025, 3, 3), d(2025, 3, 7), &[], 3).unwrap();
        assert_eq!(
            plan,
            vec![
                LeavePlanSegment {
                    from_date: d(2025, 3, 3),
                    to_date: d(2025, 3, 5),
                    total_days: 3,
                    leave_type: LeaveType::Paid,
                },
                LeavePlanSegment {
                    from_date: d(2025, 3, 6),
                    to_date: d(2025, 3, 7),
                    total_days: 2,
                    leave_type: LeaveType::Unpaid,
                },
            ]
        );
    }

    #[test]
    fn split_follows_working_day_order() {
        // 4th is a holiday, so the two paid days are the 3rd and 5th
        let plan = plan_leave(d(2025, 3, 3), d(2025, 3, 7), &[d(2025, 3, 4)], 2).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].from_date, plan[0].to_date, plan[0].total_days), (d(2025, 3, 3), d(2025, 3, 5), 2));
        assert_eq!((plan[1].from_date, plan[1].to_date, plan[1].total_days), (d(2025, 3, 6), d(2025, 3, 7), 2));
    }

    #[test]
    fn zero_or_negative_balance_is_fully_unpaid() {
        for balance in [0, -2] {
            let plan = plan_leave(d(2025, 3, 3), d(2025, 3, 4), &[], balance).unwrap();
            assert_eq!(plan.len(), 1);
            assert_eq!(plan[0].leave_type, LeaveType::Unpaid);
            assert_eq!(plan[0].total_days, 2);
        }
    }

    #[test]
    fn sufficient_balance_is_fully_paid() {
        let plan = plan_leave(d(2025, 3, 3), d(2025, 3, 4), &[], 2).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].leave_type, LeaveType::Paid);
    }

    #[test]
    fn holiday_on_boundary_is_rejected() {
        let err = plan_leave(d(2025, 3, 3), d(2025, 3, 7), &[d(2025, 3, 7)], 5).unwrap_err();
        assert!(matches!(err, AppError::HolidayBoundary));
        let err = plan_leave(d(2025, 3, 3), d(2025, 3, 7), &[d(2025, 3, 3)], 5).unwrap_err();
        assert!(matches!(err, AppError::HolidayBoundary));
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let err = plan_leave(d(2025, 3, 7), d(2025, 3, 3), &[], 5).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
