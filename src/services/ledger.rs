use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{Employee, EmployeeRef, NewTransaction, PayType, Transaction};
use crate::database::store::{Store, StoreTx, TransactionFilter};
use crate::database::transaction::finish;
use crate::error::{AppError, AppResult};
use crate::services::civil_day::{CivilCalendar, month_name};
use crate::services::clock::Clock;

/// `(minutes / 60) * rate`, rounded half-up to two decimal places.
pub fn overtime_pay(overtime_minutes: i32, overtime_rate: &BigDecimal) -> BigDecimal {
    let raw = BigDecimal::from(overtime_minutes) * overtime_rate.clone() / BigDecimal::from(60);
    raw.with_scale_round(2, RoundingMode::HalfUp)
}

/// One day's salary for a month of `days_in_month` days, rounded half-up to a whole unit.
pub fn daily_deduction(base_salary: &BigDecimal, days_in_month: u32) -> BigDecimal {
    let raw = base_salary.clone() / BigDecimal::from(days_in_month);
    raw.with_scale_round(0, RoundingMode::HalfUp)
}

/// Appends a DEDUCTION for one civil day, priced by that day's own month length.
/// Nothing is written when the price rounds to zero.
pub(crate) async fn append_day_deduction<T: StoreTx>(
    tx: &mut T,
    calendar: &CivilCalendar,
    employee: &Employee,
    day: NaiveDate,
    reason: &str,
) -> AppResult<Option<Transaction>> {
    let days_in_month = calendar.days_in_month(day.year(), day.month())?;
    let amount = daily_deduction(&employee.base_salary, days_in_month);
    if amount <= BigDecimal::from(0) {
        return Ok(None);
    }

    let transaction = tx
        .insert_transaction(NewTransaction {
            employee_id: employee.id,
            amount,
            pay_type: PayType::Deduction,
            date: calendar.day_start(day),
            description: Some(format!("{} on {}", reason, day)),
        })
        .await?;
    Ok(Some(transaction))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerScope {
    Employee(Uuid),
    Office(Uuid),
    All,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeLedger {
    pub employee: EmployeeRef,
    pub base_salary: BigDecimal,
    pub totals: BTreeMap<PayType, BigDecimal>,
    pub by_type: BTreeMap<PayType, Vec<Transaction>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyLedger {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub employees: Vec<EmployeeLedger>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGroup {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearStatement {
    pub year: i32,
    pub base_salary: BigDecimal,
    pub current_month: MonthGroup,
    pub previous_months: Vec<MonthGroup>,
}

pub struct LedgerService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    calendar: CivilCalendar,
}

impl<S: Store> LedgerService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, calendar: CivilCalendar) -> Self {
        Self { store, clock, calendar }
    }

    /// Appends a ledger row dated now. At most one SALARY per employee per civil month.
    pub async fn add_transaction(
        &self,
        employee_id: Uuid,
        amount: BigDecimal,
        pay_type: PayType,
        description: Option<String>,
    ) -> AppResult<Transaction> {
        if amount <= BigDecimal::from(0) {
            return Err(AppError::validation("amount must be greater than zero"));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result: AppResult<Transaction> = async {
            tx.lock_employee(employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;

            if pay_type == PayType::Salary {
                let (year, month) = self.calendar.year_month(now);
                let month = self.calendar.month_range(year, month)?;

                let existing = tx
                    .list_transactions(TransactionFilter {
                        employee_ids: Some(vec![employee_id]),
                        pay_type: Some(PayType::Salary),
                        from: Some(month.start),
                        to: Some(month.end),
                    })
                    .await?;
                if !existing.is_empty() {
                    return Err(AppError::DuplicateSalary);
                }
            }

            let transaction = tx
                .insert_transaction(NewTransaction {
                    employee_id,
                    amount,
                    pay_type,
                    date: now,
                    description: description.filter(|d| !d.trim().is_empty()),
                })
                .await?;

            log::info!(
                "Recorded {} of {} for employee {}",
                transaction.pay_type,
                transaction.amount,
                employee_id
            );
            Ok(transaction)
        }
        .await;
        finish(tx, result).await
    }

    /// Transactions of one civil month grouped by employee, then by pay type.
    /// The current month is read up to now only.
    pub async fn monthly_ledger(&self, scope: LedgerScope, month: u32, year: i32) -> AppResult<MonthlyLedger> {
        let range = self.calendar.month_bounds(year, month, self.clock.now())?;
        let mut tx = self.store.begin().await?;
        let result: AppResult<MonthlyLedger> = async {
            let mut ledger = MonthlyLedger {
                year,
                month,
                month_name: month_name(month),
                employees: Vec::new(),
            };

            let employee_ids = match scope {
                LedgerScope::Employee(id) => {
                    tx.find_employee(id)
                        .await?
                        .ok_or_else(|| AppError::not_found(format!("employee {}", id)))?;
                    Some(vec![id])
                }
                LedgerScope::Office(office_id) => {
                    tx.find_office(office_id)
                        .await?
                        .ok_or_else(|| AppError::not_found(format!("office {}", office_id)))?;
                    let ids: Vec<Uuid> = tx
                        .list_active_employees(Some(office_id))
                        .await?
                        .into_iter()
                        .map(|e| e.id)
                        .collect();
                    Some(ids)
                }
                LedgerScope::All => None,
            };

            if range.is_empty() || employee_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
                return Ok(ledger);
            }

            let transactions = tx
                .list_transactions(TransactionFilter {
                    employee_ids,
                    pay_type: None,
                    from: Some(range.start),
                    to: Some(range.end),
                })
                .await?;

            for transaction in transactions {
                let position = match ledger
                    .employees
                    .iter()
                    .position(|e| e.employee.id == transaction.employee_id)
                {
                    Some(position) => position,
                    None => {
                        let employee = tx.find_employee(transaction.employee_id).await?.ok_or_else(|| {
                            AppError::Consistency(format!(
                                "transaction {} references missing employee {}",
                                transaction.id, transaction.employee_id
                            ))
                        })?;
                        ledger.employees.push(EmployeeLedger {
                            employee: EmployeeRef::from(&employee),
                            base_salary: employee.base_salary.clone(),
                            totals: BTreeMap::new(),
                            by_type: BTreeMap::new(),
                        });
                        ledger.employees.len() - 1
                    }
                };

                let entry = &mut ledger.employees[position];
                let total = entry
                    .totals
                    .entry(transaction.pay_type)
                    .or_insert_with(|| BigDecimal::from(0));
                *total += transaction.amount.clone();
                entry
                    .by_type
                    .entry(transaction.pay_type)
                    .or_default()
                    .push(transaction);
            }

            Ok(ledger)
        }
        .await;
        finish(tx, result).await
    }

    /// The whole current civil month on its own, plus the rest of `year` grouped by month.
    /// Rows dated later this month, such as unpaid leave deductions, stay in the current month.
    pub async fn employee_statement(&self, employee_id: Uuid, year: i32) -> AppResult<YearStatement> {
        let now = self.clock.now();
        let (current_year, current_month) = self.calendar.year_month(now);
        let year_range = self.calendar.year_bounds(year)?;
        let current_range = self.calendar.month_range(current_year, current_month)?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<YearStatement> = async {
            let employee = tx
                .find_employee(employee_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("employee {}", employee_id)))?;

            let current = tx
                .list_transactions(TransactionFilter {
                    employee_ids: Some(vec![employee_id]),
                    pay_type: None,
                    from: Some(current_range.start),
                    to: Some(current_range.end),
                })
                .await?;

            let requested = tx
                .list_transactions(TransactionFilter {
                    employee_ids: Some(vec![employee_id]),
                    pay_type: None,
                    from: Some(year_range.start),
                    to: Some(year_range.end),
                })
                .await?;

            let mut previous_months: Vec<MonthGroup> = Vec::new();
            for transaction in requested {
                let (t_year, t_month) = self.calendar.year_month(transaction.date);
                if (t_year, t_month) == (current_year, current_month) {
                    continue;
                }
                match previous_months
                    .iter_mut()
                    .find(|g| g.year == t_year && g.month == t_month)
                {
                    Some(group) => group.transactions.push(transaction),
                    None => previous_months.push(MonthGroup {
                        year: t_year,
                        month: t_month,
                        month_name: month_name(t_month),
                        transactions: vec![transaction],
                    }),
                }
            }

            Ok(YearStatement {
                year,
                base_salary: employee.base_salary,
                current_month: MonthGroup {
                    year: current_year,
                    month: current_month,
                    month_name: month_name(current_month),
                    transactions: current,
                },
                previous_months,
            })
        }
        .await;
        finish(tx, result).await
    }
}
