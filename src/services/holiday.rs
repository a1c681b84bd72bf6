use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{AttendanceOrigin, AttendanceStatus, Holiday, NewAttendance, NewHoliday};
use crate::database::store::{Store, StoreTx};
use crate::database::transaction::{finish, retry_on_conflict};
use crate::error::{AppError, AppResult};
use crate::services::civil_day::{CivilCalendar, month_name};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayDeclaration {
    pub holiday: Holiday,
    pub marked_employees: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayRetraction {
    pub holiday: Holiday,
    pub removed_attendance: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayMonth {
    pub month: u32,
    pub month_name: &'static str,
    pub holidays: Vec<Holiday>,
}

pub struct HolidayService<S: Store> {
    store: S,
    calendar: CivilCalendar,
}

impl<S: Store> HolidayService<S> {
    pub fn new(store: S, calendar: CivilCalendar) -> Self {
        Self { store, calendar }
    }

    /// Records the holiday and gives every active employee without a row that day
    /// a HOLIDAY attendance row.
    pub async fn declare_holiday(&self, date: NaiveDate, description: &str) -> AppResult<HolidayDeclaration> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::validation("holiday description is required"));
        }
        retry_on_conflict("declare-holiday", || self.try_declare(date, description)).await
    }

    /// Removes the holiday and the HOLIDAY rows it created.
    pub async fn retract_holiday(&self, holiday_id: Uuid) -> AppResult<HolidayRetraction> {
        let mut tx = self.store.begin().await?;
        let result: AppResult<HolidayRetraction> = async {
            let holiday = tx
                .find_holiday(holiday_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("holiday {}", holiday_id)))?;

            let removed_attendance = tx
                .delete_attendance_by_origin(self.calendar.day_start(holiday.date), AttendanceOrigin::Holiday)
                .await?;
            tx.delete_holiday(holiday.id).await?;

            log::info!(
                "Retracted holiday on {} and removed {} attendance row(s)",
                holiday.date,
                removed_attendance
            );
            Ok(HolidayRetraction {
                holiday,
                removed_attendance,
            })
        }
        .await;
        finish(tx, result).await
    }

    /// Holidays of `year` grouped by month; months without holidays are omitted.
    pub async fn holidays_by_year(&self, year: i32) -> AppResult<Vec<HolidayMonth>> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| AppError::validation(format!("year out of range: {}", year)))?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| AppError::validation(format!("year out of range: {}", year)))?;

        let mut tx = self.store.begin().await?;
        let result = tx.list_holidays_between(first, last).await;
        let holidays = finish(tx, result).await?;

        let mut months: Vec<HolidayMonth> = Vec::new();
        for holiday in holidays {
            let month = holiday.date.month();
            match months.last_mut() {
                Some(group) if group.month == month => group.holidays.push(holiday),
                _ => months.push(HolidayMonth {
                    month,
                    month_name: month_name(month),
                    holidays: vec![holiday],
                }),
            }
        }
        Ok(months)
    }

    async fn try_declare(&self, date: NaiveDate, description: &str) -> AppResult<HolidayDeclaration> {
        let day = self.calendar.day(date);
        let mut tx = self.store.begin().await?;
        let result: AppResult<HolidayDeclaration> = async {
            if !tx.list_holidays_between(date, date).await?.is_empty() {
                return Err(AppError::DuplicateHoliday(date));
            }

            let holiday = tx
                .insert_holiday(NewHoliday {
                    date,
                    description: description.to_string(),
                })
                .await?;

            let employees = tx.list_active_employees(None).await?;
            let mut marked_employees = 0;
            for employee in employees {
                let row = tx
                    .try_insert_attendance(NewAttendance::terminal(
                        employee.id,
                        day.start,
                        AttendanceStatus::Holiday,
                        AttendanceOrigin::Holiday,
                    ))
                    .await?;
                if row.is_some() {
                    marked_employees += 1;
                }
            }

            log::info!(
                "Declared holiday on {} ({}), marked {} employee(s)",
                date,
                holiday.description,
                marked_employees
            );
            Ok(HolidayDeclaration {
                holiday,
                marked_employees,
            })
        }
        .await;
        finish(tx, result).await
    }
}
