use std::collections::HashSet;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use paytrack::AppError;
use paytrack::database::models::{AttendanceOrigin, AttendanceStatus, DayState, EmployeeStatus, PayType};
use paytrack::services::OfficeScope;

mod common;
use common::{TestEngine, date, dec, monday};

#[tokio::test]
async fn test_check_in_lateness_threshold() {
    let t = TestEngine::new().await;
    let early = t.employee().await;
    let late = t.employee().await;

    t.at(monday(), 9, 29);
    let outcome = t.engine.attendance.check_in(early.id).await.unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Present);
    assert_eq!(outcome.attendance.origin, AttendanceOrigin::CheckIn);
    assert_eq!(outcome.attendance.date, t.calendar.day_start(monday()));
    assert_eq!(outcome.local_time, "10/03/2025, 09:29:00 AM");

    t.at(monday(), 9, 31);
    let outcome = t.engine.attendance.check_in(late.id).await.unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Late);
}

#[tokio::test]
async fn test_check_in_exactly_at_threshold_is_present() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    t.at(monday(), 9, 30);
    let outcome = t.engine.attendance.check_in(employee.id).await.unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Present);
}

#[tokio::test]
async fn test_second_check_in_same_day_fails() {
    let t = TestEngine::new().await;
    let employees = [t.employee().await, t.employee().await, t.employee().await];
    let days = [monday(), date(2025, 3, 11), date(2025, 3, 31), date(2025, 4, 1)];

    for day in days {
        for employee in &employees {
            // First and last minute of the same local day
            t.at(day, 0, 0);
            t.engine.attendance.check_in(employee.id).await.unwrap();

            t.at(day, 23, 59);
            let err = t.engine.attendance.check_in(employee.id).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyCheckedIn), "{} on {}", employee.id, day);
        }
    }

    let state = t.store.snapshot().await;
    assert_eq!(state.attendance.len(), days.len() * employees.len());
    let keys: HashSet<_> = state.attendance.iter().map(|row| (row.employee_id, row.date)).collect();
    assert_eq!(keys.len(), state.attendance.len());
    for row in &state.attendance {
        assert!(days.iter().any(|day| t.calendar.day_start(*day) == row.date));
    }
}

#[tokio::test]
async fn test_check_out_without_check_in_fails() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    t.at(monday(), 18, 0);
    let err = t.engine.attendance.check_out(employee.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoCheckIn));
}

#[tokio::test]
async fn test_check_out_records_overtime_payment() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    t.at(monday(), 9, 0);
    t.engine.attendance.check_in(employee.id).await.unwrap();

    t.at(monday(), 19, 1);
    let outcome = t.engine.attendance.check_out(employee.id).await.unwrap();
    assert_eq!(outcome.overtime_minutes, 61);
    assert_eq!(outcome.attendance.day_state(), DayState::CheckedOut);

    let payment = outcome.overtime_payment.expect("overtime payment");
    assert_eq!(payment.pay_type, PayType::Overtime);
    assert_eq!(payment.amount, dec("101.67"));

    let state = t.store.snapshot().await;
    assert_eq!(state.transactions.len(), 1);
    assert_eq!(state.attendance[0].overtime_minutes, 61);
}

#[tokio::test]
async fn test_check_out_at_or_before_office_close_has_no_overtime() {
    let t = TestEngine::new().await;
    let on_time = t.employee().await;
    let early = t.employee().await;

    t.at(monday(), 9, 0);
    t.engine.attendance.check_in(on_time.id).await.unwrap();
    t.engine.attendance.check_in(early.id).await.unwrap();

    t.at(monday(), 17, 59);
    let outcome = t.engine.attendance.check_out(early.id).await.unwrap();
    assert_eq!(outcome.overtime_minutes, 0);
    assert!(outcome.overtime_payment.is_none());

    t.at(monday(), 18, 0);
    let outcome = t.engine.attendance.check_out(on_time.id).await.unwrap();
    assert_eq!(outcome.overtime_minutes, 0);
    assert!(outcome.overtime_payment.is_none());

    assert!(t.store.snapshot().await.transactions.is_empty());
}

#[tokio::test]
async fn test_second_check_out_fails() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    t.at(monday(), 9, 0);
    t.engine.attendance.check_in(employee.id).await.unwrap();
    t.at(monday(), 19, 0);
    t.engine.attendance.check_out(employee.id).await.unwrap();

    t.at(monday(), 20, 0);
    let err = t.engine.attendance.check_out(employee.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyCheckedOut));
    assert_eq!(t.store.snapshot().await.transactions.len(), 1);
}

#[tokio::test]
async fn test_check_out_after_midnight_is_cross_day() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    t.at(monday(), 23, 50);
    t.engine.attendance.check_in(employee.id).await.unwrap();

    t.at(monday().succ_opt().unwrap(), 0, 10);
    let err = t.engine.attendance.check_out(employee.id).await.unwrap_err();
    assert!(matches!(err, AppError::CrossDayCheckout));

    let state = t.store.snapshot().await;
    assert!(state.attendance[0].check_out_time.is_none());
}

#[tokio::test]
async fn test_check_out_after_midnight_onto_holiday_is_cross_day() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;
    let tuesday = monday().succ_opt().unwrap();

    t.at(monday(), 23, 50);
    t.engine.attendance.check_in(employee.id).await.unwrap();
    t.engine.holidays.declare_holiday(tuesday, "Festival").await.unwrap();

    t.at(tuesday, 0, 10);
    let err = t.engine.attendance.check_out(employee.id).await.unwrap_err();
    assert!(matches!(err, AppError::CrossDayCheckout));

    // Without an open shift the holiday row is simply not closable
    let rested = t.employee().await;
    t.engine.holidays.declare_holiday(date(2025, 3, 12), "Second festival").await.unwrap();
    t.at(date(2025, 3, 12), 10, 0);
    let err = t.engine.attendance.check_out(rested.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoCheckIn));
}

#[tokio::test]
async fn test_inactive_and_unknown_employees_are_rejected() {
    let t = TestEngine::new().await;
    let inactive = t.employee_with(|seed| seed.status = EmployeeStatus::Inactive).await;

    t.at(monday(), 9, 0);
    let err = t.engine.attendance.check_in(inactive.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = t.engine.attendance.check_in(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_attendance_for_month_lists_days_in_order() {
    let t = TestEngine::new().await;
    let employee = t.employee().await;

    for day in [monday(), monday().succ_opt().unwrap()] {
        t.at(day, 9, 0);
        t.engine.attendance.check_in(employee.id).await.unwrap();
    }

    let rows = t
        .engine
        .attendance
        .attendance_for_month(employee.id, 3, 2025)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].date < rows[1].date);

    let future = t
        .engine
        .attendance
        .attendance_for_month(employee.id, 4, 2025)
        .await
        .unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn test_today_dashboard_counts_by_status() {
    let t = TestEngine::new().await;
    let present = t.employee().await;
    let late = t.employee().await;
    let absent = t.employee().await;
    let branch = t.second_office().await;
    t.employee_with(|seed| seed.office_id = branch.id).await;

    t.at(monday(), 9, 0);
    t.engine.attendance.check_in(present.id).await.unwrap();
    t.at(monday(), 10, 0);
    t.engine.attendance.check_in(late.id).await.unwrap();

    t.at(monday(), 23, 0);
    t.engine
        .reconciliation
        .run(OfficeScope::Office(t.office.id))
        .await
        .unwrap();

    let dashboard = t
        .engine
        .attendance
        .today_dashboard(OfficeScope::Office(t.office.id))
        .await
        .unwrap();
    assert_eq!(dashboard.date, "2025-03-10");
    assert_eq!(dashboard.total_employees, 3);
    assert_eq!((dashboard.present, dashboard.late, dashboard.absent), (1, 1, 1));
    assert_eq!(dashboard.absentees.len(), 1);
    assert_eq!(dashboard.absentees[0].id, absent.id);

    let everyone = t.engine.attendance.today_dashboard(OfficeScope::All).await.unwrap();
    assert_eq!(everyone.total_employees, 4);
}
