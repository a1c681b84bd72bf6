#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;

use paytrack::database::memory::{EmployeeSeed, MemoryTx};
use paytrack::database::models::{
    Attendance, AttendanceOrigin, Employee, EmployeeStatus, Holiday, Leave, LeaveStatus, NewAttendance,
    NewHoliday, NewLeave, NewTransaction, Office, Transaction,
};
use paytrack::database::{MemoryStore, Store, StoreTx, TransactionFilter};
use paytrack::{AppResult, Engine};
use paytrack::services::{AttendancePolicy, CivilCalendar, Clock, FixedClock};

/// Monday 10 March 2025
pub fn monday() -> NaiveDate {
    date(2025, 3, 10)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

/// UTC instant of `h:m` IST on `day`.
pub fn ist(day: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    CivilCalendar::ist().day_start(day) + Duration::hours(h.into()) + Duration::minutes(m.into())
}

pub struct TestEngine {
    pub store: MemoryStore,
    pub clock: Arc<FixedClock>,
    pub calendar: CivilCalendar,
    pub engine: Engine<MemoryStore>,
    pub office: Office,
}

impl TestEngine {
    /// Fresh store with one 09:00-18:00 IST office, clock at 08:00 IST on [`monday`].
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let calendar = CivilCalendar::ist();
        let clock = Arc::new(FixedClock::new(ist(monday(), 8, 0)));

        // Office hours are stored on an arbitrary date; only the IST time of day matters
        let office = store
            .seed_office(
                "Head Office",
                Utc.with_ymd_and_hms(1970, 1, 1, 3, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(1970, 1, 1, 12, 30, 0).unwrap(),
                60,
            )
            .await;

        let engine = Engine::new(
            store.clone(),
            clock.clone() as Arc<dyn Clock>,
            calendar,
            AttendancePolicy::default(),
        );

        Self {
            store,
            clock,
            calendar,
            engine,
            office,
        }
    }

    pub fn at(&self, day: NaiveDate, h: u32, m: u32) {
        self.clock.set(ist(day, h, m));
    }

    /// Active employee in the default office: salary 31000, overtime 100/hr, 10 days of leave.
    pub async fn employee(&self) -> Employee {
        self.employee_with(|_| {}).await
    }

    pub async fn employee_with(&self, customize: impl FnOnce(&mut EmployeeSeed)) -> Employee {
        let mut seed = EmployeeSeed {
            name: Name().fake(),
            email: SafeEmail().fake(),
            office_id: self.office.id,
            base_salary: dec("31000"),
            overtime_rate: dec("100"),
            leave_balance: 10,
            status: EmployeeStatus::Active,
        };
        customize(&mut seed);
        self.store.seed_employee(seed).await
    }

    /// An engine over the same state whose attendance inserts for `raced` behave as if
    /// another writer got there first.
    pub fn racing_engine(&self, raced: Uuid) -> Engine<RacingStore> {
        Engine::new(
            RacingStore {
                inner: self.store.clone(),
                raced,
            },
            self.clock.clone() as Arc<dyn Clock>,
            self.calendar,
            AttendancePolicy::default(),
        )
    }

    pub async fn second_office(&self) -> Office {
        self.store
            .seed_office(
                "Branch",
                Utc.with_ymd_and_hms(1970, 1, 1, 4, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(1970, 1, 1, 13, 30, 0).unwrap(),
                30,
            )
            .await
    }
}

#[derive(Clone)]
pub struct RacingStore {
    inner: MemoryStore,
    raced: Uuid,
}

pub struct RacingTx {
    inner: MemoryTx,
    raced: Uuid,
}

impl Store for RacingStore {
    type Tx = RacingTx;

    async fn begin(&self) -> AppResult<RacingTx> {
        Ok(RacingTx {
            inner: self.inner.begin().await?,
            raced: self.raced,
        })
    }
}

impl StoreTx for RacingTx {
    async fn commit(self) -> AppResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self) -> AppResult<()> {
        self.inner.rollback().await
    }

    async fn find_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        self.inner.find_employee(id).await
    }

    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        self.inner.lock_employee(id).await
    }

    async fn list_active_employees(&mut self, office_id: Option<Uuid>) -> AppResult<Vec<Employee>> {
        self.inner.list_active_employees(office_id).await
    }

    async fn set_leave_balance(&mut self, employee_id: Uuid, balance: i32) -> AppResult<()> {
        self.inner.set_leave_balance(employee_id, balance).await
    }

    async fn find_office(&mut self, id: Uuid) -> AppResult<Option<Office>> {
        self.inner.find_office(id).await
    }

    async fn lock_batch_scope(&mut self, key: &str) -> AppResult<()> {
        self.inner.lock_batch_scope(key).await
    }

    async fn find_attendance(&mut self, employee_id: Uuid, date: DateTime<Utc>) -> AppResult<Option<Attendance>> {
        self.inner.find_attendance(employee_id, date).await
    }

    async fn list_attendance_for_date(&mut self, date: DateTime<Utc>) -> AppResult<Vec<Attendance>> {
        self.inner.list_attendance_for_date(date).await
    }

    async fn list_attendance_for_employee(
        &mut self,
        employee_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        self.inner.list_attendance_for_employee(employee_id, from, to).await
    }

    async fn try_insert_attendance(&mut self, new: NewAttendance) -> AppResult<Option<Attendance>> {
        if new.employee_id == self.raced {
            return Ok(None);
        }
        self.inner.try_insert_attendance(new).await
    }

    async fn record_check_out(
        &mut self,
        attendance_id: Uuid,
        check_out_time: DateTime<Utc>,
        overtime_minutes: i32,
    ) -> AppResult<Attendance> {
        self.inner
            .record_check_out(attendance_id, check_out_time, overtime_minutes)
            .await
    }

    async fn delete_attendance_by_origin(&mut self, date: DateTime<Utc>, origin: AttendanceOrigin) -> AppResult<u64> {
        self.inner.delete_attendance_by_origin(date, origin).await
    }

    async fn find_leave(&mut self, id: Uuid) -> AppResult<Option<Leave>> {
        self.inner.find_leave(id).await
    }

    async fn list_leaves_for_employee(&mut self, employee_id: Uuid) -> AppResult<Vec<Leave>> {
        self.inner.list_leaves_for_employee(employee_id).await
    }

    async fn list_leaves_by_status(&mut self, status: LeaveStatus, limit: Option<i64>) -> AppResult<Vec<Leave>> {
        self.inner.list_leaves_by_status(status, limit).await
    }

    async fn insert_leave(&mut self, new: NewLeave) -> AppResult<Leave> {
        self.inner.insert_leave(new).await
    }

    async fn set_leave_status(
        &mut self,
        id: Uuid,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
    ) -> AppResult<Leave> {
        self.inner.set_leave_status(id, status, decided_at).await
    }

    async fn find_holiday(&mut self, id: Uuid) -> AppResult<Option<Holiday>> {
        self.inner.find_holiday(id).await
    }

    async fn list_holidays_between(&mut self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Holiday>> {
        self.inner.list_holidays_between(from, to).await
    }

    async fn insert_holiday(&mut self, new: NewHoliday) -> AppResult<Holiday> {
        self.inner.insert_holiday(new).await
    }

    async fn delete_holiday(&mut self, id: Uuid) -> AppResult<()> {
        self.inner.delete_holiday(id).await
    }

    async fn insert_transaction(&mut self, new: NewTransaction) -> AppResult<Transaction> {
        self.inner.insert_transaction(new).await
    }

    async fn list_transactions(&mut self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        self.inner.list_transactions(filter).await
    }
}
