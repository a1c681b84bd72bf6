pub mod config;
pub mod database;
pub mod error;
pub mod services;

use std::sync::Arc;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};

use database::Store;
use services::{
    AttendancePolicy, AttendanceService, CivilCalendar, Clock, HolidayService, LeaveService, LedgerService,
    ReconciliationService,
};

/// Every engine service wired over one store and one clock.
pub struct Engine<S: Store> {
    pub attendance: AttendanceService<S>,
    pub leave: LeaveService<S>,
    pub reconciliation: ReconciliationService<S>,
    pub ledger: LedgerService<S>,
    pub holidays: HolidayService<S>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, calendar: CivilCalendar, policy: AttendancePolicy) -> Self {
        Self {
            attendance: AttendanceService::new(store.clone(), clock.clone(), calendar, policy),
            leave: LeaveService::new(store.clone(), clock.clone(), calendar),
            reconciliation: ReconciliationService::new(store.clone(), clock.clone(), calendar),
            ledger: LedgerService::new(store.clone(), clock, calendar),
            holidays: HolidayService::new(store, calendar),
        }
    }

    pub fn from_config(store: S, clock: Arc<dyn Clock>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(store, clock, config.calendar()?, config.attendance_policy()))
    }
}
