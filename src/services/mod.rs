use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod attendance;
pub mod civil_day;
pub mod clock;
pub mod holiday;
pub mod leave;
pub mod ledger;
pub mod reconciliation;

pub use attendance::{AttendancePolicy, AttendanceService};
pub use civil_day::CivilCalendar;
pub use clock::{Clock, FixedClock, SystemClock};
pub use holiday::HolidayService;
pub use leave::{LeaveDecision, LeaveService};
pub use ledger::{LedgerScope, LedgerService};
pub use reconciliation::ReconciliationService;

/// Which employees an office-level operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "scope", content = "officeId")]
pub enum OfficeScope {
    All,
    Office(Uuid),
}

impl OfficeScope {
    pub fn office_id(&self) -> Option<Uuid> {
        match self {
            OfficeScope::All => None,
            OfficeScope::Office(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for OfficeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfficeScope::All => write!(f, "all offices"),
            OfficeScope::Office(id) => write!(f, "office {}", id),
        }
    }
}
