use thiserror::Error;

/// Coarse classification callers use to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Consistency,
    Storage,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Employee already checked in today")]
    AlreadyCheckedIn,

    #[error("Employee already checked out today")]
    AlreadyCheckedOut,

    #[error("No check-in found for today")]
    NoCheckIn,

    #[error("Check-out falls on a different civil day than the check-in")]
    CrossDayCheckout,

    #[error("Requested leave overlaps an existing leave")]
    OverlappingLeave,

    #[error("Leave cannot start or end on a holiday")]
    HolidayBoundary,

    #[error("Requested range contains no working days")]
    NoWorkingDays,

    #[error("Salary has already been settled for this employee in the current month")]
    DuplicateSalary,

    #[error("Reconciliation has already been processed for today")]
    AlreadyProcessed,

    #[error("Leave has already been {0}")]
    LeaveAlreadyDecided(String),

    #[error("Insufficient leave balance: {needed} day(s) needed, {available} available")]
    InsufficientLeaveBalance { needed: i32, available: i32 },

    #[error("A holiday is already declared on {0}")]
    DuplicateHoliday(chrono::NaiveDate),

    #[error("Consistency fault: {0}")]
    Consistency(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error{}", .0.as_ref().map_or("".to_string(), |s| format!(": {}", s)))]
    Internal(Option<String>),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_)
            | AppError::NoCheckIn
            | AppError::CrossDayCheckout
            | AppError::HolidayBoundary
            | AppError::NoWorkingDays => ErrorKind::Validation,
            AppError::AlreadyCheckedIn
            | AppError::AlreadyCheckedOut
            | AppError::OverlappingLeave
            | AppError::DuplicateSalary
            | AppError::AlreadyProcessed
            | AppError::LeaveAlreadyDecided(_)
            | AppError::InsufficientLeaveBalance { .. }
            | AppError::DuplicateHoliday(_) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Consistency(_) => ErrorKind::Consistency,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Storage,
        }
    }

    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, AppError::Consistency(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(Some(message.into()))
    }
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                log::warn!("Unique constraint violated: {}", db_err);
                AppError::Consistency(db_err.message().to_string())
            }
            _ => {
                log::error!("Database error: {}", error);
                AppError::Database(error)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        log::error!("Anyhow error: {}", error);

        match error.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => AppError::from(sqlx_err),
            Err(original_error) => AppError::Internal(Some(original_error.to_string())),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
