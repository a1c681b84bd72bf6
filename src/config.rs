use anyhow::{Context, Result};
use chrono::Duration;
use std::env;
use uuid::Uuid;

use crate::services::civil_day::CivilCalendar;
use crate::services::attendance::AttendancePolicy;
use crate::services::OfficeScope;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub environment: String,
    pub utc_offset_minutes: i32,
    pub late_grace_minutes: i64,
    pub reconcile_office: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    /// This is useful for testing where you want to control the environment directly
    pub fn from_env_only() -> Result<Self> {
        let config = Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://@localhost:5432/paytrack".to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            utc_offset_minutes: env::var("UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "330".to_string())
                .parse()
                .context("UTC_OFFSET_MINUTES must be an integer")?,
            late_grace_minutes: env::var("LATE_GRACE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("LATE_GRACE_MINUTES must be an integer")?,
            reconcile_office: env::var("RECONCILE_OFFICE").unwrap_or_else(|_| "all".to_string()),
        };

        // Validate eagerly so a bad deployment fails at startup
        config.calendar()?;
        config.reconcile_scope()?;

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn calendar(&self) -> Result<CivilCalendar> {
        CivilCalendar::from_offset_minutes(self.utc_offset_minutes).with_context(|| {
            format!("UTC_OFFSET_MINUTES out of range: {}", self.utc_offset_minutes)
        })
    }

    pub fn attendance_policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            late_grace: Duration::minutes(self.late_grace_minutes),
        }
    }

    pub fn reconcile_scope(&self) -> Result<OfficeScope> {
        let raw = self.reconcile_office.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(OfficeScope::All);
        }
        let office_id = Uuid::parse_str(raw)
            .with_context(|| format!("RECONCILE_OFFICE must be 'all' or an office id, got '{}'", raw))?;
        Ok(OfficeScope::Office(office_id))
    }
}
