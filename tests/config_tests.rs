use std::env;

use chrono::Duration;
use serial_test::serial;
use uuid::Uuid;

use paytrack::config::Config;
use paytrack::services::{CivilCalendar, OfficeScope};

const KEYS: [&str; 6] = [
    "DATABASE_URL",
    "DATABASE_MAX_CONNECTIONS",
    "ENVIRONMENT",
    "UTC_OFFSET_MINUTES",
    "LATE_GRACE_MINUTES",
    "RECONCILE_OFFICE",
];

/// Runs `test` with the config variables cleared, then restores them.
fn with_clean_env(test: impl FnOnce()) {
    let original: Vec<(&str, Option<String>)> = KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();
    for key in KEYS {
        unsafe {
            env::remove_var(key);
        }
    }

    test();

    for (key, value) in original {
        unsafe {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

#[test]
#[serial]
fn test_config_defaults() {
    with_clean_env(|| {
        let config = Config::from_env_only().unwrap();

        assert_eq!(config.database_url, "postgres://@localhost:5432/paytrack");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.environment, "development");
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.calendar().unwrap(), CivilCalendar::ist());
        assert_eq!(config.attendance_policy().late_grace, Duration::minutes(30));
        assert_eq!(config.reconcile_scope().unwrap(), OfficeScope::All);
    });
}

#[test]
#[serial]
fn test_config_custom_values() {
    with_clean_env(|| {
        let office_id = Uuid::new_v4();
        unsafe {
            env::set_var("DATABASE_URL", "postgres://payroll@db:5432/payroll");
            env::set_var("DATABASE_MAX_CONNECTIONS", "12");
            env::set_var("ENVIRONMENT", "production");
            env::set_var("UTC_OFFSET_MINUTES", "0");
            env::set_var("LATE_GRACE_MINUTES", "15");
            env::set_var("RECONCILE_OFFICE", office_id.to_string());
        }

        let config = Config::from_env_only().unwrap();
        assert_eq!(config.database_url, "postgres://payroll@db:5432/payroll");
        assert_eq!(config.max_connections, 12);
        assert!(config.is_production());
        assert_eq!(config.calendar().unwrap(), CivilCalendar::from_offset_minutes(0).unwrap());
        assert_eq!(config.attendance_policy().late_grace, Duration::minutes(15));
        assert_eq!(config.reconcile_scope().unwrap(), OfficeScope::Office(office_id));
    });
}

#[test]
#[serial]
fn test_config_rejects_bad_values() {
    with_clean_env(|| {
        unsafe {
            env::set_var("UTC_OFFSET_MINUTES", "five hours");
        }
        assert!(Config::from_env_only().is_err());

        unsafe {
            env::set_var("UTC_OFFSET_MINUTES", "100000");
        }
        assert!(Config::from_env_only().is_err());

        unsafe {
            env::remove_var("UTC_OFFSET_MINUTES");
            env::set_var("RECONCILE_OFFICE", "head-office");
        }
        assert!(Config::from_env_only().is_err());

        unsafe {
            env::set_var("RECONCILE_OFFICE", "ALL");
        }
        assert_eq!(Config::from_env_only().unwrap().reconcile_scope().unwrap(), OfficeScope::All);
    });
}
