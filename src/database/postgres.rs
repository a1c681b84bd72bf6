use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::models::{
    Attendance, AttendanceOrigin, Employee, EmployeeStatus, Holiday, Leave, LeaveStatus,
    NewAttendance, NewHoliday, NewLeave, NewTransaction, Office, Transaction,
};
use crate::database::store::{Store, StoreTx, TransactionFilter};
use crate::database::utils::sql;
use crate::error::{AppError, AppResult};

const EMPLOYEE_COLUMNS: &str = r#"
    id,
    name,
    email,
    office_id,
    base_salary,
    overtime_rate,
    leave_balance,
    status,
    created_at
"#;

const ATTENDANCE_COLUMNS: &str = r#"
    id,
    employee_id,
    date,
    check_in_time,
    check_out_time,
    overtime_minutes,
    status,
    origin,
    created_at
"#;

const LEAVE_COLUMNS: &str = r#"
    id,
    employee_id,
    reason,
    from_date,
    to_date,
    total_days,
    leave_type,
    status,
    apply_date,
    decided_at
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id,
    employee_id,
    amount,
    pay_type,
    date,
    description,
    created_at
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

impl StoreTx for PgTx {
    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn find_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        let query = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        let employee = sqlx::query_as::<_, Employee>(&sql(&query))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(employee)
    }

    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        let query = format!("SELECT {} FROM employees WHERE id = ? FOR UPDATE", EMPLOYEE_COLUMNS);
        let employee = sqlx::query_as::<_, Employee>(&sql(&query))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(employee)
    }

    async fn list_active_employees(&mut self, office_id: Option<Uuid>) -> AppResult<Vec<Employee>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM employees WHERE status = ", EMPLOYEE_COLUMNS));
        builder.push_bind(EmployeeStatus::Active);
        if let Some(office_id) = office_id {
            builder.push(" AND office_id = ").push_bind(office_id);
        }
        builder.push(" ORDER BY created_at, id");

        let employees = builder
            .build_query_as::<Employee>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(employees)
    }

    async fn set_leave_balance(&mut self, employee_id: Uuid, balance: i32) -> AppResult<()> {
        let result = sqlx::query(&sql(r#"
            UPDATE
                employees
            SET
                leave_balance = ?
            WHERE
                id = ?
        "#))
        .bind(balance)
        .bind(employee_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("employee {}", employee_id)));
        }
        Ok(())
    }

    async fn find_office(&mut self, id: Uuid) -> AppResult<Option<Office>> {
        let office = sqlx::query_as::<_, Office>(&sql(r#"
            SELECT
                id,
                name,
                checkin,
                checkout,
                break_minutes,
                created_at
            FROM
                offices
            WHERE
                id = ?
        "#))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(office)
    }

    async fn lock_batch_scope(&mut self, key: &str) -> AppResult<()> {
        sqlx::query(&sql("SELECT pg_advisory_xact_lock(hashtext(?)::bigint)"))
            .bind(key)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_attendance(&mut self, employee_id: Uuid, date: DateTime<Utc>) -> AppResult<Option<Attendance>> {
        let query = format!(
            "SELECT {} FROM attendance WHERE employee_id = ? AND date = ?",
            ATTENDANCE_COLUMNS
        );
        let attendance = sqlx::query_as::<_, Attendance>(&sql(&query))
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(attendance)
    }

    async fn list_attendance_for_date(&mut self, date: DateTime<Utc>) -> AppResult<Vec<Attendance>> {
        let query = format!("SELECT {} FROM attendance WHERE date = ?", ATTENDANCE_COLUMNS);
        let rows = sqlx::query_as::<_, Attendance>(&sql(&query))
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn list_attendance_for_employee(
        &mut self,
        employee_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Attendance>> {
        let query = format!(
            r#"
            SELECT {}
            FROM attendance
            WHERE employee_id = ? AND date >= ? AND date < ?
            ORDER BY date ASC
            "#,
            ATTENDANCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Attendance>(&sql(&query))
            .bind(employee_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn try_insert_attendance(&mut self, new: NewAttendance) -> AppResult<Option<Attendance>> {
        let query = format!(
            r#"
            INSERT INTO
                attendance (
                    id,
                    employee_id,
                    date,
                    check_in_time,
                    overtime_minutes,
                    status,
                    origin,
                    created_at
                )
            VALUES
                (?, ?, ?, ?, 0, ?, ?, ?)
            ON CONFLICT (employee_id, date) DO NOTHING
            RETURNING {}
            "#,
            ATTENDANCE_COLUMNS
        );
        let row = sqlx::query_as::<_, Attendance>(&sql(&query))
            .bind(Uuid::new_v4())
            .bind(new.employee_id)
            .bind(new.date)
            .bind(new.check_in_time)
            .bind(new.status)
            .bind(new.origin)
            .bind(Utc::now())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn record_check_out(
        &mut self,
        attendance_id: Uuid,
        check_out_time: DateTime<Utc>,
        overtime_minutes: i32,
    ) -> AppResult<Attendance> {
        let query = format!(
            r#"
            UPDATE
                attendance
            SET
                check_out_time = ?,
                overtime_minutes = ?
            WHERE
                id = ?
                AND check_out_time IS NULL
            RETURNING {}
            "#,
            ATTENDANCE_COLUMNS
        );
        sqlx::query_as::<_, Attendance>(&sql(&query))
            .bind(check_out_time)
            .bind(overtime_minutes)
            .bind(attendance_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| {
                AppError::Consistency(format!(
                    "attendance {} was checked out concurrently",
                    attendance_id
                ))
            })
    }

    async fn delete_attendance_by_origin(&mut self, date: DateTime<Utc>, origin: AttendanceOrigin) -> AppResult<u64> {
        let result = sqlx::query(&sql("DELETE FROM attendance WHERE date = ? AND origin = ?"))
            .bind(date)
            .bind(origin)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_leave(&mut self, id: Uuid) -> AppResult<Option<Leave>> {
        let query = format!("SELECT {} FROM leaves WHERE id = ?", LEAVE_COLUMNS);
        let leave = sqlx::query_as::<_, Leave>(&sql(&query))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(leave)
    }

    async fn list_leaves_for_employee(&mut self, employee_id: Uuid) -> AppResult<Vec<Leave>> {
        let query = format!(
            "SELECT {} FROM leaves WHERE employee_id = ? ORDER BY from_date ASC",
            LEAVE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Leave>(&sql(&query))
            .bind(employee_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn list_leaves_by_status(&mut self, status: LeaveStatus, limit: Option<i64>) -> AppResult<Vec<Leave>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM leaves WHERE status = ", LEAVE_COLUMNS));
        builder.push_bind(status);
        builder.push(" ORDER BY apply_date DESC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder
            .build_query_as::<Leave>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn insert_leave(&mut self, new: NewLeave) -> AppResult<Leave> {
        let query = format!(
            r#"
            INSERT INTO
                leaves (
                    id,
                    employee_id,
                    reason,
                    from_date,
                    to_date,
                    total_days,
                    leave_type,
                    status,
                    apply_date
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            LEAVE_COLUMNS
        );
        let leave = sqlx::query_as::<_, Leave>(&sql(&query))
            .bind(Uuid::new_v4())
            .bind(new.employee_id)
            .bind(new.reason)
            .bind(new.from_date)
            .bind(new.to_date)
            .bind(new.total_days)
            .bind(new.leave_type)
            .bind(LeaveStatus::Pending)
            .bind(new.apply_date)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(leave)
    }

    async fn set_leave_status(
        &mut self,
        id: Uuid,
        status: LeaveStatus,
        decided_at: DateTime<Utc>,
    ) -> AppResult<Leave> {
        let query = format!(
            "UPDATE leaves SET status = ?, decided_at = ? WHERE id = ? RETURNING {}",
            LEAVE_COLUMNS
        );
        sqlx::query_as::<_, Leave>(&sql(&query))
            .bind(status)
            .bind(decided_at)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("leave {}", id)))
    }

    async fn find_holiday(&mut self, id: Uuid) -> AppResult<Option<Holiday>> {
        let holiday = sqlx::query_as::<_, Holiday>(&sql(
            "SELECT id, date, description, created_at FROM holidays WHERE id = ?",
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(holiday)
    }

    async fn list_holidays_between(&mut self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Holiday>> {
        let rows = sqlx::query_as::<_, Holiday>(&sql(r#"
            SELECT
                id,
                date,
                description,
                created_at
            FROM
                holidays
            WHERE
                date >= ?
                AND date <= ?
            ORDER BY
                date ASC
        "#))
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_holiday(&mut self, new: NewHoliday) -> AppResult<Holiday> {
        let holiday = sqlx::query_as::<_, Holiday>(&sql(r#"
            INSERT INTO
                holidays (id, date, description, created_at)
            VALUES
                (?, ?, ?, ?)
            RETURNING
                id,
                date,
                description,
                created_at
        "#))
        .bind(Uuid::new_v4())
        .bind(new.date)
        .bind(new.description)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(holiday)
    }

    async fn delete_holiday(&mut self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query(&sql("DELETE FROM holidays WHERE id = ?"))
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("holiday {}", id)));
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, new: NewTransaction) -> AppResult<Transaction> {
        let query = format!(
            r#"
            INSERT INTO
                transactions (
                    id,
                    employee_id,
                    amount,
                    pay_type,
                    date,
                    description,
                    created_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        );
        let transaction = sqlx::query_as::<_, Transaction>(&sql(&query))
            .bind(Uuid::new_v4())
            .bind(new.employee_id)
            .bind(new.amount)
            .bind(new.pay_type)
            .bind(new.date)
            .bind(new.description)
            .bind(Utc::now())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(transaction)
    }

    async fn list_transactions(&mut self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM transactions WHERE TRUE", TRANSACTION_COLUMNS));

        if let Some(employee_ids) = filter.employee_ids {
            builder.push(" AND employee_id = ANY(").push_bind(employee_ids).push(")");
        }
        if let Some(pay_type) = filter.pay_type {
            builder.push(" AND pay_type = ").push_bind(pay_type);
        }
        if let Some(from) = filter.from {
            builder.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND date < ").push_bind(to);
        }
        builder.push(" ORDER BY date ASC, created_at ASC");

        let rows = builder
            .build_query_as::<Transaction>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }
}
