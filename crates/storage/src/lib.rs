use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;
use uuid::Uuid;

use bizadmin_core::types::{
    Company, CompanyField, CompanyKind, Employee, EmployeeField, HistoryAction, HistoryEntry,
};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// The database file is created when missing.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = connect_options(database_url)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for companies and their field declarations.
    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for employees and their dynamic field values.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for the history log.
    pub fn history(&self) -> HistoryRepository {
        HistoryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(StorageError::Connect)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(5000));
    Ok(options)
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Generates an identifier for rows created without a caller-supplied id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Repository for the `companies` and `company_fields` tables.
#[derive(Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Inserts a company row.
    pub async fn insert(&self, record: &NewCompanyRow<'_>) -> Result<(), CompanyError> {
        sqlx::query("INSERT INTO companies (id, name, type, created_at) VALUES (?, ?, ?, ?)")
            .bind(record.id)
            .bind(record.name)
            .bind(record.kind.as_str())
            .bind(to_rfc3339(record.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Declares one field name for a company at the given position.
    pub async fn insert_field(
        &self,
        company_id: &str,
        field_name: &str,
        position: i64,
    ) -> Result<(), CompanyError> {
        sqlx::query(
            "INSERT INTO company_fields (company_id, field_name, position) VALUES (?, ?, ?)",
        )
        .bind(company_id)
        .bind(field_name)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lists every company in insertion order.
    pub async fn list(&self) -> Result<Vec<Company>, CompanyError> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, type AS kind FROM companies ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CompanyRow::into_domain).collect()
    }

    /// Loads a single company.
    pub async fn fetch(&self, company_id: &str) -> Result<Option<Company>, CompanyError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, type AS kind FROM companies WHERE id = ?",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CompanyRow::into_domain).transpose()
    }

    /// Lists the field declarations of every company, in declaration order.
    pub async fn list_fields(&self) -> Result<Vec<CompanyField>, CompanyError> {
        let rows = sqlx::query_as::<_, CompanyFieldRow>(
            "SELECT company_id, field_name FROM company_fields ORDER BY company_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CompanyFieldRow::into_domain).collect())
    }

    /// Lists the field declarations of one company, in declaration order.
    pub async fn list_fields_for(&self, company_id: &str) -> Result<Vec<CompanyField>, CompanyError> {
        let rows = sqlx::query_as::<_, CompanyFieldRow>(
            "SELECT company_id, field_name FROM company_fields WHERE company_id = ? ORDER BY position",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CompanyFieldRow::into_domain).collect())
    }
}

/// Data required to insert a company row.
pub struct NewCompanyRow<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub kind: CompanyKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: String,
    name: String,
    kind: String,
}

impl CompanyRow {
    fn into_domain(self) -> Result<Company, CompanyError> {
        let kind = CompanyKind::parse(&self.kind).ok_or(CompanyError::UnknownKind(self.kind))?;
        Ok(Company {
            id: self.id,
            name: self.name,
            kind,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyFieldRow {
    company_id: String,
    field_name: String,
}

impl CompanyFieldRow {
    fn into_domain(self) -> CompanyField {
        CompanyField {
            company_id: self.company_id,
            field_name: self.field_name,
        }
    }
}

/// Errors that can occur while reading or writing companies.
#[derive(Debug, Error)]
pub enum CompanyError {
    #[error("stored company type is not recognised: {0}")]
    UnknownKind(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the `employees` and `employee_fields` tables.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts an employee row.
    pub async fn insert(&self, record: &NewEmployeeRow<'_>) -> Result<(), EmployeeError> {
        sqlx::query(
            "INSERT INTO employees (id, company_id, is_active, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.company_id)
        .bind(record.is_active)
        .bind(to_rfc3339(record.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores one dynamic field value for an employee.
    pub async fn insert_field(
        &self,
        employee_id: &str,
        field_name: &str,
        field_value: &str,
    ) -> Result<(), EmployeeError> {
        sqlx::query(
            "INSERT INTO employee_fields (employee_id, field_name, field_value) VALUES (?, ?, ?)",
        )
        .bind(employee_id)
        .bind(field_name)
        .bind(field_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Loads a single employee.
    pub async fn fetch(&self, employee_id: &str) -> Result<Option<Employee>, EmployeeError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, company_id, is_active FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    /// Sets the active flag, returning `false` when no employee has the id.
    pub async fn set_active(&self, employee_id: &str, is_active: bool) -> Result<bool, EmployeeError> {
        let result = sqlx::query("UPDATE employees SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(employee_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists every employee in insertion order.
    pub async fn list(&self) -> Result<Vec<Employee>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, company_id, is_active FROM employees ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeRow::into_domain).collect())
    }

    /// Lists the employees of one company in insertion order.
    pub async fn list_for_company(&self, company_id: &str) -> Result<Vec<Employee>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, company_id, is_active FROM employees WHERE company_id = ? ORDER BY rowid",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeRow::into_domain).collect())
    }

    /// Lists every stored dynamic field value.
    pub async fn list_fields(&self) -> Result<Vec<EmployeeField>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeFieldRow>(
            "SELECT employee_id, field_name, field_value FROM employee_fields ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeFieldRow::into_domain).collect())
    }

    /// Lists the dynamic field values of one company's employees.
    pub async fn list_fields_for_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<EmployeeField>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeFieldRow>(
            r#"
SELECT ef.employee_id,
       ef.field_name,
       ef.field_value
  FROM employee_fields AS ef
  JOIN employees AS e
    ON e.id = ef.employee_id
 WHERE e.company_id = ?
 ORDER BY ef.rowid
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeFieldRow::into_domain).collect())
    }
}

/// Data required to insert an employee row.
pub struct NewEmployeeRow<'a> {
    pub id: &'a str,
    pub company_id: &'a str,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    company_id: String,
    is_active: bool,
}

impl EmployeeRow {
    fn into_domain(self) -> Employee {
        Employee {
            id: self.id,
            company_id: self.company_id,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeFieldRow {
    employee_id: String,
    field_name: String,
    field_value: String,
}

impl EmployeeFieldRow {
    fn into_domain(self) -> EmployeeField {
        EmployeeField {
            employee_id: self.employee_id,
            field_name: self.field_name,
            field_value: self.field_value,
        }
    }
}

/// Errors that can occur while reading or writing employees.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the append-only `history` table.
#[derive(Clone)]
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    /// Appends a history entry.
    pub async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        sqlx::query(
            "INSERT INTO history (id, company_id, employee_id, action, date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.company_id)
        .bind(&entry.employee_id)
        .bind(entry.action.as_str())
        .bind(to_rfc3339(entry.date))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lists every entry in insertion order.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, company_id, employee_id, action, date FROM history ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryRow::into_domain).collect())
    }

    /// Lists the entries of one company in insertion order.
    pub async fn list_for_company(&self, company_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, company_id, employee_id, action, date FROM history WHERE company_id = ? ORDER BY rowid",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryRow::into_domain).collect())
    }

    pub async fn count(&self) -> Result<u64, HistoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: String,
    company_id: String,
    employee_id: String,
    action: String,
    date: DateTime<Utc>,
}

impl HistoryRow {
    fn into_domain(self) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            company_id: self.company_id,
            employee_id: self.employee_id,
            action: HistoryAction::parse(&self.action),
            date: self.date,
        }
    }
}

/// Errors that can occur while reading or appending history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
