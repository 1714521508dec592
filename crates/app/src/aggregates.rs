use thiserror::Error;

use bizadmin_core::aggregate::{assemble_companies, assemble_company, CompanyAggregate};
use bizadmin_storage::{CompanyError, Database, EmployeeError};

/// Loads every company with its declared fields and employees.
///
/// Issues one query per table and groups the rows in memory.
pub async fn load_companies(database: &Database) -> Result<Vec<CompanyAggregate>, LoadError> {
    let company_repo = database.companies();
    let employee_repo = database.employees();

    let companies = company_repo.list().await?;
    let fields = company_repo.list_fields().await?;
    let employees = employee_repo.list().await?;
    let values = employee_repo.list_fields().await?;

    Ok(assemble_companies(companies, &fields, employees, &values))
}

/// Loads a single company aggregate, `None` when the id is unknown.
pub async fn load_company(
    database: &Database,
    company_id: &str,
) -> Result<Option<CompanyAggregate>, LoadError> {
    let company_repo = database.companies();
    let Some(company) = company_repo.fetch(company_id).await? else {
        return Ok(None);
    };

    let employee_repo = database.employees();
    let fields = company_repo.list_fields_for(company_id).await?;
    let employees = employee_repo.list_for_company(company_id).await?;
    let values = employee_repo.list_fields_for_company(company_id).await?;

    Ok(Some(assemble_company(company, &fields, employees, &values)))
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Company(#[from] CompanyError),
    #[error(transparent)]
    Employee(#[from] EmployeeError),
}
