use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use bizadmin_core::aggregate::{join_history, CompanyAggregate, HistoryRecordView};
use bizadmin_core::history::{filter_and_sort, HistoryFilter, SortOrder};
use bizadmin_core::report::{
    employee_report, history_report, DocumentWriter, JsonDocumentWriter, ReportDocument,
    TextDocumentWriter,
};
use bizadmin_core::types::{
    EmployeeStatus, HistoryAction, HistoryEntry, NewCompany, NewEmployee, NewHistoryEntry,
    StatusUpdate,
};
use bizadmin_core::views::{CompanySummary, DashboardSummary};
use bizadmin_storage::{generate_id, NewCompanyRow, NewEmployeeRow};

use crate::aggregates::{load_companies, load_company};
use crate::problem::ApiError;
use crate::router::AppState;

const COMPANY_NOT_FOUND: &str = "company not found";
const EMPLOYEE_NOT_FOUND: &str = "employee not found";

#[derive(Debug, Serialize)]
pub struct Created {
    message: &'static str,
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCreated {
    message: &'static str,
    id: String,
    history_recorded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdated {
    message: &'static str,
    is_active: bool,
    history_recorded: bool,
}

/// Counts the request under `route`, labelled by outcome.
fn observe<T>(route: &'static str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) if err.status() == StatusCode::NOT_FOUND => "not_found",
        Err(err) if err.status().is_client_error() => "rejected",
        Err(_) => "error",
    };
    counter!("api_requests_total", "route" => route, "result" => outcome).increment(1);
    result
}

pub async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompanyAggregate>>, ApiError> {
    let result = load_companies(state.storage()).await.map_err(ApiError::from);
    observe("companies.list", result).map(Json)
}

pub async fn company_summaries(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompanySummary>>, ApiError> {
    let result = load_companies(state.storage())
        .await
        .map(|companies| companies.iter().map(CompanySummary::from).collect())
        .map_err(ApiError::from);
    observe("companies.summary", result).map(Json)
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> Result<Json<CompanyAggregate>, ApiError> {
    let result = match load_company(state.storage(), &company_id).await {
        Ok(Some(company)) => Ok(company),
        Ok(None) => Err(ApiError::not_found(COMPANY_NOT_FOUND)),
        Err(err) => Err(err.into()),
    };
    observe("companies.get", result).map(Json)
}

/// Inserts the company row, then one declaration per field in request order.
///
/// Writes are not atomic: a failing field insert leaves the company and the
/// fields before it in place.
pub async fn create_company(
    State(state): State<AppState>,
    Json(payload): Json<NewCompany>,
) -> Result<Json<Created>, ApiError> {
    observe("companies.create", insert_company(&state, payload).await).map(Json)
}

async fn insert_company(state: &AppState, payload: NewCompany) -> Result<Created, ApiError> {
    let id = payload.id.unwrap_or_else(generate_id);
    let repo = state.storage().companies();

    repo.insert(&NewCompanyRow {
        id: &id,
        name: &payload.name,
        kind: payload.kind,
        created_at: state.now(),
    })
    .await?;

    for (position, field) in payload.fields.iter().enumerate() {
        repo.insert_field(&id, field, position as i64).await?;
    }

    info!(
        stage = "api",
        company_id = %id,
        kind = payload.kind.as_str(),
        fields = payload.fields.len(),
        "company created"
    );
    Ok(Created {
        message: "Company added successfully",
        id,
    })
}

/// Inserts the employee row and its dynamic fields, then records the initial
/// registration.
pub async fn create_employee(
    State(state): State<AppState>,
    Json(payload): Json<NewEmployee>,
) -> Result<Json<EmployeeCreated>, ApiError> {
    observe("employees.create", insert_employee(&state, payload).await).map(Json)
}

async fn insert_employee(
    state: &AppState,
    payload: NewEmployee,
) -> Result<EmployeeCreated, ApiError> {
    let id = payload.id.clone().unwrap_or_else(generate_id);
    let repo = state.storage().employees();

    repo.insert(&NewEmployeeRow {
        id: &id,
        company_id: &payload.company_id,
        is_active: payload.starts_active(),
        created_at: state.now(),
    })
    .await?;

    for (name, value) in payload.field_values() {
        repo.insert_field(&id, &name, &value).await?;
    }

    let history_recorded = state
        .recorder()
        .record(&payload.company_id, &id, HistoryAction::InitialRegistration)
        .await;

    info!(
        stage = "api",
        employee_id = %id,
        company_id = %payload.company_id,
        history_recorded,
        "employee created"
    );
    Ok(EmployeeCreated {
        message: "Employee added successfully",
        id,
        history_recorded,
    })
}

/// Sets the active flag, or flips it when the body omits `isActive`.
pub async fn update_employee_status(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<StatusUpdated>, ApiError> {
    observe(
        "employees.status",
        apply_status(&state, &employee_id, update).await,
    )
    .map(Json)
}

async fn apply_status(
    state: &AppState,
    employee_id: &str,
    update: StatusUpdate,
) -> Result<StatusUpdated, ApiError> {
    let repo = state.storage().employees();
    let employee = repo
        .fetch(employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found(EMPLOYEE_NOT_FOUND))?;

    let is_active = update.is_active.unwrap_or(!employee.is_active);
    if !repo.set_active(employee_id, is_active).await? {
        return Err(ApiError::not_found(EMPLOYEE_NOT_FOUND));
    }

    let history_recorded = state
        .recorder()
        .record(
            &employee.company_id,
            employee_id,
            HistoryAction::for_status_change(is_active),
        )
        .await;

    info!(
        stage = "api",
        employee_id,
        company_id = %employee.company_id,
        is_active,
        history_recorded,
        "employee status updated"
    );
    Ok(StatusUpdated {
        message: "Employee status updated successfully",
        is_active,
        history_recorded,
    })
}

pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let result = state.storage().history().list().await.map_err(ApiError::from);
    observe("history.list", result).map(Json)
}

pub async fn append_history(
    State(state): State<AppState>,
    Json(payload): Json<NewHistoryEntry>,
) -> Result<Json<Created>, ApiError> {
    let entry = HistoryEntry {
        id: payload.id.unwrap_or_else(generate_id),
        company_id: payload.company_id,
        employee_id: payload.employee_id,
        action: payload.action,
        date: payload.date,
    };
    let result = state
        .storage()
        .history()
        .append(&entry)
        .await
        .map(|()| Created {
            message: "History entry added successfully",
            id: entry.id.clone(),
        })
        .map_err(ApiError::from);
    observe("history.append", result).map(Json)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryViewQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    from: Option<NaiveDate>,
    #[serde(default)]
    to: Option<NaiveDate>,
    #[serde(default)]
    order: SortOrder,
}

/// History joined with company and employee names, filtered and sorted.
pub async fn history_view(
    State(state): State<AppState>,
    Query(query): Query<HistoryViewQuery>,
) -> Result<Json<Vec<HistoryRecordView>>, ApiError> {
    observe("history.view", build_history_view(&state, query).await).map(Json)
}

async fn build_history_view(
    state: &AppState,
    query: HistoryViewQuery,
) -> Result<Vec<HistoryRecordView>, ApiError> {
    let filter = HistoryFilter {
        search: query.search,
        company_id: query.company_id,
        ..HistoryFilter::default()
    }
    .with_days(query.from, query.to, state.timezone())
    .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let companies = load_companies(state.storage()).await?;
    let entries = state.storage().history().list().await?;
    let records = join_history(entries, &companies);

    Ok(filter_and_sort(records, &filter, query.order))
}

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, ApiError> {
    observe("dashboard", summarize(&state).await).map(Json)
}

async fn summarize(state: &AppState) -> Result<DashboardSummary, ApiError> {
    let companies = load_companies(state.storage()).await?;
    let history_entries = state.storage().history().count().await?;
    Ok(DashboardSummary::from_aggregates(
        &companies,
        history_entries as usize,
    ))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeReportQuery {
    #[serde(default = "default_status")]
    status: EmployeeStatus,
    #[serde(default)]
    format: ReportFormat,
}

fn default_status() -> EmployeeStatus {
    EmployeeStatus::Active
}

#[derive(Debug, Deserialize)]
pub struct HistoryReportQuery {
    #[serde(default)]
    format: ReportFormat,
}

pub async fn employees_report(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(query): Query<EmployeeReportQuery>,
) -> Result<Response, ApiError> {
    let result = match require_company(&state, &company_id).await {
        Ok(company) => render_document(&employee_report(&company, query.status), query.format),
        Err(err) => Err(err),
    };
    observe("reports.employees", result)
}

pub async fn company_history_report(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Query(query): Query<HistoryReportQuery>,
) -> Result<Response, ApiError> {
    observe(
        "reports.history",
        build_history_report(&state, &company_id, query.format).await,
    )
}

async fn build_history_report(
    state: &AppState,
    company_id: &str,
    format: ReportFormat,
) -> Result<Response, ApiError> {
    let company = require_company(state, company_id).await?;
    let entries = state
        .storage()
        .history()
        .list_for_company(company_id)
        .await?;
    let document = history_report(&company, &entries, state.timezone());
    render_document(&document, format)
}

async fn require_company(state: &AppState, company_id: &str) -> Result<CompanyAggregate, ApiError> {
    load_company(state.storage(), company_id)
        .await?
        .ok_or_else(|| ApiError::not_found(COMPANY_NOT_FOUND))
}

fn render_document(document: &ReportDocument, format: ReportFormat) -> Result<Response, ApiError> {
    match format {
        ReportFormat::Json => {
            let writer = JsonDocumentWriter::default();
            let disposition = attachment(&document.file_stem, writer.extension())?;
            let body = document.write_with(writer);
            Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(body)).into_response())
        }
        ReportFormat::Text => {
            let writer = TextDocumentWriter::default();
            let disposition = attachment(&document.file_stem, writer.extension())?;
            let body = document.write_with(writer);
            Ok((
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; charset=utf-8"),
                    ),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
    }
}

fn attachment(stem: &str, extension: &str) -> Result<HeaderValue, ApiError> {
    let file_name: String = stem
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}.{extension}\""))
        .map_err(ApiError::internal)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    authenticated: bool,
}

/// Checks the submitted credentials against the configured operator.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let operator = state.operator();
    let user_ok = request
        .username
        .as_bytes()
        .ct_eq(operator.username.as_bytes());
    let password_ok = request
        .password
        .as_bytes()
        .ct_eq(operator.password.as_bytes());

    let result = if bool::from(user_ok & password_ok) {
        info!(stage = "auth", username = %request.username, "operator signed in");
        Ok(LoginResponse {
            authenticated: true,
        })
    } else {
        warn!(stage = "auth", username = %request.username, "rejected sign-in attempt");
        Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid credentials"))
    };
    observe("login", result).map(Json)
}
