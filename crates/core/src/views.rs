//! Local state of the company screens.

use serde::Serialize;
use thiserror::Error;

use crate::aggregate::{CompanyAggregate, EmployeeView};
use crate::session::Route;
use crate::types::{
    CompanyKind, Employee, FieldMap, NewCompany, DEFAULT_COMPANY_FIELDS,
};

/// Shown when a load or mutation fails unexpectedly.
pub const RETRY_PROMPT: &str =
    "Error al cargar la información de la empresa. Por favor, inténtelo de nuevo.";
pub const NOT_FOUND_MESSAGE: &str = "Empresa no encontrada";
pub const MISSING_NAME_LABEL: &str = "Nombre no disponible";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("company name is required")]
    MissingName,
    #[error("no company loaded")]
    NotLoaded,
    #[error("employee {0} is not part of this company")]
    UnknownEmployee(String),
}

/// Form used to register a company and the field names its employees carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanySetupForm {
    pub name: String,
    pub kind: CompanyKind,
    fields: Vec<String>,
}

impl Default for CompanySetupForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: CompanyKind::default(),
            fields: DEFAULT_COMPANY_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl CompanySetupForm {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Appends a pending field. Empty and duplicate names are ignored.
    pub fn add_field(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.fields.iter().any(|field| field == name) {
            return false;
        }
        self.fields.push(name.to_string());
        true
    }

    pub fn remove_field(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|field| field != name);
        self.fields.len() != before
    }

    /// Builds the create-company request and the screen to show afterwards.
    pub fn submit(&self) -> Result<(NewCompany, Route), ViewError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ViewError::MissingName);
        }
        let request = NewCompany {
            id: None,
            name: name.to_string(),
            kind: self.kind,
            fields: self.fields.clone(),
        };
        Ok((request, Route::Select))
    }
}

/// Load state of a single company screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded(CompanyAggregate),
    NotFound,
    Failed(String),
}

/// Company management screen: one aggregate plus client-side filters.
#[derive(Debug, Clone)]
pub struct CompanyManagementView {
    state: LoadState,
    show_inactive: bool,
}

impl Default for CompanyManagementView {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanyManagementView {
    pub fn new() -> Self {
        Self {
            state: LoadState::Loading,
            show_inactive: false,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Applies the result of fetching the company aggregate.
    pub fn finish_load<E>(&mut self, result: Result<Option<CompanyAggregate>, E>) {
        self.state = match result {
            Ok(Some(company)) => LoadState::Loaded(company),
            Ok(None) => LoadState::NotFound,
            Err(_) => LoadState::Failed(RETRY_PROMPT.to_string()),
        };
    }

    /// User-facing message for non-loaded states.
    pub fn message(&self) -> Option<&str> {
        match &self.state {
            LoadState::Loading | LoadState::Loaded(_) => None,
            LoadState::NotFound => Some(NOT_FOUND_MESSAGE),
            LoadState::Failed(message) => Some(message.as_str()),
        }
    }

    pub fn show_inactive(&self) -> bool {
        self.show_inactive
    }

    pub fn toggle_show_inactive(&mut self) {
        self.show_inactive = !self.show_inactive;
    }

    /// Employees shown in the table: active ones, plus inactive when enabled.
    pub fn visible_employees(&self) -> Vec<&EmployeeView> {
        match &self.state {
            LoadState::Loaded(company) => company
                .employees
                .iter()
                .filter(|employee| self.show_inactive || employee.is_active())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Appends a freshly created employee without refetching.
    pub fn apply_added_employee(
        &mut self,
        employee_id: &str,
        fields: FieldMap,
    ) -> Result<(), ViewError> {
        let company = self.company_mut()?;
        let employee = Employee {
            id: employee_id.to_string(),
            company_id: company.id.clone(),
            is_active: true,
        };
        company.employees.push(EmployeeView::new(employee, fields));
        Ok(())
    }

    /// Flips an employee's active flag locally, returning the new value.
    pub fn apply_status_toggle(&mut self, employee_id: &str) -> Result<bool, ViewError> {
        let company = self.company_mut()?;
        let employee = company
            .employees
            .iter_mut()
            .find(|employee| employee.id() == employee_id)
            .ok_or_else(|| ViewError::UnknownEmployee(employee_id.to_string()))?;
        employee.employee.is_active = !employee.employee.is_active;
        Ok(employee.employee.is_active)
    }

    fn company_mut(&mut self) -> Result<&mut CompanyAggregate, ViewError> {
        match &mut self.state {
            LoadState::Loaded(company) => Ok(company),
            _ => Err(ViewError::NotLoaded),
        }
    }
}

/// Label for the employee name column.
pub fn employee_display_name(employee: &EmployeeView) -> &str {
    employee.name().unwrap_or(MISSING_NAME_LABEL)
}

/// Card shown on the company selector screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanySummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CompanyKind,
    pub employees_count: usize,
}

impl From<&CompanyAggregate> for CompanySummary {
    fn from(company: &CompanyAggregate) -> Self {
        Self {
            id: company.id.clone(),
            name: company.name.clone(),
            kind: company.kind,
            employees_count: company.employees.len(),
        }
    }
}

/// Totals shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub companies: usize,
    pub employees: usize,
    pub history_entries: usize,
}

impl DashboardSummary {
    pub fn from_aggregates(companies: &[CompanyAggregate], history_entries: usize) -> Self {
        Self {
            companies: companies.len(),
            employees: companies.iter().map(|c| c.employees.len()).sum(),
            history_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::assemble_company;
    use crate::types::Company;

    fn loaded_view() -> CompanyManagementView {
        let company = assemble_company(
            Company {
                id: "c-1".to_string(),
                name: "Acme".to_string(),
                kind: CompanyKind::Project,
            },
            &[],
            vec![
                Employee {
                    id: "e-1".to_string(),
                    company_id: "c-1".to_string(),
                    is_active: true,
                },
                Employee {
                    id: "e-2".to_string(),
                    company_id: "c-1".to_string(),
                    is_active: false,
                },
            ],
            &[],
        );
        let mut view = CompanyManagementView::new();
        view.finish_load::<()>(Ok(Some(company)));
        view
    }

    fn visible_ids(view: &CompanyManagementView) -> Vec<&str> {
        view.visible_employees().into_iter().map(|e| e.id()).collect()
    }

    #[test]
    fn setup_form_starts_with_default_fields() {
        let form = CompanySetupForm::default();
        assert_eq!(form.fields(), ["nombre", "apellido", "email"]);
        assert_eq!(form.kind, CompanyKind::Company);
    }

    #[test]
    fn setup_form_ignores_empty_and_duplicate_fields() {
        let mut form = CompanySetupForm::default();
        assert!(form.add_field("telefono"));
        assert!(!form.add_field("telefono"));
        assert!(!form.add_field("   "));
        assert!(form.remove_field("apellido"));
        assert!(!form.remove_field("apellido"));
        assert_eq!(form.fields(), ["nombre", "email", "telefono"]);
    }

    #[test]
    fn setup_form_submit_requires_name() {
        let mut form = CompanySetupForm::default();
        assert_eq!(form.submit(), Err(ViewError::MissingName));

        form.name = "  Acme ".to_string();
        form.kind = CompanyKind::Business;
        let (request, next) = form.submit().expect("submit");
        assert_eq!(request.name, "Acme");
        assert_eq!(request.kind, CompanyKind::Business);
        assert_eq!(request.fields, vec!["nombre", "apellido", "email"]);
        assert_eq!(next, Route::Select);
    }

    #[test]
    fn management_view_filters_inactive_until_toggled() {
        let mut view = loaded_view();
        assert_eq!(visible_ids(&view), vec!["e-1"]);

        view.toggle_show_inactive();
        assert_eq!(visible_ids(&view), vec!["e-1", "e-2"]);
    }

    #[test]
    fn management_view_patches_state_locally() {
        let mut view = loaded_view();

        let mut fields = FieldMap::new();
        fields.insert("nombre".to_string(), "Ana".to_string());
        view.apply_added_employee("e-3", fields).expect("add");
        assert_eq!(visible_ids(&view), vec!["e-1", "e-3"]);

        assert!(!view.apply_status_toggle("e-1").expect("toggle"));
        assert_eq!(visible_ids(&view), vec!["e-3"]);

        let err = view.apply_status_toggle("e-404").expect_err("unknown");
        assert_eq!(err, ViewError::UnknownEmployee("e-404".to_string()));
    }

    #[test]
    fn management_view_reports_not_found_and_failures() {
        let mut view = CompanyManagementView::new();
        assert!(view.message().is_none());

        view.finish_load::<()>(Ok(None));
        assert_eq!(view.message(), Some(NOT_FOUND_MESSAGE));
        assert_eq!(
            view.apply_status_toggle("e-1"),
            Err(ViewError::NotLoaded)
        );

        view.finish_load(Err("connection reset"));
        assert_eq!(view.message(), Some(RETRY_PROMPT));
    }

    #[test]
    fn display_name_falls_back_when_missing() {
        let view = loaded_view();
        let employees = view.visible_employees();
        assert_eq!(employee_display_name(employees[0]), MISSING_NAME_LABEL);
    }

    #[test]
    fn summaries_count_employees() {
        let view = loaded_view();
        let LoadState::Loaded(company) = view.state() else {
            panic!("expected loaded state");
        };
        let summary = CompanySummary::from(company);
        assert_eq!(summary.employees_count, 2);

        let dashboard = DashboardSummary::from_aggregates(std::slice::from_ref(company), 5);
        assert_eq!(
            dashboard,
            DashboardSummary {
                companies: 1,
                employees: 2,
                history_entries: 5
            }
        );
    }
}
