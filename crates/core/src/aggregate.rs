//! Assembly of nested company/employee/history views from flat table rows.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::types::{
    Company, CompanyField, CompanyKind, Employee, EmployeeField, FieldMap, HistoryEntry,
    NAME_FIELD,
};

/// Keys an [`EmployeeView`] always emits; dynamic fields with these names are not merged.
const RESERVED_EMPLOYEE_KEYS: [&str; 3] = ["id", "company_id", "is_active"];

/// Employee decorated with its dynamic field values.
///
/// Serializes as a flat object: the dynamic fields are merged next to
/// `id`, `company_id` and `is_active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeView {
    pub employee: Employee,
    pub fields: FieldMap,
}

impl EmployeeView {
    pub fn new(employee: Employee, fields: FieldMap) -> Self {
        Self { employee, fields }
    }

    pub fn id(&self) -> &str {
        &self.employee.id
    }

    pub fn is_active(&self) -> bool {
        self.employee.is_active
    }

    /// Returns the value of a dynamic field when present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the employee's `nombre` field.
    pub fn name(&self) -> Option<&str> {
        self.field(NAME_FIELD)
    }
}

impl Serialize for EmployeeView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.employee.id)?;
        map.serialize_entry("company_id", &self.employee.company_id)?;
        map.serialize_entry("is_active", &self.employee.is_active)?;
        for (name, value) in &self.fields {
            if RESERVED_EMPLOYEE_KEYS.contains(&name.as_str()) {
                continue;
            }
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Company merged with its declared field names and employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyAggregate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CompanyKind,
    /// Declared field names in declaration order.
    pub fields: Vec<String>,
    pub employees: Vec<EmployeeView>,
}

impl CompanyAggregate {
    pub fn employee(&self, employee_id: &str) -> Option<&EmployeeView> {
        self.employees.iter().find(|employee| employee.id() == employee_id)
    }

    pub fn active_count(&self) -> usize {
        self.employees.iter().filter(|e| e.is_active()).count()
    }
}

/// Builds one aggregate from a company row and its related rows.
///
/// `fields` must already be in declaration order; rows belonging to other
/// companies or employees are ignored.
pub fn assemble_company(
    company: Company,
    fields: &[CompanyField],
    employees: Vec<Employee>,
    employee_fields: &[EmployeeField],
) -> CompanyAggregate {
    let declared = fields
        .iter()
        .filter(|field| field.company_id == company.id)
        .map(|field| field.field_name.clone())
        .collect();

    let mut values_by_employee = group_values(employee_fields);
    let employees = employees
        .into_iter()
        .filter(|employee| employee.company_id == company.id)
        .map(|employee| {
            let values = values_by_employee
                .remove(employee.id.as_str())
                .unwrap_or_default();
            EmployeeView::new(employee, values)
        })
        .collect();

    CompanyAggregate {
        id: company.id,
        name: company.name,
        kind: company.kind,
        fields: declared,
        employees,
    }
}

/// Builds aggregates for every company from the flat rows of the four tables.
///
/// Company order, field declaration order and employee order follow the
/// order of the input rows.
pub fn assemble_companies(
    companies: Vec<Company>,
    fields: &[CompanyField],
    employees: Vec<Employee>,
    employee_fields: &[EmployeeField],
) -> Vec<CompanyAggregate> {
    let mut fields_by_company: HashMap<&str, Vec<String>> = HashMap::new();
    for field in fields {
        fields_by_company
            .entry(field.company_id.as_str())
            .or_default()
            .push(field.field_name.clone());
    }

    let mut values_by_employee = group_values(employee_fields);
    let mut employees_by_company: HashMap<String, Vec<EmployeeView>> = HashMap::new();
    for employee in employees {
        let values = values_by_employee
            .remove(employee.id.as_str())
            .unwrap_or_default();
        employees_by_company
            .entry(employee.company_id.clone())
            .or_default()
            .push(EmployeeView::new(employee, values));
    }

    companies
        .into_iter()
        .map(|company| CompanyAggregate {
            fields: fields_by_company
                .remove(company.id.as_str())
                .unwrap_or_default(),
            employees: employees_by_company.remove(&company.id).unwrap_or_default(),
            id: company.id,
            name: company.name,
            kind: company.kind,
        })
        .collect()
}

fn group_values(employee_fields: &[EmployeeField]) -> HashMap<&str, FieldMap> {
    let mut values_by_employee: HashMap<&str, FieldMap> = HashMap::new();
    for field in employee_fields {
        values_by_employee
            .entry(field.employee_id.as_str())
            .or_default()
            .insert(field.field_name.clone(), field.field_value.clone());
    }
    values_by_employee
}

/// History row joined with the display names of its company and employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecordView {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub company_name: Option<String>,
    pub employee_name: Option<String>,
}

/// Joins history rows with company names and employee `nombre` values.
///
/// Entries referencing unknown companies or employees keep `None` names.
pub fn join_history(
    entries: Vec<HistoryEntry>,
    companies: &[CompanyAggregate],
) -> Vec<HistoryRecordView> {
    let company_names: HashMap<&str, &str> = companies
        .iter()
        .map(|company| (company.id.as_str(), company.name.as_str()))
        .collect();
    let employee_names: HashMap<&str, &str> = companies
        .iter()
        .flat_map(|company| company.employees.iter())
        .filter_map(|employee| employee.name().map(|name| (employee.id(), name)))
        .collect();

    entries
        .into_iter()
        .map(|entry| HistoryRecordView {
            company_name: company_names
                .get(entry.company_id.as_str())
                .map(|name| name.to_string()),
            employee_name: employee_names
                .get(entry.employee_id.as_str())
                .map(|name| name.to_string()),
            entry,
        })
        .collect()
}
