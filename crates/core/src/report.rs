//! Tabular report documents built from in-memory aggregates.
//!
//! Report builders are pure: they produce a [`ReportDocument`] which is then
//! handed to a [`DocumentWriter`] implementation to obtain the final bytes.

use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Value};

use crate::aggregate::{CompanyAggregate, EmployeeView};
use crate::types::{EmployeeStatus, HistoryEntry, EMAIL_FIELD, NAME_FIELD, SURNAME_FIELD};

/// Columns every employee report starts with, as (field name, heading).
const PINNED_COLUMNS: [(&str, &str); 3] = [
    (NAME_FIELD, "Nombre"),
    (SURNAME_FIELD, "Apellido"),
    (EMAIL_FIELD, "Email"),
];

const REPORT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub head: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    /// File name without extension; writers append their own.
    pub file_stem: String,
    pub tables: Vec<ReportTable>,
}

impl ReportDocument {
    /// Feeds the document through `writer` and returns its output.
    pub fn write_with<W: DocumentWriter>(&self, mut writer: W) -> W::Output {
        writer.add_title(&self.title);
        for table in &self.tables {
            writer.add_table(table);
        }
        writer.finish()
    }
}

/// Seam towards a document-generation backend.
pub trait DocumentWriter {
    type Output;

    /// File extension (without dot) of the produced document.
    fn extension(&self) -> &'static str;
    fn add_title(&mut self, title: &str);
    fn add_table(&mut self, table: &ReportTable);
    fn finish(self) -> Self::Output;
}

/// Produces a JSON value `{title, tables: [{head, rows}]}`.
#[derive(Debug, Default)]
pub struct JsonDocumentWriter {
    title: String,
    tables: Vec<Value>,
}

impl DocumentWriter for JsonDocumentWriter {
    type Output = Value;

    fn extension(&self) -> &'static str {
        "json"
    }

    fn add_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn add_table(&mut self, table: &ReportTable) {
        self.tables.push(json!({"head": table.head, "rows": table.rows}));
    }

    fn finish(self) -> Value {
        json!({"title": self.title, "tables": self.tables})
    }
}

/// Renders the document as aligned plain-text tables.
#[derive(Debug, Default)]
pub struct TextDocumentWriter {
    out: String,
}

impl DocumentWriter for TextDocumentWriter {
    type Output = String;

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn add_title(&mut self, title: &str) {
        self.out.push_str(title);
        self.out.push('\n');
        self.out.push_str(&"=".repeat(title.chars().count()));
        self.out.push('\n');
    }

    fn add_table(&mut self, table: &ReportTable) {
        let mut widths: Vec<usize> = table.head.iter().map(|h| h.chars().count()).collect();
        for row in &table.rows {
            for (idx, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(idx) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }

        self.out.push('\n');
        push_row(&mut self.out, &table.head, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_row(&mut self.out, &rule, &widths);
        for row in &table.rows {
            push_row(&mut self.out, row, &widths);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(idx, &width)| {
            let cell = cells.get(idx).map(String::as_str).unwrap_or("");
            format!("{cell:<width$}")
        })
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

/// Report of a company's active or inactive employees.
///
/// Name, surname and email come first; the remaining declared fields follow
/// in declaration order.
pub fn employee_report(company: &CompanyAggregate, status: EmployeeStatus) -> ReportDocument {
    let extra_fields: Vec<&str> = company
        .fields
        .iter()
        .map(String::as_str)
        .filter(|field| !PINNED_COLUMNS.iter().any(|(pinned, _)| pinned == field))
        .collect();

    let head: Vec<String> = PINNED_COLUMNS
        .iter()
        .map(|(_, heading)| heading.to_string())
        .chain(extra_fields.iter().map(|field| field.to_string()))
        .collect();

    let rows: Vec<Vec<String>> = company
        .employees
        .iter()
        .filter(|employee| status.matches(employee.is_active()))
        .map(|employee| {
            PINNED_COLUMNS
                .iter()
                .map(|(field, _)| *field)
                .chain(extra_fields.iter().copied())
                .map(|field| employee.field(field).unwrap_or_default().to_string())
                .collect::<Vec<String>>()
        })
        .collect();

    let status_label = match status {
        EmployeeStatus::Active => "Activos",
        EmployeeStatus::Inactive => "Inactivos",
    };

    ReportDocument {
        title: format!("Reporte de Empleados {status_label} - {}", company.name),
        file_stem: format!("reporte_empleados_{}_{}", status.as_str(), company.name),
        tables: vec![ReportTable { head, rows }],
    }
}

/// Report of one company's history entries, dates rendered in `tz`.
pub fn history_report(
    company: &CompanyAggregate,
    history: &[HistoryEntry],
    tz: Tz,
) -> ReportDocument {
    let rows: Vec<Vec<String>> = history
        .iter()
        .filter(|entry| entry.company_id == company.id)
        .map(|entry| {
            let employee = company.employee(&entry.employee_id);
            vec![
                entry
                    .date
                    .with_timezone(&tz)
                    .format(REPORT_DATE_FORMAT)
                    .to_string(),
                employee.map(full_name).unwrap_or_default(),
                entry.action.label().to_string(),
            ]
        })
        .collect();

    ReportDocument {
        title: format!("Historial de Altas y Bajas - {}", company.name),
        file_stem: format!("historial_{}", company.name),
        tables: vec![ReportTable {
            head: vec!["Fecha".to_string(), "Empleado".to_string(), "Acción".to_string()],
            rows,
        }],
    }
}

fn full_name(employee: &EmployeeView) -> String {
    let name = employee.field(NAME_FIELD).unwrap_or_default();
    let surname = employee.field(SURNAME_FIELD).unwrap_or_default();
    format!("{name} {surname}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::assemble_company;
    use crate::types::{
        Company, CompanyField, CompanyKind, Employee, EmployeeField, HistoryAction,
    };
    use chrono::{TimeZone, Utc};

    fn company() -> CompanyAggregate {
        let fields: Vec<CompanyField> = ["telefono", "nombre", "email", "puesto", "apellido"]
            .iter()
            .map(|name| CompanyField {
                company_id: "c-1".to_string(),
                field_name: name.to_string(),
            })
            .collect();
        let employees = vec![
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
        ];
        let values = [
            ("e-1", "nombre", "Ana"),
            ("e-1", "apellido", "Gil"),
            ("e-1", "puesto", "CTO"),
            ("e-2", "nombre", "Luis"),
            ("e-2", "telefono", "555"),
        ]
        .iter()
        .map(|(employee, name, value)| EmployeeField {
            employee_id: employee.to_string(),
            field_name: name.to_string(),
            field_value: value.to_string(),
        })
        .collect::<Vec<_>>();

        assemble_company(
            Company {
                id: "c-1".to_string(),
                name: "Acme".to_string(),
                kind: CompanyKind::Company,
            },
            &fields,
            employees,
            &values,
        )
    }

    #[test]
    fn employee_report_pins_identity_columns_first() {
        let document = employee_report(&company(), EmployeeStatus::Active);
        assert_eq!(document.title, "Reporte de Empleados Activos - Acme");
        assert_eq!(document.file_stem, "reporte_empleados_active_Acme");

        let table = &document.tables[0];
        assert_eq!(table.head, vec!["Nombre", "Apellido", "Email", "telefono", "puesto"]);
        assert_eq!(table.rows, vec![vec!["Ana", "Gil", "", "", "CTO"]]);
    }

    #[test]
    fn employee_report_selects_inactive_employees() {
        let document = employee_report(&company(), EmployeeStatus::Inactive);
        assert_eq!(document.title, "Reporte de Empleados Inactivos - Acme");
        assert_eq!(document.tables[0].rows, vec![vec!["Luis", "", "", "555", ""]]);
    }

    #[test]
    fn history_report_keeps_only_the_company_entries() {
        let date = Utc.with_ymd_and_hms(2024, 5, 3, 23, 30, 0).unwrap();
        let history = vec![
            HistoryEntry {
                id: "h-1".to_string(),
                company_id: "c-1".to_string(),
                employee_id: "e-1".to_string(),
                action: HistoryAction::InitialRegistration,
                date,
            },
            HistoryEntry {
                id: "h-2".to_string(),
                company_id: "c-2".to_string(),
                employee_id: "e-9".to_string(),
                action: HistoryAction::Deactivation,
                date,
            },
            HistoryEntry {
                id: "h-3".to_string(),
                company_id: "c-1".to_string(),
                employee_id: "e-2".to_string(),
                action: HistoryAction::Deactivation,
                date,
            },
        ];

        let document = history_report(&company(), &history, chrono_tz::Europe::Madrid);
        assert_eq!(document.title, "Historial de Altas y Bajas - Acme");
        assert_eq!(document.file_stem, "historial_Acme");
        assert_eq!(
            document.tables[0].rows,
            vec![
                vec!["04/05/2024", "Ana Gil", "Alta inicial"],
                vec!["04/05/2024", "Luis", "Baja"],
            ]
        );
    }

    #[test]
    fn text_writer_aligns_columns() {
        let document = ReportDocument {
            title: "Report".to_string(),
            file_stem: "report".to_string(),
            tables: vec![ReportTable {
                head: vec!["A".to_string(), "Long".to_string()],
                rows: vec![vec!["wide cell".to_string(), "x".to_string()]],
            }],
        };

        let text = document.write_with(TextDocumentWriter::default());
        assert_eq!(
            text,
            "Report\n======\n\nA         | Long\n--------- | ----\nwide cell | x\n"
        );
    }

    #[test]
    fn json_writer_emits_title_and_tables() {
        let document = employee_report(&company(), EmployeeStatus::Inactive);
        let value = document.write_with(JsonDocumentWriter::default());
        assert_eq!(value["title"], "Reporte de Empleados Inactivos - Acme");
        assert_eq!(value["tables"][0]["head"][0], "Nombre");
        assert_eq!(value["tables"][0]["rows"][0][0], "Luis");
    }
}
