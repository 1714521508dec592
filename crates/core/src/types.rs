use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Dynamic field carrying an employee's first name.
pub const NAME_FIELD: &str = "nombre";
/// Dynamic field carrying an employee's surname.
pub const SURNAME_FIELD: &str = "apellido";
/// Dynamic field carrying an employee's email address.
pub const EMAIL_FIELD: &str = "email";

/// Field names a freshly created company declares unless the operator edits them.
pub const DEFAULT_COMPANY_FIELDS: [&str; 3] = [NAME_FIELD, SURNAME_FIELD, EMAIL_FIELD];

/// Dynamic attribute values attached to an employee, keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

/// Kind of organisation registered by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyKind {
    #[default]
    #[serde(alias = "empresa")]
    Company,
    #[serde(alias = "negocio")]
    Business,
    #[serde(alias = "proyecto")]
    Project,
}

impl CompanyKind {
    /// Returns the canonical database representation for the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Business => "business",
            Self::Project => "project",
        }
    }

    /// Parses a stored value, accepting the legacy Spanish names.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "company" | "empresa" => Some(Self::Company),
            "business" | "negocio" => Some(Self::Business),
            "project" | "proyecto" => Some(Self::Project),
            _ => None,
        }
    }
}

/// Company row as persisted in the `companies` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CompanyKind,
}

/// Declaration of a dynamic field permitted for a company's employees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyField {
    pub company_id: String,
    pub field_name: String,
}

/// Employee row as persisted in the `employees` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub company_id: String,
    pub is_active: bool,
}

/// Entity-attribute-value row holding one dynamic field of an employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeField {
    pub employee_id: String,
    pub field_name: String,
    pub field_value: String,
}

/// Lifecycle transition recorded in the history log.
///
/// The wire format is a free-form string: the three known transitions use
/// their canonical names and anything else is kept verbatim in [`HistoryAction::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryAction {
    InitialRegistration,
    Deactivation,
    Reactivation,
    Other(String),
}

impl HistoryAction {
    /// Returns the action matching an employee status change to `now_active`.
    pub fn for_status_change(now_active: bool) -> Self {
        if now_active {
            Self::Reactivation
        } else {
            Self::Deactivation
        }
    }

    /// Parses an action string. Only the canonical names map onto the known
    /// actions; any other text, legacy names included, is kept verbatim.
    pub fn parse(value: &str) -> Self {
        match value {
            "initial_registration" => Self::InitialRegistration,
            "deactivation" => Self::Deactivation,
            "reactivation" => Self::Reactivation,
            _ => Self::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InitialRegistration => "initial_registration",
            Self::Deactivation => "deactivation",
            Self::Reactivation => "reactivation",
            Self::Other(raw) => raw,
        }
    }

    /// Localized label shown in the history view and reports.
    ///
    /// Legacy Spanish names get the label of the action they stand for.
    pub fn label(&self) -> &str {
        match self {
            Self::InitialRegistration => "Alta inicial",
            Self::Deactivation => "Baja",
            Self::Reactivation => "Reactivación",
            Self::Other(raw) => match raw.trim().to_lowercase().as_str() {
                "alta inicial" | "alta" => "Alta inicial",
                "baja" => "Baja",
                "reactivacion" | "reactivación" => "Reactivación",
                _ => raw,
            },
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HistoryAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HistoryAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Immutable audit record of an employee lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub company_id: String,
    pub employee_id: String,
    pub action: HistoryAction,
    pub date: DateTime<Utc>,
}

/// Employee status selector used by reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn matches(self, is_active: bool) -> bool {
        match self {
            Self::Active => is_active,
            Self::Inactive => !is_active,
        }
    }
}

/// Request payload for registering a company together with its field declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CompanyKind,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Request payload for adding an employee.
///
/// Every key besides `id`, `companyId` and `isActive` is a dynamic field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(default)]
    pub id: Option<String>,
    pub company_id: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl NewEmployee {
    /// Whether the employee starts active; absent means active.
    pub fn starts_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }

    /// Returns the dynamic fields as text. `null` values are skipped and other
    /// scalars are rendered with their JSON representation.
    pub fn field_values(&self) -> FieldMap {
        self.fields
            .iter()
            .filter_map(|(name, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Some((name.clone(), text))
            })
            .collect()
    }
}

/// Request payload for changing an employee's active flag.
///
/// An absent `isActive` flips the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Request payload for appending a history entry directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub company_id: String,
    pub employee_id: String,
    pub action: HistoryAction,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn company_kind_accepts_legacy_names() {
        let kind: CompanyKind = serde_json::from_value(json!("negocio")).expect("kind");
        assert_eq!(kind, CompanyKind::Business);
        assert_eq!(serde_json::to_value(kind).expect("serialize"), json!("business"));
        assert_eq!(CompanyKind::parse("proyecto"), Some(CompanyKind::Project));
        assert_eq!(CompanyKind::parse("unknown"), None);
    }

    #[test]
    fn history_action_keeps_legacy_text_and_labels_it() {
        let legacy = HistoryAction::parse("Baja");
        assert_eq!(legacy, HistoryAction::Other("Baja".to_string()));
        assert_eq!(legacy.as_str(), "Baja");
        assert_eq!(legacy.label(), "Baja");
        assert_eq!(HistoryAction::parse("alta").label(), "Alta inicial");
        assert_eq!(HistoryAction::parse("reactivacion").label(), "Reactivación");
        assert_eq!(HistoryAction::parse("deactivation"), HistoryAction::Deactivation);

        let custom = HistoryAction::parse("transfer");
        assert_eq!(custom, HistoryAction::Other("transfer".to_string()));
        assert_eq!(custom.label(), "transfer");

        let decoded: HistoryAction = serde_json::from_value(json!("alta")).expect("action");
        assert_eq!(serde_json::to_value(&decoded).expect("serialize"), json!("alta"));
    }

    #[test]
    fn history_action_for_status_change() {
        assert_eq!(HistoryAction::for_status_change(false), HistoryAction::Deactivation);
        assert_eq!(HistoryAction::for_status_change(true), HistoryAction::Reactivation);
        assert_eq!(HistoryAction::Reactivation.label(), "Reactivación");
    }

    #[test]
    fn new_employee_collects_dynamic_fields() {
        let payload: NewEmployee = serde_json::from_value(json!({
            "id": "e-1",
            "companyId": "c-1",
            "nombre": "Ana",
            "email": "a@x.com",
            "edad": 31,
            "notas": null
        }))
        .expect("payload");

        assert_eq!(payload.id.as_deref(), Some("e-1"));
        assert_eq!(payload.company_id, "c-1");
        assert!(payload.starts_active());

        let fields = payload.field_values();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("nombre").map(String::as_str), Some("Ana"));
        assert_eq!(fields.get("edad").map(String::as_str), Some("31"));
        assert!(!fields.contains_key("notas"));
    }

    #[test]
    fn new_company_defaults_kind_and_fields() {
        let payload: NewCompany =
            serde_json::from_value(json!({"name": "Acme"})).expect("payload");
        assert_eq!(payload.kind, CompanyKind::Company);
        assert!(payload.fields.is_empty());
        assert!(payload.id.is_none());
    }
}
