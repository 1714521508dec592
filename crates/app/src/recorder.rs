use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{error, info};

use bizadmin_core::types::{HistoryAction, HistoryEntry};
use bizadmin_storage::{generate_id, Database};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Appends one history entry per employee lifecycle transition.
///
/// A failed append never fails the caller: the error is logged and counted,
/// and `false` is returned so the response can report it.
#[derive(Clone)]
pub struct HistoryRecorder {
    database: Database,
    clock: Clock,
}

impl HistoryRecorder {
    pub fn new(database: Database, clock: Clock) -> Self {
        Self { database, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn record(&self, company_id: &str, employee_id: &str, action: HistoryAction) -> bool {
        let entry = HistoryEntry {
            id: generate_id(),
            company_id: company_id.to_string(),
            employee_id: employee_id.to_string(),
            action,
            date: self.now(),
        };

        match self.database.history().append(&entry).await {
            Ok(()) => {
                info!(
                    stage = "history",
                    history_id = %entry.id,
                    company_id,
                    employee_id,
                    action = %entry.action,
                    "history entry recorded"
                );
                true
            }
            Err(err) => {
                counter!("history_record_failures_total", "action" => entry.action.as_str().to_string())
                    .increment(1);
                error!(
                    stage = "history",
                    company_id,
                    employee_id,
                    action = %entry.action,
                    error = %err,
                    "failed to record history entry"
                );
                false
            }
        }
    }
}
