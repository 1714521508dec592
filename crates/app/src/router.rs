use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics_exporter_prometheus::PrometheusHandle;

use bizadmin_storage::Database;
use bizadmin_util::OperatorCredentials;

use crate::recorder::{Clock, HistoryRecorder};
use crate::{api, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Clock,
    recorder: HistoryRecorder,
    operator: Arc<OperatorCredentials>,
    timezone: Tz,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        operator: OperatorCredentials,
        timezone: Tz,
    ) -> Self {
        let clock: Clock = Arc::new(Utc::now);
        let recorder = HistoryRecorder::new(storage.clone(), clock.clone());
        Self {
            metrics,
            storage,
            clock,
            recorder,
            operator: Arc::new(operator),
            timezone,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock.clone();
        self.recorder = HistoryRecorder::new(self.storage.clone(), clock);
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    pub fn operator(&self) -> &OperatorCredentials {
        &self.operator
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(
            "/api/companies",
            get(api::list_companies).post(api::create_company),
        )
        .route("/api/companies/summary", get(api::company_summaries))
        .route("/api/companies/:id", get(api::get_company))
        .route("/api/employees", post(api::create_employee))
        .route("/api/employees/:id", put(api::update_employee_status))
        .route(
            "/api/history",
            get(api::list_history).post(api::append_history),
        )
        .route("/api/history/view", get(api::history_view))
        .route("/api/dashboard", get(api::dashboard))
        .route(
            "/api/reports/companies/:id/employees",
            get(api::employees_report),
        )
        .route(
            "/api/reports/companies/:id/history",
            get(api::company_history_report),
        )
        .route("/api/login", post(api::login))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
