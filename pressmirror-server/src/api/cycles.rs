//! Manual cycle triggers. The cycle runs inline and its report is returned.

use axum::{extract::State, http::StatusCode, response::Json};

use pressmirror_core::publish::AbTestReport;
use pressmirror_core::reconcile::ReconcileReport;

use crate::scheduler::CycleError;
use crate::state::AppState;

pub async fn run_reconcile(
    State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, (StatusCode, String)> {
    let services = state.services();
    let report = state
        .reconcile_runner()
        .trigger(|| services.reconciler.run_cycle())
        .await
        .map_err(cycle_failure)?;
    Ok(Json(report))
}

pub async fn run_ab_test(
    State(state): State<AppState>,
) -> Result<Json<AbTestReport>, (StatusCode, String)> {
    let services = state.services();
    let report = state
        .ab_test_runner()
        .trigger(|| services.ab_test.run_once())
        .await
        .map_err(cycle_failure)?;
    Ok(Json(report))
}

fn cycle_failure(err: CycleError) -> (StatusCode, String) {
    match err {
        CycleError::AlreadyRunning(_) => (StatusCode::CONFLICT, err.to_string()),
        other => {
            tracing::warn!("[API] Manual cycle failed: {}", other);
            (StatusCode::BAD_GATEWAY, other.to_string())
        },
    }
}
