use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::get,
    Router,
};
use tracing::{instrument, warn};

use super::services::VerificationWorkflow;
use crate::state::AppState;

pub fn verify_routes() -> Router<AppState> {
    Router::new().route("/auth/verify/:token/:email", get(verify_account))
}

/// GET /auth/verify/{token}/{encrypted email} → redirect to the success or invalid page.
#[instrument(skip_all)]
pub async fn verify_account(
    State(state): State<AppState>,
    State(workflow): State<VerificationWorkflow>,
    Path((token, email)): Path<(String, String)>,
) -> Redirect {
    let links = &state.config.links;
    match workflow.confirm(&token, &email).await {
        Ok(_) => Redirect::to(&links.verify_success_url),
        Err(e) => {
            warn!(error = %e, "account verification failed");
            Redirect::to(&links.verify_invalid_url)
        }
    }
}
