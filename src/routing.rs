//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState, endpoints,
    not_found::get_404_not_found,
    transaction::{get_suspicious_transactions_endpoint, log_transaction_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::TRANSACTIONS_API, post(log_transaction_endpoint))
        .route(
            endpoints::SUSPICIOUS_TRANSACTIONS_API,
            get(get_suspicious_transactions_endpoint),
        )
        .fallback(get_404_not_found)
        .with_state(state)
}
