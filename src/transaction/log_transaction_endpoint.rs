//! Defines the endpoint for logging a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    suspicion::SuspicionRules,
    transaction::service::{TransactionRequest, log_transaction},
};

/// The state needed to log a transaction.
#[derive(Debug, Clone)]
pub struct LogTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The thresholds used to flag new transactions.
    pub rules: SuspicionRules,
}

impl FromRef<AppState> for LogTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            rules: state.rules.clone(),
        }
    }
}

/// A route handler for logging a new transaction, responds with 201 Created
/// and an empty body on success.
pub async fn log_transaction_endpoint(
    State(state): State<LogTransactionState>,
    Json(request): Json<TransactionRequest>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    if let Err(error) = log_transaction(request, &state.rules, &connection) {
        tracing::error!("could not log transaction: {error}");

        return error.into_response();
    }

    StatusCode::CREATED.into_response()
}
