//! Defines the endpoint for listing a user's flagged transactions.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{AppState, Error, transaction::service::get_suspicious_transactions_for_user};

/// The state needed to list flagged transactions.
#[derive(Debug, Clone)]
pub struct SuspiciousTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SuspiciousTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that responds with the flagged transactions of `user_id`
/// as a JSON array, oldest first.
pub async fn get_suspicious_transactions_endpoint(
    State(state): State<SuspiciousTransactionsState>,
    Path(user_id): Path<String>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_suspicious_transactions_for_user(&user_id, &connection) {
        Ok(transactions) => Json(transactions).into_response(),
        Err(error) => {
            tracing::error!("could not get suspicious transactions for {user_id:?}: {error}");
            error.into_response()
        }
    }
}
