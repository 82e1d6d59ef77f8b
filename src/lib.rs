//! Pattern detector is a web service that logs financial transactions and
//! flags the ones that look like fraud.
//!
//! A transaction is flagged when it is of high value, when the user has made
//! many small transactions in the last hour, or when it is one transfer in a
//! rapid series of transfers. Flags are computed once, when the transaction
//! is logged.
//!
//! This library provides the JSON REST API and the SQLite storage behind it.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::PrimitiveDateTime;
use tokio::signal;

mod app_state;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod not_found;
mod routing;
mod suspicion;
mod timestamp;
mod transaction;

pub use app_state::AppState;
pub use database_id::{DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_BODY_SIZE, logging_middleware};
pub use routing::build_router;
pub use suspicion::{SuspicionReason, SuspicionRules, TransactionHistory};
pub use transaction::{
    NewTransaction, SuspiciousTransactionResponse, Transaction, TransactionRequest,
    TransactionType, count_transactions, get_latest_transactions_of_type,
    get_suspicious_transactions_for_user, log_transaction,
};

use crate::not_found::NOT_FOUND_MESSAGE;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The start of a time window ending at the given timestamp cannot be
    /// represented, e.g. a transaction dated in the first hour of the
    /// earliest supported year.
    #[error("the window ending at {0} starts before the earliest supported date")]
    TimestampOutOfRange(PrimitiveDateTime),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::TimestampOutOfRange(_) => StatusCode::BAD_REQUEST,
            Error::SqlError(_) | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            Error::NotFound => NOT_FOUND_MESSAGE.to_owned(),
            error @ Error::TimestampOutOfRange(_) => error.to_string(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
