//! Logging transactions and reading back the flagged ones.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    suspicion::SuspicionRules,
    timestamp::iso_timestamp,
    transaction::{
        Transaction, TransactionType,
        core::{create_transaction, get_suspicious_transactions},
    },
};

/// The JSON body for logging a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// The ID of the user that made the transaction.
    pub user_id: String,
    /// The amount of money moved.
    pub amount: f64,
    /// When the transaction happened, e.g. "2025-06-01T12:30:00".
    #[serde(with = "iso_timestamp")]
    pub timestamp: PrimitiveDateTime,
    /// What kind of transaction this is.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

/// A flagged transaction as returned to the client.
///
/// The user ID and the flag itself are left out, the client already knows both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousTransactionResponse {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money moved.
    pub amount: f64,
    /// When the transaction happened.
    #[serde(with = "iso_timestamp")]
    pub timestamp: PrimitiveDateTime,
    /// What kind of transaction this is.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

impl From<Transaction> for SuspiciousTransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            amount: transaction.amount,
            timestamp: transaction.timestamp,
            transaction_type: transaction.transaction_type,
        }
    }
}

/// Check `request` against `rules` and store it with the resulting flag.
///
/// The rules only see transactions stored before this one. Checking and
/// storing happen in one database transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::TimestampOutOfRange] if a rule window cannot be computed for the timestamp,
/// - or [Error::SqlError] if there is some SQL error.
pub fn log_transaction(
    request: TransactionRequest,
    rules: &SuspicionRules,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = Transaction::build(
        &request.user_id,
        request.amount,
        request.timestamp,
        request.transaction_type,
    );

    let reason = rules.first_matching_rule(&transaction, &*sql_transaction)?;

    let transaction = create_transaction(transaction.suspicious(reason.is_some()), &sql_transaction)?;
    sql_transaction.commit()?;

    match reason {
        Some(reason) => tracing::info!(
            "Flagged transaction {} of user {:?} as suspicious: {reason:?}",
            transaction.id,
            transaction.user_id
        ),
        None => tracing::debug!(
            "Logged transaction {} of user {:?}",
            transaction.id,
            transaction.user_id
        ),
    }

    Ok(transaction)
}

/// Get the flagged transactions of `user_id`, oldest first.
///
/// An unknown user has no flagged transactions.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn get_suspicious_transactions_for_user(
    user_id: &str,
    connection: &Connection,
) -> Result<Vec<SuspiciousTransactionResponse>, Error> {
    let transactions = get_suspicious_transactions(user_id, connection)?
        .into_iter()
        .map(SuspiciousTransactionResponse::from)
        .collect();

    Ok(transactions)
}
