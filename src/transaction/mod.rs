//! Transaction logging and fraud flagging.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `NewTransaction` builder for creating transactions
//! - Database functions for storing and querying transactions
//! - The service functions that flag and store transactions
//! - The HTTP handlers for the transaction API

mod core;
mod log_transaction_endpoint;
mod service;
mod suspicious_transactions_endpoint;

pub use core::{
    NewTransaction, Transaction, TransactionType, count_transactions, create_transaction_table,
    get_latest_transactions_of_type, get_transactions_between, get_transactions_of_type_between,
};
pub use log_transaction_endpoint::log_transaction_endpoint;
pub use service::{
    SuspiciousTransactionResponse, TransactionRequest, get_suspicious_transactions_for_user,
    log_transaction,
};
pub use suspicious_transactions_endpoint::get_suspicious_transactions_endpoint;

#[cfg(test)]
pub use core::{create_transaction, get_transaction};
