//! Rules for deciding whether a new transaction looks like fraud.
//!
//! A transaction is suspicious if any of these hold:
//! - its amount is above the high value threshold,
//! - the user already has enough small transactions in the hour before it,
//! - it is a transfer and the user already made enough transfers in the five
//!   minutes before it.
//!
//! Only transactions that are already stored count towards the windows, so
//! rules must be evaluated before the new transaction is stored.

use rusqlite::Connection;
use time::{Duration, PrimitiveDateTime};

use crate::{
    Error,
    transaction::{
        NewTransaction, Transaction, TransactionType, get_transactions_between,
        get_transactions_of_type_between,
    },
};

/// Read access to the stored transactions that the rules are checked against.
pub trait TransactionHistory {
    /// Get the transactions of `user_id` with a timestamp between `start` and
    /// `end`, both inclusive.
    ///
    /// # Errors
    /// Returns an error if the history could not be read.
    fn transactions_between(
        &self,
        user_id: &str,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<Transaction>, Error>;

    /// Get the transactions of `user_id` of type `transaction_type` with a
    /// timestamp between `start` and `end`, both inclusive.
    ///
    /// # Errors
    /// Returns an error if the history could not be read.
    fn transactions_of_type_between(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<Transaction>, Error>;
}

impl TransactionHistory for Connection {
    fn transactions_between(
        &self,
        user_id: &str,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<Transaction>, Error> {
        get_transactions_between(user_id, start, end, self)
    }

    fn transactions_of_type_between(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<Transaction>, Error> {
        get_transactions_of_type_between(user_id, transaction_type, start, end, self)
    }
}

/// The rule that caused a transaction to be flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionReason {
    /// The amount was above [SuspicionRules::high_value_threshold].
    HighValue,
    /// The user made too many small transactions within the window.
    FrequentSmallTransactions,
    /// The user made too many transfers within the window.
    RapidTransfers,
}

/// The thresholds used to flag transactions.
///
/// The [Default] values are the ones the service is meant to run with.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionRules {
    /// Amounts strictly greater than this are flagged.
    pub high_value_threshold: f64,
    /// Amounts strictly less than this count as small.
    pub small_amount_threshold: f64,
    /// How many stored small transactions within
    /// [SuspicionRules::small_transaction_window] flag the next one.
    pub small_transaction_count: usize,
    /// The length of the window for counting small transactions.
    pub small_transaction_window: Duration,
    /// How many transfers within [SuspicionRules::rapid_transfer_window],
    /// including the new one, flag the new one.
    pub rapid_transfer_count: usize,
    /// The length of the window for counting transfers.
    pub rapid_transfer_window: Duration,
}

impl Default for SuspicionRules {
    fn default() -> Self {
        Self {
            high_value_threshold: 10_000.0,
            small_amount_threshold: 100.0,
            small_transaction_count: 5,
            small_transaction_window: Duration::hours(1),
            rapid_transfer_count: 3,
            rapid_transfer_window: Duration::minutes(5),
        }
    }
}

impl SuspicionRules {
    /// Whether `transaction` should be flagged given the stored `history`.
    ///
    /// # Errors
    /// Returns an error if the history could not be read or a window start
    /// is out of range.
    pub fn is_suspicious(
        &self,
        transaction: &NewTransaction,
        history: &impl TransactionHistory,
    ) -> Result<bool, Error> {
        Ok(self.first_matching_rule(transaction, history)?.is_some())
    }

    /// Find the first rule that `transaction` breaks, checking the rules in
    /// the order high value, frequent small transactions, rapid transfers.
    ///
    /// Rules after the first match are not checked and do not query `history`.
    ///
    /// # Errors
    /// Returns an error if the history could not be read or a window start
    /// is out of range.
    pub fn first_matching_rule(
        &self,
        transaction: &NewTransaction,
        history: &impl TransactionHistory,
    ) -> Result<Option<SuspicionReason>, Error> {
        if self.is_high_value(transaction) {
            return Ok(Some(SuspicionReason::HighValue));
        }

        if self.is_frequent_small_transactions(transaction, history)? {
            return Ok(Some(SuspicionReason::FrequentSmallTransactions));
        }

        if self.is_rapid_transfer(transaction, history)? {
            return Ok(Some(SuspicionReason::RapidTransfers));
        }

        Ok(None)
    }

    fn is_high_value(&self, transaction: &NewTransaction) -> bool {
        transaction.amount > self.high_value_threshold
    }

    fn is_frequent_small_transactions(
        &self,
        transaction: &NewTransaction,
        history: &impl TransactionHistory,
    ) -> Result<bool, Error> {
        let start = window_start(transaction.timestamp, self.small_transaction_window)?;
        let small_count = history
            .transactions_between(&transaction.user_id, start, transaction.timestamp)?
            .iter()
            .filter(|stored| stored.amount < self.small_amount_threshold)
            .count();

        Ok(small_count >= self.small_transaction_count)
    }

    fn is_rapid_transfer(
        &self,
        transaction: &NewTransaction,
        history: &impl TransactionHistory,
    ) -> Result<bool, Error> {
        if transaction.transaction_type != TransactionType::Transfer {
            return Ok(false);
        }

        let start = window_start(transaction.timestamp, self.rapid_transfer_window)?;
        let transfers = history.transactions_of_type_between(
            &transaction.user_id,
            TransactionType::Transfer,
            start,
            transaction.timestamp,
        )?;

        // The new transfer is not stored yet.
        Ok(transfers.len() >= self.rapid_transfer_count.saturating_sub(1))
    }
}

fn window_start(end: PrimitiveDateTime, length: Duration) -> Result<PrimitiveDateTime, Error> {
    end.checked_sub(length).ok_or(Error::TimestampOutOfRange(end))
}
