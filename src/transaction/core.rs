//! Defines the core data models and database queries for transactions.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql, named_params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{Error, database_id::TransactionId, timestamp::SqlTimestamp};

// ============================================================================
// MODELS
// ============================================================================

/// The kind of money movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Money paid into the user's account.
    Deposit,
    /// Money taken out of the user's account.
    Withdrawal,
    /// Money moved from the user's account to another account.
    Transfer,
}

impl TransactionType {
    /// The name used for the type in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// A logged movement of money for a user.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The ID of the user that made the transaction.
    pub user_id: String,
    /// The amount of money moved.
    pub amount: f64,
    /// When the transaction happened.
    pub timestamp: PrimitiveDateTime,
    /// What kind of transaction this is.
    pub transaction_type: TransactionType,
    /// Whether the transaction was flagged when it was logged.
    ///
    /// This is decided once, when the transaction is created, and never
    /// changes afterwards.
    pub suspicious: bool,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(
        user_id: &str,
        amount: f64,
        timestamp: PrimitiveDateTime,
        transaction_type: TransactionType,
    ) -> NewTransaction {
        NewTransaction {
            user_id: user_id.to_owned(),
            amount,
            timestamp,
            transaction_type,
            suspicious: false,
        }
    }
}

/// A transaction that has not been stored yet.
///
/// # Examples
///
/// ```ignore
/// use time::macros::datetime;
///
/// use crate::transaction::{Transaction, TransactionType};
///
/// let transaction = Transaction::build(
///         "alice",
///         20_000.0,
///         datetime!(2025-01-15 09:30),
///         TransactionType::Deposit,
///     )
///     .suspicious(true);
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct NewTransaction {
    /// The ID of the user that made the transaction.
    pub user_id: String,
    /// The amount of money moved.
    pub amount: f64,
    /// When the transaction happened.
    pub timestamp: PrimitiveDateTime,
    /// What kind of transaction this is.
    pub transaction_type: TransactionType,
    /// Whether the transaction should be stored as flagged.
    ///
    /// Defaults to `false`.
    pub suspicious: bool,
}

impl NewTransaction {
    /// Set whether the transaction is flagged.
    pub fn suspicious(mut self, suspicious: bool) -> Self {
        self.suspicious = suspicious;
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, amount, timestamp, type, suspicious FROM \"transaction\"";

/// Create a new transaction in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn create_transaction(
    transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, amount, timestamp, type, suspicious)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, user_id, amount, timestamp, type, suspicious",
        )?
        .query_row(
            (
                transaction.user_id,
                transaction.amount,
                SqlTimestamp(transaction.timestamp),
                transaction.transaction_type,
                transaction.suspicious,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
#[cfg(test)]
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!("{SELECT_COLUMNS} WHERE id = :id"))?
        .query_one(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Get the transactions of `user_id` with a timestamp between `start` and
/// `end`, both inclusive, in chronological order.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions_between(
    user_id: &str,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = :user_id AND timestamp BETWEEN :start AND :end
             ORDER BY timestamp ASC, id ASC"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id,
                ":start": SqlTimestamp(start),
                ":end": SqlTimestamp(end),
            },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Get the transactions of `user_id` of type `transaction_type` with a
/// timestamp between `start` and `end`, both inclusive, in chronological
/// order.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions_of_type_between(
    user_id: &str,
    transaction_type: TransactionType,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = :user_id AND type = :type AND timestamp BETWEEN :start AND :end
             ORDER BY timestamp ASC, id ASC"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id,
                ":type": transaction_type,
                ":start": SqlTimestamp(start),
                ":end": SqlTimestamp(end),
            },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Get the flagged transactions of `user_id`, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_suspicious_transactions(
    user_id: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = :user_id AND suspicious = 1
             ORDER BY timestamp ASC, id ASC"
        ))?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Get up to `limit` of the most recent transactions of `user_id` of type
/// `transaction_type`, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_latest_transactions_of_type(
    user_id: &str,
    transaction_type: TransactionType,
    limit: u32,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = :user_id AND type = :type
             ORDER BY timestamp DESC, id DESC
             LIMIT :limit"
        ))?
        .query_map(
            named_params! {
                ":user_id": user_id,
                ":type": transaction_type,
                ":limit": limit,
            },
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                amount REAL NOT NULL,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('DEPOSIT', 'WITHDRAWAL', 'TRANSFER')),
                suspicious INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    // Indexes for the time window lookups of the suspicion rules.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_timestamp
            ON \"transaction\"(user_id, timestamp);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_type_timestamp
            ON \"transaction\"(user_id, type, timestamp);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let user_id = row.get(1)?;
    let amount = row.get(2)?;
    let SqlTimestamp(timestamp) = row.get(3)?;
    let transaction_type = row.get(4)?;
    let suspicious = row.get(5)?;

    Ok(Transaction {
        id,
        user_id,
        amount,
        timestamp,
        transaction_type,
        suspicious,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        db::initialize,
        transaction::{
            Transaction, TransactionType, count_transactions, create_transaction,
            get_latest_transactions_of_type, get_transaction, get_transactions_between,
            get_transactions_of_type_between,
        },
    };

    use super::get_suspicious_transactions;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let timestamp = datetime!(2025-10-05 12:00);

        let result = create_transaction(
            Transaction::build("alice", 12.3, timestamp, TransactionType::Deposit)
                .suspicious(true),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.id, 1);
                assert_eq!(transaction.user_id, "alice");
                assert_eq!(transaction.amount, 12.3);
                assert_eq!(transaction.timestamp, timestamp);
                assert_eq!(transaction.transaction_type, TransactionType::Deposit);
                assert!(transaction.suspicious);
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn get_returns_stored_transaction() {
        let conn = get_test_connection();
        let want = create_transaction(
            Transaction::build(
                "alice",
                99.5,
                datetime!(2025-10-05 12:00:30.25),
                TransactionType::Transfer,
            ),
            &conn,
        )
        .unwrap();

        let got = get_transaction(want.id, &conn);

        assert_eq!(got, Ok(want));
    }

    #[test]
    fn get_fails_on_missing_id() {
        let conn = get_test_connection();

        let got = get_transaction(42, &conn);

        assert_eq!(got, Err(Error::NotFound));
    }

    #[test]
    fn get_count() {
        let conn = get_test_connection();
        let timestamp = datetime!(2025-10-05 12:00);
        let want_count = 20;
        for i in 1..=want_count {
            create_transaction(
                Transaction::build("alice", i as f64, timestamp, TransactionType::Deposit),
                &conn,
            )
            .expect("Could not create transaction");
        }

        let got_count = count_transactions(&conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }

    #[test]
    fn between_is_inclusive_and_filters_by_user() {
        let conn = get_test_connection();
        let create = |user_id: &str, timestamp| {
            create_transaction(
                Transaction::build(user_id, 10.0, timestamp, TransactionType::Withdrawal),
                &conn,
            )
            .unwrap()
        };
        create("alice", datetime!(2025-10-05 10:59:59.999));
        let at_start = create("alice", datetime!(2025-10-05 11:00));
        let inside = create("alice", datetime!(2025-10-05 11:30));
        let at_end = create("alice", datetime!(2025-10-05 12:00));
        create("alice", datetime!(2025-10-05 12:00:00.001));
        create("bob", datetime!(2025-10-05 11:30));

        let got = get_transactions_between(
            "alice",
            datetime!(2025-10-05 11:00),
            datetime!(2025-10-05 12:00),
            &conn,
        )
        .unwrap();

        assert_eq!(got, vec![at_start, inside, at_end]);
    }

    #[test]
    fn between_filters_by_type() {
        let conn = get_test_connection();
        let timestamp = datetime!(2025-10-05 12:00);
        create_transaction(
            Transaction::build("alice", 10.0, timestamp, TransactionType::Deposit),
            &conn,
        )
        .unwrap();
        let transfer = create_transaction(
            Transaction::build("alice", 10.0, timestamp, TransactionType::Transfer),
            &conn,
        )
        .unwrap();

        let got = get_transactions_of_type_between(
            "alice",
            TransactionType::Transfer,
            datetime!(2025-10-05 11:55),
            timestamp,
            &conn,
        )
        .unwrap();

        assert_eq!(got, vec![transfer]);
    }

    #[test]
    fn suspicious_are_ordered_by_timestamp() {
        let conn = get_test_connection();
        let later = create_transaction(
            Transaction::build(
                "alice",
                20_000.0,
                datetime!(2025-10-05 12:00),
                TransactionType::Deposit,
            )
            .suspicious(true),
            &conn,
        )
        .unwrap();
        create_transaction(
            Transaction::build(
                "alice",
                5.0,
                datetime!(2025-10-05 11:00),
                TransactionType::Deposit,
            ),
            &conn,
        )
        .unwrap();
        let earlier = create_transaction(
            Transaction::build(
                "alice",
                30_000.0,
                datetime!(2025-10-04 12:00),
                TransactionType::Deposit,
            )
            .suspicious(true),
            &conn,
        )
        .unwrap();

        let got = get_suspicious_transactions("alice", &conn).unwrap();

        assert_eq!(got, vec![earlier, later]);
    }

    #[test]
    fn latest_of_type_are_newest_first_and_limited() {
        let conn = get_test_connection();
        let mut transfers = Vec::new();
        for minute in 0..5 {
            let timestamp = datetime!(2025-10-05 12:00) + time::Duration::minutes(minute);
            transfers.push(
                create_transaction(
                    Transaction::build("alice", 10.0, timestamp, TransactionType::Transfer),
                    &conn,
                )
                .unwrap(),
            );
        }

        let got =
            get_latest_transactions_of_type("alice", TransactionType::Transfer, 3, &conn).unwrap();

        let want: Vec<_> = transfers.into_iter().rev().take(3).collect();
        assert_eq!(got, want);
    }
}
