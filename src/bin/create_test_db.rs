use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, PrimitiveDateTime, macros::datetime};

use pattern_detector::{
    SuspicionRules, TransactionRequest, TransactionType, count_transactions,
    endpoints::{SUSPICIOUS_TRANSACTIONS_API, format_endpoint},
    get_latest_transactions_of_type, get_suspicious_transactions_for_user, initialize_db,
    log_transaction,
};

/// A utility for creating a test database for the REST API server of pattern_detector.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const START: PrimitiveDateTime = datetime!(2025-06-01 09:00);

/// Create and populate a database for manual testing.
///
/// Each demo user triggers one of the rules, except for "regular" who never does.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    let rules = SuspicionRules::default();
    let log = |user_id: &str, amount: f64, offset: Duration, transaction_type| {
        log_transaction(
            TransactionRequest {
                user_id: user_id.to_owned(),
                amount,
                timestamp: START + offset,
                transaction_type,
            },
            &rules,
            &conn,
        )
    };

    println!("Creating test transactions...");

    log("richguy", 20_000.0, Duration::ZERO, TransactionType::Deposit)?;

    for minute in 0..6 {
        log(
            "smallspender",
            50.0,
            Duration::minutes(minute),
            TransactionType::Withdrawal,
        )?;
    }

    for minute in 0..3 {
        log(
            "mover",
            500.0,
            Duration::minutes(minute),
            TransactionType::Transfer,
        )?;
    }

    for day in 0..3 {
        log(
            "regular",
            1_250.0,
            Duration::days(day),
            TransactionType::Deposit,
        )?;
    }

    println!("Created {} transactions.", count_transactions(&conn)?);

    for user_id in ["richguy", "smallspender", "mover", "regular"] {
        let flagged = get_suspicious_transactions_for_user(user_id, &conn)?;
        println!(
            "{user_id}: {} flagged, see {}",
            flagged.len(),
            format_endpoint(SUSPICIOUS_TRANSACTIONS_API, user_id)
        );
    }

    let latest_transfers =
        get_latest_transactions_of_type("mover", TransactionType::Transfer, 3, &conn)?;
    println!("Latest transfers of mover:");
    for transfer in latest_transfers {
        println!(
            "  #{} {} at {} (suspicious: {})",
            transfer.id, transfer.amount, transfer.timestamp, transfer.suspicious
        );
    }

    println!("Success!");

    Ok(())
}
