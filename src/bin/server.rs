use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use pattern_detector::{
    AppState, SuspicionRules, build_router, graceful_shutdown, logging_middleware,
};

/// The REST API server for pattern_detector.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Transactions with an amount above this are flagged.
    #[arg(long, default_value_t = 10_000.0)]
    high_value_threshold: f64,

    /// Transactions with an amount below this count as small.
    #[arg(long, default_value_t = 100.0)]
    small_amount_threshold: f64,

    /// The number of earlier small transactions within the window that flags
    /// the next transaction.
    #[arg(long, default_value_t = 5)]
    small_transaction_count: usize,

    /// The length of the window for counting small transactions.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    small_transaction_window_minutes: u32,

    /// The number of transfers within the window, including the new one,
    /// that flags the new transfer.
    #[arg(long, default_value_t = 3)]
    rapid_transfer_count: usize,

    /// The length of the window for counting transfers.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    rapid_transfer_window_minutes: u32,
}

impl Args {
    fn suspicion_rules(&self) -> SuspicionRules {
        SuspicionRules {
            high_value_threshold: self.high_value_threshold,
            small_amount_threshold: self.small_amount_threshold,
            small_transaction_count: self.small_transaction_count,
            small_transaction_window: Duration::minutes(
                self.small_transaction_window_minutes.into(),
            ),
            rapid_transfer_count: self.rapid_transfer_count,
            rapid_transfer_window: Duration::minutes(self.rapid_transfer_window_minutes.into()),
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open database at {:?}: {error}", args.db_path);
            exit(1);
        }
    };

    let rules = args.suspicion_rules();
    tracing::info!("Flagging transactions with {rules:?}");

    let app_state = match AppState::new(conn, rules) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            exit(1);
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(app_state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
