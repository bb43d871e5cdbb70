use std::net::SocketAddr;

use crate::commands::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total console commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "parkmate_commands_total";

/// Counter: bookings appended to the ledger.
pub const BOOKINGS_TOTAL: &str = "parkmate_bookings_total";

/// Counter: simulated payments that declined.
pub const PAYMENT_FAILURES_TOTAL: &str = "parkmate_payment_failures_total";

/// Counter: admin login failures.
pub const AUTH_FAILURES_TOTAL: &str = "parkmate_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: notifications pushed to the feed. Labels: kind.
pub const NOTIFICATIONS_TOTAL: &str = "parkmate_notifications_total";

/// Histogram: event-log group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "parkmate_wal_flush_duration_seconds";

/// Histogram: event-log group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "parkmate_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Lots => "lots",
        Command::Floors { .. } => "floors",
        Command::Grid { .. } => "grid",
        Command::Book { .. } => "book",
        Command::Bookings => "bookings",
        Command::Pass { .. } => "pass",
        Command::Stats => "stats",
        Command::Revenue { .. } => "revenue",
        Command::Notifications => "notifications",
        Command::MarkRead => "mark_read",
        Command::Login { .. } => "login",
        Command::Logout => "logout",
        Command::Help => "help",
        Command::Quit => "quit",
    }
}
