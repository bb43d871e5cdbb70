use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use parkmate::catalog::Catalog;
use parkmate::commands::{self, Command};
use parkmate::engine::{
    BookingFlow, Engine, EngineError, PayerForm, SimulatedGateway, SlotView,
};
use parkmate::model::now_ms;
use parkmate::notify::NotificationCenter;
use parkmate::qr::PassPayload;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("PARKMATE_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    parkmate::observability::init(metrics_port);

    let data_dir = std::env::var("PARKMATE_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("PARKMATE_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let payment_delay_ms: u64 = std::env::var("PARKMATE_PAYMENT_DELAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);

    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("parkmate.log");

    let notify = Arc::new(NotificationCenter::new());
    let engine = Arc::new(Engine::new(Catalog::seed(), wal_path, notify)?);
    let gateway = SimulatedGateway::new(Duration::from_millis(payment_delay_ms));

    tokio::spawn(parkmate::watcher::run_expiry_watcher(engine.clone()));
    tokio::spawn(parkmate::watcher::run_compactor(
        engine.clone(),
        compact_threshold,
    ));

    info!("parkmate ready");
    info!("  data_dir: {data_dir}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"parkmate> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break; // stdin closed
        };
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match commands::parse(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };
        if matches!(cmd, Command::Quit) {
            break;
        }
        let label = parkmate::observability::command_label(&cmd);
        match execute(&engine, &gateway, cmd).await {
            Ok(output) => {
                metrics::counter!(parkmate::observability::COMMANDS_TOTAL,
                    "command" => label, "status" => "ok")
                .increment(1);
                println!("{output}");
            }
            Err(e) => {
                metrics::counter!(parkmate::observability::COMMANDS_TOTAL,
                    "command" => label, "status" => "error")
                .increment(1);
                println!("error ({:?}): {e}", e.class());
            }
        }
    }

    Ok(())
}

async fn execute(
    engine: &Arc<Engine>,
    gateway: &SimulatedGateway,
    cmd: Command,
) -> Result<String, EngineError> {
    match cmd {
        Command::Lots => {
            let mut out = String::new();
            for lot in engine.catalog.lots() {
                let available = engine.available(lot.id).await?;
                out.push_str(&format!(
                    "{}  {} — {available}/{} available, {} floors\n",
                    lot.id,
                    lot.name,
                    lot.total,
                    lot.floors.len()
                ));
            }
            Ok(out.trim_end().to_string())
        }
        Command::Floors { lot } => {
            let cfg = engine.catalog.lot(lot).ok_or(EngineError::UnknownLot(lot))?;
            let mut out = String::new();
            for floor in &cfg.floors {
                out.push_str(&format!(
                    "{}  {} — {} slots\n",
                    floor.id,
                    floor.name,
                    floor.slot_classes.len()
                ));
            }
            Ok(out.trim_end().to_string())
        }
        Command::Grid { lot, floor, filter } => {
            let grid = engine.visible_slots(lot, &floor, filter, None).await?;
            Ok(render_grid(&grid))
        }
        Command::Book {
            lot,
            floor,
            slot,
            vehicle,
            duration,
            name,
            phone,
            vehicle_number,
            email,
        } => {
            let selection = engine.select_slot(lot, &floor, &slot, Some(vehicle)).await?;
            let mut flow = BookingFlow::new(selection.clone(), duration);
            let form = PayerForm {
                name,
                phone,
                vehicle_number,
                email: email.unwrap_or_default(),
            };
            println!(
                "processing payment of Rs.{} for slot {} ...",
                flow.price(),
                selection.slot
            );
            let id = flow.submit(engine, gateway, &form).await?;
            if flow.close()? {
                engine.confirm_occupancy(&selection).await?;
            }
            Ok(format!("booked: {id}"))
        }
        Command::Bookings => {
            let ledger = engine.ledger_snapshot().await;
            if ledger.is_empty() {
                return Ok("no bookings yet".into());
            }
            let mut out = String::new();
            for b in &ledger {
                out.push_str(&format!(
                    "{}  lot {} {} {}  {}  {}h  Rs.{}\n",
                    b.id, b.lot, b.floor, b.slot, b.vehicle, b.duration, b.price
                ));
            }
            Ok(out.trim_end().to_string())
        }
        Command::Pass { booking } => match engine.booking(booking).await {
            Some(b) => Ok(PassPayload::from_booking(&b, now_ms()).to_json()),
            None => Ok(format!("no such booking: {booking}")),
        },
        Command::Stats => {
            engine.require_admin()?;
            let stats = engine.dashboard_stats(now_ms()).await;
            let by_vehicle = engine.bookings_by_vehicle().await;
            let mut out = format!(
                "revenue: Rs.{}\nbookings: {} ({} active)\noccupancy: {:.1}%\npopular vehicle: {}\npeak hours: {}\n",
                stats.total_revenue,
                stats.total_bookings,
                stats.active_bookings,
                stats.occupancy_rate,
                stats.popular_vehicle.display_name(),
                if stats.peak_hours.is_empty() {
                    "-".to_string()
                } else {
                    stats.peak_hours.join(", ")
                },
            );
            for (vehicle, count) in by_vehicle {
                out.push_str(&format!("  {}: {count}\n", vehicle.display_name()));
            }
            let hourly = engine.hourly_occupancy().await;
            for (hour, count) in hourly.iter().enumerate().filter(|(_, c)| **c > 0) {
                out.push_str(&format!("  {hour:>2}:00  {count}\n"));
            }
            Ok(out.trim_end().to_string())
        }
        Command::Revenue { range } => {
            engine.require_admin()?;
            let total = engine.revenue_in_range(range, now_ms()).await;
            Ok(format!("revenue ({}): Rs.{total}", range.label()))
        }
        Command::Notifications => {
            let entries = engine.notify.list();
            if entries.is_empty() {
                return Ok("no notifications".into());
            }
            let mut out = String::new();
            for n in &entries {
                let marker = if n.read { ' ' } else { '*' };
                out.push_str(&format!("{marker} [{}] {}: {}\n", n.kind.label(), n.title, n.message));
            }
            Ok(out.trim_end().to_string())
        }
        Command::MarkRead => {
            engine.notify.mark_all_read();
            Ok("all notifications marked read".into())
        }
        Command::Login { username, password } => {
            engine.admin_login(&username, &password).await?;
            Ok("admin session active".into())
        }
        Command::Logout => {
            engine.admin_logout().await?;
            Ok("logged out".into())
        }
        Command::Help => Ok(HELP.trim_end().to_string()),
        Command::Quit => Ok(String::new()),
    }
}

/// One text row per grid row: available slots show their code, occupied
/// ones are parenthesized, filtered-out ones dotted, lanes blank.
fn render_grid(grid: &[Vec<SlotView>]) -> String {
    let mut out = String::new();
    for row in grid {
        for cell in row {
            let rendered = match cell {
                SlotView::Empty => "        ".to_string(),
                SlotView::HiddenByFilter => "   ·    ".to_string(),
                SlotView::Available { vehicle } => format!("[{:>5}]", vehicle.code()),
                SlotView::Occupied => "( taken)".to_string(),
                SlotView::RecentlyBooked => "(booked)".to_string(),
            };
            out.push_str(&rendered);
            out.push(' ');
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

const HELP: &str = "\
commands:
  lots                             list parking lots
  floors <lot>                     list floors of a lot
  grid <lot> <floor> [vehicle]     show the slot grid, optionally filtered
  book <lot> <floor> <slot> <vehicle> <hours> <name> <phone> <plate> [email]
  bookings                         list the booking ledger
  pass <booking-id>                print the digital pass payload
  login <user> <password>          open the admin session
  logout                           close the admin session
  stats                            admin dashboard (requires login)
  revenue <today|week|month|year>  revenue report (requires login)
  notifications                    show the notification feed
  mark-read                        mark all notifications read
  quit                             exit
";
