//! Background maintenance tasks: the expiry watcher that surfaces
//! expiring/expired bookings as notifications, and the log compactor.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::Engine;
use crate::model::{Booking, Ms, now_ms};
use crate::notify::NotifyKind;

/// Scan cadence for both background tasks.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Warn when a booking ends within this window.
const WARN_WINDOW_MS: Ms = 30 * 60 * 1000;

/// Report expiry only within this grace after the end time, so a long-dead
/// booking found after a restart does not spam the feed.
const EXPIRY_GRACE_MS: Ms = 5 * 60 * 1000;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExpiryAlert {
    Warn,
    Expired,
}

/// Classify one booking against `now`, deduplicating through the
/// already-alerted sets. Pure so the windows are testable without a clock.
pub(crate) fn classify(
    booking: &Booking,
    now: Ms,
    warned: &HashSet<Ulid>,
    expired: &HashSet<Ulid>,
) -> Option<ExpiryAlert> {
    if expired.contains(&booking.id) {
        return None;
    }
    let remaining = booking.end - now;
    if remaining <= 0 {
        // Past the end time; alert only within the grace window.
        return (-remaining <= EXPIRY_GRACE_MS).then_some(ExpiryAlert::Expired);
    }
    if remaining <= WARN_WINDOW_MS && !warned.contains(&booking.id) {
        return Some(ExpiryAlert::Warn);
    }
    None
}

/// Periodically scan the ledger and push expiring-soon / expired
/// notifications. Read-only: no slot is ever released.
pub async fn run_expiry_watcher(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(SCAN_INTERVAL);
    let mut warned: HashSet<Ulid> = HashSet::new();
    let mut expired: HashSet<Ulid> = HashSet::new();

    loop {
        interval.tick().await;
        let now = now_ms();
        for booking in engine.ledger_snapshot().await {
            match classify(&booking, now, &warned, &expired) {
                Some(ExpiryAlert::Warn) => {
                    warned.insert(booking.id);
                    let minutes = ((booking.end - now) / 60_000).max(1);
                    engine.notify.push(
                        NotifyKind::Warning,
                        "Parking Expiring Soon",
                        format!(
                            "Your booking for slot {} expires in {minutes} minutes.",
                            booking.slot
                        ),
                        Some(booking.id),
                    );
                }
                Some(ExpiryAlert::Expired) => {
                    expired.insert(booking.id);
                    engine.notify.push(
                        NotifyKind::Info,
                        "Parking Expired",
                        format!("Your booking for slot {} has expired.", booking.slot),
                        Some(booking.id),
                    );
                    debug!(booking = %booking.id, slot = %booking.slot, "booking expired");
                }
                None => {}
            }
        }
    }
}

/// Periodically compact the event log once enough appends accumulated.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(SCAN_INTERVAL);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!(appends, "compacted event log"),
            Err(e) => warn!(error = %e, "event log compaction failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DurationCode, PayerProfile, SlotId, VehicleClass};

    const MIN: Ms = 60_000;

    fn booking_ending_at(end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            lot: 1,
            floor: "G".into(),
            slot: SlotId::from("G1-C"),
            vehicle: VehicleClass::Car,
            duration: DurationCode::H1,
            price: 20,
            payer: PayerProfile {
                name: "T".into(),
                phone: "1".into(),
                vehicle_number: "X".into(),
                email: None,
            },
            created_at: 0,
            start: 0,
            end,
        }
    }

    #[test]
    fn far_from_expiry_is_quiet() {
        let b = booking_ending_at(100 * MIN);
        assert_eq!(classify(&b, 0, &HashSet::new(), &HashSet::new()), None);
    }

    #[test]
    fn warns_inside_thirty_minutes() {
        let b = booking_ending_at(29 * MIN);
        assert_eq!(
            classify(&b, 0, &HashSet::new(), &HashSet::new()),
            Some(ExpiryAlert::Warn)
        );
    }

    #[test]
    fn warns_once() {
        let b = booking_ending_at(29 * MIN);
        let warned = HashSet::from([b.id]);
        assert_eq!(classify(&b, 0, &warned, &HashSet::new()), None);
    }

    #[test]
    fn expires_within_grace() {
        let b = booking_ending_at(0);
        assert_eq!(
            classify(&b, 4 * MIN, &HashSet::new(), &HashSet::new()),
            Some(ExpiryAlert::Expired)
        );
    }

    #[test]
    fn stale_expiry_is_skipped() {
        let b = booking_ending_at(0);
        assert_eq!(classify(&b, 6 * MIN, &HashSet::new(), &HashSet::new()), None);
    }

    #[test]
    fn expired_reported_once() {
        let b = booking_ending_at(0);
        let expired = HashSet::from([b.id]);
        assert_eq!(classify(&b, MIN, &HashSet::new(), &expired), None);
    }

    #[test]
    fn expired_wins_over_warned_set() {
        // A booking that was warned about still gets its expiry alert.
        let b = booking_ending_at(0);
        let warned = HashSet::from([b.id]);
        assert_eq!(
            classify(&b, MIN, &warned, &HashSet::new()),
            Some(ExpiryAlert::Expired)
        );
    }
}
