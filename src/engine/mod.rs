mod booking;
mod error;
mod selector;
mod stats;

pub use booking::{BookingFlow, FlowState, PayerForm, PaymentGateway, SimulatedGateway};
pub use error::{EngineError, ErrorClass};
pub use selector::{SlotSelection, SlotView, compute_visible_slots};
pub use stats::{DashboardStats, RevenueRange};

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::catalog::Catalog;
use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::*;
use crate::notify::NotificationCenter;
use crate::wal::{ReplayError, Wal};

/// Demo-only admin gate. These are deliberately hardcoded and public —
/// this is a placeholder surface, never a security boundary.
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Mutable per-lot state: the occupied-slot set and the available counter.
/// Occupancy never shrinks — booked slots stay taken for the store's life.
#[derive(Debug)]
pub struct LotState {
    pub available: u32,
    pub occupied: HashSet<SlotId>,
}

pub type SharedLotState = Arc<RwLock<LotState>>;

// ── Group-commit log channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the log and batches appends for group commit:
/// block for the first append, drain whatever else is immediately queued,
/// then do a single fsync for the whole batch and answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }
                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let start = std::time::Instant::now();

    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    let result = match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    };

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The reservation engine: catalog, per-lot occupancy, the booking ledger,
/// the current user profile, and the admin flag. All durable state flows
/// through the event log; startup replays it.
pub struct Engine {
    pub catalog: Catalog,
    lots: DashMap<LotId, SharedLotState>,
    ledger: RwLock<Vec<Booking>>,
    profile: RwLock<Option<PayerProfile>>,
    admin: AtomicBool,
    /// Bumped on every ledger or occupancy mutation; the stats cache keys
    /// off it instead of recomputing per read.
    version: AtomicU64,
    stats_cache: RwLock<Option<(u64, DashboardStats)>>,
    wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotificationCenter>,
}

impl Engine {
    pub fn new(
        catalog: Catalog,
        wal_path: PathBuf,
        notify: Arc<NotificationCenter>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path).map_err(|e| match e {
            ReplayError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        })?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let lots = DashMap::new();
        for lot in catalog.lots() {
            lots.insert(
                lot.id,
                Arc::new(RwLock::new(LotState {
                    available: lot.seed_available,
                    occupied: HashSet::new(),
                })),
            );
        }

        let engine = Self {
            catalog,
            lots,
            ledger: RwLock::new(Vec::new()),
            profile: RwLock::new(None),
            admin: AtomicBool::new(false),
            version: AtomicU64::new(0),
            stats_cache: RwLock::new(None),
            wal_tx,
            notify,
        };

        // Replay — we're the sole owner of the state here, so try_write
        // always succeeds instantly. Never use blocking_write: this may run
        // inside an async context.
        for event in events {
            match event {
                Event::BookingRecorded(b) => {
                    engine
                        .ledger
                        .try_write()
                        .expect("replay: uncontended write")
                        .push(b);
                }
                Event::SlotOccupied { lot, slot, .. } => {
                    if let Some(entry) = engine.lots.get(&lot) {
                        let state = entry.value().clone();
                        let mut guard = state.try_write().expect("replay: uncontended write");
                        if guard.occupied.insert(slot) {
                            debug_assert!(guard.available > 0, "replayed occupancy underflow");
                            guard.available = guard.available.saturating_sub(1);
                        }
                    }
                }
                Event::ProfileSaved(p) => {
                    *engine.profile.try_write().expect("replay: uncontended write") = Some(p);
                }
                Event::AdminSession { active } => {
                    engine.admin.store(active, Ordering::Relaxed);
                }
                Event::Schema { .. } => {}
            }
        }

        Ok(engine)
    }

    /// Write an event through the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("log writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("log writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub fn lot_state(&self, id: LotId) -> Option<SharedLotState> {
        self.lots.get(&id).map(|e| e.value().clone())
    }

    pub async fn available(&self, lot: LotId) -> Result<u32, EngineError> {
        let state = self.lot_state(lot).ok_or(EngineError::UnknownLot(lot))?;
        let guard = state.read().await;
        Ok(guard.available)
    }

    // ── Ledger ───────────────────────────────────────────

    /// Append a booking to the ledger. Called by the booking flow after the
    /// payment resolved; occupancy is NOT touched here — the caller owns
    /// that mutation once the flow closes successfully.
    pub(super) async fn record_booking(&self, booking: Booking) -> Result<(), EngineError> {
        self.wal_append(&Event::BookingRecorded(booking.clone())).await?;
        self.ledger.write().await.push(booking);
        self.version.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
        Ok(())
    }

    pub async fn ledger_snapshot(&self) -> Vec<Booking> {
        self.ledger.read().await.clone()
    }

    pub async fn ledger_len(&self) -> usize {
        self.ledger.read().await.len()
    }

    pub async fn booking(&self, id: Ulid) -> Option<Booking> {
        self.ledger.read().await.iter().find(|b| b.id == id).cloned()
    }

    pub fn state_version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    // ── Occupancy ────────────────────────────────────────

    /// Mark a slot taken and decrement the lot counter, exactly once per
    /// confirmed booking. Owned by the caller of the booking flow, on a
    /// confirmed success only.
    pub async fn confirm_occupancy(&self, sel: &SlotSelection) -> Result<(), EngineError> {
        let state = self
            .lot_state(sel.lot)
            .ok_or(EngineError::UnknownLot(sel.lot))?;
        let mut guard = state.write().await;
        if guard.occupied.contains(&sel.slot) {
            return Err(EngineError::SlotOccupied(sel.slot.clone()));
        }
        if guard.available == 0 {
            return Err(EngineError::AvailabilityUnderflow(sel.lot));
        }
        self.wal_append(&Event::SlotOccupied {
            lot: sel.lot,
            floor: sel.floor.clone(),
            slot: sel.slot.clone(),
        })
        .await?;
        guard.occupied.insert(sel.slot.clone());
        guard.available -= 1;
        self.version.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ── Current user ─────────────────────────────────────

    /// Persist the payer info as the current user, overwriting any previous.
    pub async fn save_profile(&self, profile: PayerProfile) -> Result<(), EngineError> {
        self.wal_append(&Event::ProfileSaved(profile.clone())).await?;
        *self.profile.write().await = Some(profile);
        Ok(())
    }

    pub async fn current_profile(&self) -> Option<PayerProfile> {
        self.profile.read().await.clone()
    }

    // ── Admin gate ───────────────────────────────────────

    /// Demo-only credential check. On match, flips and persists the admin
    /// flag; on mismatch, a recoverable auth error.
    pub async fn admin_login(&self, username: &str, password: &str) -> Result<(), EngineError> {
        if username != ADMIN_USERNAME || password != ADMIN_PASSWORD {
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
            return Err(EngineError::BadAdminCredentials);
        }
        self.wal_append(&Event::AdminSession { active: true }).await?;
        self.admin.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub async fn admin_logout(&self) -> Result<(), EngineError> {
        self.wal_append(&Event::AdminSession { active: false }).await?;
        self.admin.store(false, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.admin.load(Ordering::Relaxed)
    }

    /// Gate for admin-only operations (dashboard, revenue reports).
    pub fn require_admin(&self) -> Result<(), EngineError> {
        if !self.is_admin() {
            return Err(EngineError::AdminRequired);
        }
        Ok(())
    }

    // ── Log maintenance ──────────────────────────────────

    /// Rewrite the log with only the events needed to recreate the current
    /// state: the ledger, per-lot occupancy, the latest profile, and the
    /// admin flag.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events: Vec<Event> = Vec::new();
        for b in self.ledger.read().await.iter() {
            events.push(Event::BookingRecorded(b.clone()));
        }
        for lot in self.catalog.lots() {
            if let Some(state) = self.lot_state(lot.id) {
                let guard = state.read().await;
                let mut slots: Vec<&SlotId> = guard.occupied.iter().collect();
                slots.sort();
                for slot in slots {
                    // Floor is recoverable from the layout; scan for it.
                    let floor = lot
                        .floors
                        .iter()
                        .find(|f| f.slot_classes.contains_key(slot))
                        .map(|f| f.id.clone())
                        .unwrap_or_default();
                    events.push(Event::SlotOccupied {
                        lot: lot.id,
                        floor,
                        slot: slot.clone(),
                    });
                }
            }
        }
        if let Some(p) = self.profile.read().await.clone() {
            events.push(Event::ProfileSaved(p));
        }
        if self.is_admin() {
            events.push(Event::AdminSession { active: true });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("log writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("log writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
