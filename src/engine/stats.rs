use chrono::{DateTime, Duration, Months, NaiveTime, Timelike, Utc};

use crate::model::{Booking, Ms, VehicleClass};

use super::Engine;

/// Admin time-range filter for revenue reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevenueRange {
    Today,
    Week,
    Month,
    Year,
}

impl RevenueRange {
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "today" => Some(RevenueRange::Today),
            "week" => Some(RevenueRange::Week),
            "month" => Some(RevenueRange::Month),
            "year" => Some(RevenueRange::Year),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RevenueRange::Today => "today",
            RevenueRange::Week => "week",
            RevenueRange::Month => "month",
            RevenueRange::Year => "year",
        }
    }
}

/// Derived admin statistics over the full ledger and catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_revenue: u64,
    pub total_bookings: usize,
    /// Bookings whose end time is still in the future.
    pub active_bookings: usize,
    /// Occupied share of total capacity, in percent; 0 for an empty catalog.
    pub occupancy_rate: f64,
    pub popular_vehicle: VehicleClass,
    /// Top 3 hours-of-day by booking count, formatted `"H:00"`.
    pub peak_hours: Vec<String>,
}

impl Engine {
    /// Compute (or serve from cache) the admin dashboard. The cache is
    /// keyed on the engine's state version, which every ledger or
    /// occupancy mutation bumps.
    pub async fn dashboard_stats(&self, now: Ms) -> DashboardStats {
        let version = self.state_version();
        if let Some((cached_version, cached)) = self.stats_cache.read().await.clone()
            && cached_version == version
        {
            return cached;
        }

        let ledger = self.ledger_snapshot().await;

        let mut capacity: u64 = 0;
        let mut occupied_units: u64 = 0;
        for lot in self.catalog.lots() {
            capacity += lot.total as u64;
            if let Some(state) = self.lot_state(lot.id) {
                let guard = state.read().await;
                occupied_units += (lot.total - guard.available) as u64;
            }
        }
        let occupancy_rate = if capacity == 0 {
            0.0
        } else {
            occupied_units as f64 / capacity as f64 * 100.0
        };

        let stats = DashboardStats {
            total_revenue: ledger.iter().map(|b| b.price as u64).sum(),
            total_bookings: ledger.len(),
            active_bookings: ledger.iter().filter(|b| b.end > now).count(),
            occupancy_rate,
            popular_vehicle: popular_vehicle(&ledger),
            peak_hours: peak_hours(&ledger),
        };

        *self.stats_cache.write().await = Some((version, stats.clone()));
        stats
    }

    /// Sum of booking prices created at or after the range boundary.
    pub async fn revenue_in_range(&self, range: RevenueRange, now: Ms) -> u64 {
        let boundary = range_start(range, now);
        self.ledger_snapshot()
            .await
            .iter()
            .filter(|b| b.created_at >= boundary)
            .map(|b| b.price as u64)
            .sum()
    }

    /// Booking counts per vehicle class, in first-appearance order.
    pub async fn bookings_by_vehicle(&self) -> Vec<(VehicleClass, usize)> {
        count_by_vehicle(&self.ledger_snapshot().await)
    }

    /// Booking count per hour of day (24 buckets, by creation time).
    pub async fn hourly_occupancy(&self) -> [usize; 24] {
        let mut buckets = [0usize; 24];
        for b in self.ledger_snapshot().await.iter() {
            if let Some(h) = hour_of_day(b.created_at) {
                buckets[h as usize] += 1;
            }
        }
        buckets
    }
}

fn hour_of_day(at: Ms) -> Option<u32> {
    DateTime::from_timestamp_millis(at).map(|d| d.hour())
}

fn count_by_vehicle(ledger: &[Booking]) -> Vec<(VehicleClass, usize)> {
    let mut counts: Vec<(VehicleClass, usize)> = Vec::new();
    for b in ledger {
        match counts.iter_mut().find(|(v, _)| *v == b.vehicle) {
            Some((_, n)) => *n += 1,
            None => counts.push((b.vehicle, 1)),
        }
    }
    counts
}

/// Most-booked vehicle class; ties keep the class that appeared first,
/// and an empty ledger defaults to `car`.
fn popular_vehicle(ledger: &[Booking]) -> VehicleClass {
    // Keep the first entry among equal counts; a later class must be
    // strictly more booked to displace it.
    count_by_vehicle(ledger)
        .into_iter()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .map(|(v, _)| v)
        .unwrap_or(VehicleClass::Car)
}

/// Top 3 distinct hours-of-day by booking count, descending, ties broken
/// by first appearance. Empty ledger yields an empty list.
fn peak_hours(ledger: &[Booking]) -> Vec<String> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for b in ledger {
        let Some(hour) = hour_of_day(b.created_at) else {
            continue;
        };
        match counts.iter_mut().find(|(h, _)| *h == hour) {
            Some((_, n)) => *n += 1,
            None => counts.push((hour, 1)),
        }
    }
    // Stable sort keeps first-appearance order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(3)
        .map(|(h, _)| format!("{h}:00"))
        .collect()
}

/// Inclusive lower bound for a revenue range, relative to `now` (UTC).
fn range_start(range: RevenueRange, now: Ms) -> Ms {
    let now_dt = DateTime::from_timestamp_millis(now).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let start = match range {
        RevenueRange::Today => now_dt.date_naive().and_time(NaiveTime::MIN).and_utc(),
        RevenueRange::Week => now_dt - Duration::days(7),
        RevenueRange::Month => now_dt.checked_sub_months(Months::new(1)).unwrap_or(now_dt),
        RevenueRange::Year => now_dt.checked_sub_months(Months::new(12)).unwrap_or(now_dt),
    };
    start.timestamp_millis()
}
