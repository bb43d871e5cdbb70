use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Lot identifiers come from the static catalog, not from user input.
pub type LotId = u32;

/// Floor key within a lot, e.g. `"G"`, `"P1"`, `"B3"`.
pub type FloorId = String;

/// Version of the persisted event-log schema. Bump on any incompatible
/// change to [`Event`]; replay rejects logs written with another version.
pub const SCHEMA_VERSION: u32 = 1;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Ms
}

/// The closed set of vehicle classes a slot can be tagged with.
/// Rates are flat configuration, in whole rupees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Bike,
    Suv,
    Ev,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Bike,
        VehicleClass::Suv,
        VehicleClass::Ev,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Bike => "bike",
            VehicleClass::Suv => "suv",
            VehicleClass::Ev => "ev",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VehicleClass::Car => "Car",
            VehicleClass::Bike => "Bike",
            VehicleClass::Suv => "SUV",
            VehicleClass::Ev => "EV Charging",
        }
    }

    pub fn hourly_rate(&self) -> u32 {
        match self {
            VehicleClass::Car => 20,
            VehicleClass::Bike => 10,
            VehicleClass::Suv => 30,
            VehicleClass::Ev => 25,
        }
    }

    pub fn daily_rate(&self) -> u32 {
        match self {
            VehicleClass::Car => 200,
            VehicleClass::Bike => 100,
            VehicleClass::Suv => 300,
            VehicleClass::Ev => 250,
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.code() == code)
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The enumerated booking lengths offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationCode {
    H1,
    H2,
    H4,
    H8,
    H24,
}

impl DurationCode {
    pub const ALL: [DurationCode; 5] = [
        DurationCode::H1,
        DurationCode::H2,
        DurationCode::H4,
        DurationCode::H8,
        DurationCode::H24,
    ];

    pub fn hours(&self) -> u32 {
        match self {
            DurationCode::H1 => 1,
            DurationCode::H2 => 2,
            DurationCode::H4 => 4,
            DurationCode::H8 => 8,
            DurationCode::H24 => 24,
        }
    }

    pub fn span_ms(&self) -> Ms {
        self.hours() as Ms * 3_600_000
    }

    pub fn label(&self) -> &'static str {
        match self {
            DurationCode::H1 => "1 Hour",
            DurationCode::H2 => "2 Hours",
            DurationCode::H4 => "4 Hours",
            DurationCode::H8 => "8 Hours",
            DurationCode::H24 => "24 Hours",
        }
    }

    /// Parse the wire/UI code, which is the hour count as a string.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "1" => Some(DurationCode::H1),
            "2" => Some(DurationCode::H2),
            "4" => Some(DurationCode::H4),
            "8" => Some(DurationCode::H8),
            "24" => Some(DurationCode::H24),
            _ => None,
        }
    }
}

impl fmt::Display for DurationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hours())
    }
}

/// Slot code, unique within its lot (e.g. `G1-C`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

/// Contact details collected by the booking form. The engine keeps the most
/// recently submitted profile as the "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerProfile {
    pub name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub email: Option<String>,
}

/// A confirmed reservation. Created atomically at payment completion,
/// never mutated or deleted afterwards (cancellation is out of scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub lot: LotId,
    pub floor: FloorId,
    pub slot: SlotId,
    pub vehicle: VehicleClass,
    pub duration: DurationCode,
    pub price: u32,
    pub payer: PayerProfile,
    pub created_at: Ms,
    pub start: Ms,
    pub end: Ms,
}

/// The event types — flat, no nesting. This is the durable log record format.
///
/// The log replaces the original per-browser keyed storage: the ledger, the
/// per-lot occupied-slot sets, the current user profile, and the admin flag
/// are all rebuilt by replay on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Always the first record of a log; replay refuses other versions.
    Schema { version: u32 },
    /// Ledger append.
    BookingRecorded(Booking),
    /// Occupancy insert plus one available-counter decrement for the lot.
    /// Slots are never released — occupancy only grows.
    SlotOccupied {
        lot: LotId,
        floor: FloorId,
        slot: SlotId,
    },
    /// Overwrites the current user profile.
    ProfileSaved(PayerProfile),
    /// Demo admin gate flag. Not a security boundary.
    AdminSession { active: bool },
}
