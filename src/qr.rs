//! Digital parking pass payload. The engine side stops at the canonical
//! JSON string; rendering it as an actual QR image is a frontend concern.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::model::{Booking, Ms};

/// The data encoded into a parking pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassPayload {
    pub booking_id: String,
    pub slot: String,
    pub floor: String,
    pub vehicle_type: String,
    pub start_time: String,
    pub end_time: String,
    /// When the pass itself was generated, not when the booking was made.
    pub timestamp: String,
}

impl PassPayload {
    pub fn from_booking(booking: &Booking, now: Ms) -> Self {
        Self {
            booking_id: booking.id.to_string(),
            slot: booking.slot.to_string(),
            floor: booking.floor.clone(),
            vehicle_type: booking.vehicle.code().to_string(),
            start_time: rfc3339(booking.start),
            end_time: rfc3339(booking.end),
            timestamp: rfc3339(now),
        }
    }

    pub fn to_json(&self) -> String {
        // Serialization of a string-only struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn rfc3339(at: Ms) -> String {
    DateTime::from_timestamp_millis(at)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}
