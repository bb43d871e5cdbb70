use crate::model::{DurationCode, VehicleClass};

/// Price for a booking at checkout. Pure function of the rate table.
pub fn price(vehicle: VehicleClass, duration: DurationCode) -> u32 {
    price_for_hours(vehicle, duration.hours())
}

/// Hourly billing under 24 hours; at or above, the daily flat rate applies
/// per 24-hour block, rounded up.
pub fn price_for_hours(vehicle: VehicleClass, hours: u32) -> u32 {
    if hours < 24 {
        hours * vehicle.hourly_rate()
    } else {
        hours.div_ceil(24) * vehicle.daily_rate()
    }
}
