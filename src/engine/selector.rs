use std::collections::HashSet;

use crate::catalog::Floor;
use crate::model::{FloorId, LotId, SlotId, VehicleClass};

use super::{Engine, EngineError};

/// Resolved state of one grid cell, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotView {
    /// No slot here (driving lane).
    Empty,
    /// Slot exists but a filter is active and its class differs.
    HiddenByFilter,
    Available { vehicle: VehicleClass },
    Occupied,
    /// Transient success highlight; the caller clears it after its display
    /// timeout.
    RecentlyBooked,
}

/// A validated slot pick, carrying everything the booking flow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSelection {
    pub lot: LotId,
    pub floor: FloorId,
    pub slot: SlotId,
    pub vehicle: VehicleClass,
}

/// Resolve every cell of a floor grid against the occupancy set and an
/// optional vehicle-class filter.
///
/// Filter hiding takes precedence over occupancy, matching the original
/// behavior: a mismatched slot disappears from a filtered view even when
/// taken. With no filter active, every slot renders in its class-specific
/// available state (or occupied).
pub fn compute_visible_slots(
    floor: &Floor,
    occupied: &HashSet<SlotId>,
    filter: Option<VehicleClass>,
    recently_booked: Option<&SlotId>,
) -> Vec<Vec<SlotView>> {
    floor
        .grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    let Some(slot) = cell else {
                        return SlotView::Empty;
                    };
                    let Some(class) = floor.class_of(slot) else {
                        // Layout invariant guarantees a class per cell;
                        // a validated Floor cannot reach this.
                        debug_assert!(false, "slot {slot} missing from class map");
                        return SlotView::Empty;
                    };
                    if let Some(wanted) = filter
                        && class != wanted
                    {
                        return SlotView::HiddenByFilter;
                    }
                    if recently_booked.is_some_and(|r| r == slot) {
                        return SlotView::RecentlyBooked;
                    }
                    if occupied.contains(slot) {
                        return SlotView::Occupied;
                    }
                    SlotView::Available { vehicle: class }
                })
                .collect()
        })
        .collect()
}

impl Engine {
    /// Grid of [`SlotView`] cells for one floor of one lot.
    pub async fn visible_slots(
        &self,
        lot: LotId,
        floor_id: &str,
        filter: Option<VehicleClass>,
        recently_booked: Option<&SlotId>,
    ) -> Result<Vec<Vec<SlotView>>, EngineError> {
        self.catalog.lot(lot).ok_or(EngineError::UnknownLot(lot))?;
        let floor = self
            .catalog
            .floor(lot, floor_id)
            .ok_or_else(|| EngineError::UnknownFloor {
                lot,
                floor: floor_id.to_string(),
            })?;
        let state = self.lot_state(lot).ok_or(EngineError::UnknownLot(lot))?;
        let guard = state.read().await;
        Ok(compute_visible_slots(floor, &guard.occupied, filter, recently_booked))
    }

    /// Validate a slot click and bind it for the booking flow.
    ///
    /// Check order matches the original click handler: filter chosen →
    /// occupancy → class match; plus a defensive lot-counter double-check
    /// so a stale grid can never book past zero availability.
    pub async fn select_slot(
        &self,
        lot: LotId,
        floor_id: &str,
        slot: &SlotId,
        filter: Option<VehicleClass>,
    ) -> Result<SlotSelection, EngineError> {
        let floor = self
            .catalog
            .floor(lot, floor_id)
            .ok_or_else(|| EngineError::UnknownFloor {
                lot,
                floor: floor_id.to_string(),
            })?;
        let class = floor.class_of(slot).ok_or_else(|| EngineError::UnknownSlot {
            floor: floor_id.to_string(),
            slot: slot.clone(),
        })?;

        let wanted = filter.ok_or(EngineError::NoVehicleTypeSelected)?;

        let state = self.lot_state(lot).ok_or(EngineError::UnknownLot(lot))?;
        let guard = state.read().await;
        if guard.occupied.contains(slot) {
            return Err(EngineError::SlotOccupied(slot.clone()));
        }
        if class != wanted {
            return Err(EngineError::VehicleTypeMismatch {
                slot: slot.clone(),
                required: class,
            });
        }
        if guard.available == 0 {
            return Err(EngineError::LotFull(lot));
        }

        Ok(SlotSelection {
            lot,
            floor: floor_id.to_string(),
            slot: slot.clone(),
            vehicle: class,
        })
    }
}
