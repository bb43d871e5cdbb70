use crate::model::{FloorId, LotId, SlotId, VehicleClass};

/// How an error should be handled at the interface: everything except
/// `Configuration` and `Internal` is recoverable by re-prompting the user.
/// There are no automatic retries anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    SlotConflict,
    Payment,
    Configuration,
    Auth,
    Internal,
}

#[derive(Debug)]
pub enum EngineError {
    /// A slot was clicked with no vehicle type chosen. Rejected, not
    /// silently ignored.
    NoVehicleTypeSelected,
    /// Slot exists but serves another vehicle class.
    VehicleTypeMismatch { slot: SlotId, required: VehicleClass },
    SlotOccupied(SlotId),
    /// Defensive double-check: the lot counter hit zero even though the
    /// grid showed a free cell.
    LotFull(LotId),
    MissingRequiredField(&'static str),
    FieldTooLong(&'static str),
    /// Simulated payment declined; no ledger or occupancy mutation happened.
    PaymentDeclined,
    UnknownLot(LotId),
    UnknownFloor { lot: LotId, floor: FloorId },
    UnknownSlot { floor: FloorId, slot: SlotId },
    BadAdminCredentials,
    /// An admin-only operation was attempted without a live session.
    AdminRequired,
    /// Closing the booking dialog is disallowed while payment is in flight.
    CloseWhileProcessing,
    /// The flow was driven out of order (e.g. submit after success).
    InvalidTransition(&'static str),
    /// Available counter would go below zero — an invariant breach, never
    /// clamped silently.
    AvailabilityUnderflow(LotId),
    Wal(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::MissingRequiredField(_) | EngineError::FieldTooLong(_) => {
                ErrorClass::Validation
            }
            EngineError::NoVehicleTypeSelected
            | EngineError::VehicleTypeMismatch { .. }
            | EngineError::SlotOccupied(_)
            | EngineError::LotFull(_) => ErrorClass::SlotConflict,
            EngineError::PaymentDeclined => ErrorClass::Payment,
            EngineError::UnknownLot(_)
            | EngineError::UnknownFloor { .. }
            | EngineError::UnknownSlot { .. } => ErrorClass::Configuration,
            EngineError::BadAdminCredentials | EngineError::AdminRequired => ErrorClass::Auth,
            EngineError::CloseWhileProcessing
            | EngineError::InvalidTransition(_)
            | EngineError::AvailabilityUnderflow(_)
            | EngineError::Wal(_) => ErrorClass::Internal,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoVehicleTypeSelected => {
                write!(f, "select a vehicle type before picking a slot")
            }
            EngineError::VehicleTypeMismatch { slot, required } => write!(
                f,
                "slot {slot} is reserved for {}; pick a {} slot or switch type",
                required.display_name(),
                required.display_name()
            ),
            EngineError::SlotOccupied(slot) => write!(f, "slot {slot} is already occupied"),
            EngineError::LotFull(lot) => write!(f, "lot {lot} has no available capacity"),
            EngineError::MissingRequiredField(field) => {
                write!(f, "required field missing: {field}")
            }
            EngineError::FieldTooLong(field) => write!(f, "field too long: {field}"),
            EngineError::PaymentDeclined => write!(f, "payment declined"),
            EngineError::UnknownLot(lot) => write!(f, "no such parking lot: {lot}"),
            EngineError::UnknownFloor { lot, floor } => {
                write!(f, "lot {lot} has no floor {floor}")
            }
            EngineError::UnknownSlot { floor, slot } => {
                write!(f, "floor {floor} has no slot {slot}")
            }
            EngineError::BadAdminCredentials => write!(f, "invalid admin credentials"),
            EngineError::AdminRequired => write!(f, "admin login required"),
            EngineError::CloseWhileProcessing => {
                write!(f, "cannot close while payment is processing")
            }
            EngineError::InvalidTransition(msg) => write!(f, "invalid flow transition: {msg}"),
            EngineError::AvailabilityUnderflow(lot) => {
                write!(f, "lot {lot}: available counter would underflow")
            }
            EngineError::Wal(e) => write!(f, "log error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
