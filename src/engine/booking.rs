use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Booking, DurationCode, Ms, PayerProfile, now_ms};
use crate::notify::NotifyKind;
use crate::pricing;

use super::{Engine, EngineError, SlotSelection};

/// External payment seam. One bounded wait, no retries, no configurable
/// timeout — exactly one resolution per charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, amount: u32) -> Result<(), EngineError>;
}

/// The stand-in gateway: waits a fixed delay, then succeeds — unless a test
/// armed the next charge to decline.
pub struct SimulatedGateway {
    delay: Duration,
    decline_next: AtomicBool,
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            decline_next: AtomicBool::new(false),
        }
    }

    /// Arm the next charge to fail. Test hook for the failure transition.
    pub fn decline_next(&self) {
        self.decline_next.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, _amount: u32) -> Result<(), EngineError> {
        tokio::time::sleep(self.delay).await;
        if self.decline_next.swap(false, Ordering::Relaxed) {
            return Err(EngineError::PaymentDeclined);
        }
        Ok(())
    }
}

/// Raw form input; whitespace-only counts as missing.
#[derive(Debug, Clone, Default)]
pub struct PayerForm {
    pub name: String,
    pub phone: String,
    pub vehicle_number: String,
    pub email: String,
}

impl PayerForm {
    fn validate(&self) -> Result<PayerProfile, EngineError> {
        fn required(value: &str, field: &'static str, max: usize) -> Result<String, EngineError> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(EngineError::MissingRequiredField(field));
            }
            if trimmed.len() > max {
                return Err(EngineError::FieldTooLong(field));
            }
            Ok(trimmed.to_string())
        }

        let name = required(&self.name, "name", MAX_NAME_LEN)?;
        let phone = required(&self.phone, "phone", MAX_PHONE_LEN)?;
        let vehicle_number =
            required(&self.vehicle_number, "vehicle number", MAX_VEHICLE_NUMBER_LEN)?;
        let email = match self.email.trim() {
            "" => None,
            e if e.len() > MAX_EMAIL_LEN => return Err(EngineError::FieldTooLong("email")),
            e => Some(e.to_string()),
        };

        Ok(PayerProfile {
            name,
            phone,
            vehicle_number,
            email,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Form,
    Processing,
    Success,
}

/// The checkout state machine: `Form → Processing → Success`, falling back
/// to `Form` when the payment declines.
///
/// One flow instance is active per session (single modal). The flow owns
/// only the ledger append and the profile write; marking the slot occupied
/// and decrementing the lot counter belong to the caller, after
/// [`BookingFlow::close`] confirms success.
pub struct BookingFlow {
    selection: SlotSelection,
    duration: DurationCode,
    state: FlowState,
    booking_id: Option<Ulid>,
}

impl BookingFlow {
    pub fn new(selection: SlotSelection, duration: DurationCode) -> Self {
        Self {
            selection,
            duration,
            state: FlowState::Form,
            booking_id: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn selection(&self) -> &SlotSelection {
        &self.selection
    }

    pub fn duration(&self) -> DurationCode {
        self.duration
    }

    /// Swap the duration while still on the form. Ignored afterwards.
    pub fn set_duration(&mut self, duration: DurationCode) {
        if self.state == FlowState::Form {
            self.duration = duration;
        }
    }

    pub fn price(&self) -> u32 {
        pricing::price(self.selection.vehicle, self.duration)
    }

    /// Id of the recorded booking, once the flow reached `Success`.
    pub fn booking_id(&self) -> Option<Ulid> {
        self.booking_id
    }

    /// Close controls stay disabled while payment is in flight.
    pub fn can_close(&self) -> bool {
        self.state != FlowState::Processing
    }

    /// Drive the form submission: validate, persist the payer profile,
    /// await the gateway, and on success append the booking and notify.
    /// A declined payment notifies and returns to `Form` with no ledger or
    /// occupancy mutation.
    pub async fn submit(
        &mut self,
        engine: &Engine,
        gateway: &dyn PaymentGateway,
        form: &PayerForm,
    ) -> Result<Ulid, EngineError> {
        if self.state != FlowState::Form {
            return Err(EngineError::InvalidTransition("submit outside Form"));
        }
        // Validation failure keeps the state at Form.
        let payer = form.validate()?;

        self.state = FlowState::Processing;
        engine.save_profile(payer.clone()).await?;

        let price = self.price();
        if let Err(e) = gateway.charge(price).await {
            metrics::counter!(crate::observability::PAYMENT_FAILURES_TOTAL).increment(1);
            engine.notify.push(
                NotifyKind::Error,
                "Payment Failed",
                "Please try again or use a different payment method.",
                None,
            );
            self.state = FlowState::Form;
            return Err(e);
        }

        let now = now_ms();
        let booking = Booking {
            id: Ulid::new(),
            lot: self.selection.lot,
            floor: self.selection.floor.clone(),
            slot: self.selection.slot.clone(),
            vehicle: self.selection.vehicle,
            duration: self.duration,
            price,
            payer,
            created_at: now,
            start: now,
            end: now + self.duration.span_ms(),
        };
        let id = booking.id;
        let slot = booking.slot.clone();
        let end = booking.end;

        if let Err(e) = engine.record_booking(booking).await {
            // Ledger append failed — treat like a declined payment: report
            // and fall back to the form without shared-state mutation.
            engine.notify.push(
                NotifyKind::Error,
                "Booking Failed",
                "Could not record your booking. Please try again.",
                None,
            );
            self.state = FlowState::Form;
            return Err(e);
        }

        engine.notify.push(
            NotifyKind::Success,
            "Booking Confirmed!",
            format!(
                "Slot {slot} booked successfully. Valid until {}.",
                format_clock(end)
            ),
            Some(id),
        );
        self.state = FlowState::Success;
        self.booking_id = Some(id);
        Ok(id)
    }

    /// Tear the flow down, reporting whether it confirmed. The caller
    /// performs the occupancy mutation on `true`. Closing is rejected while
    /// payment is processing.
    pub fn close(self) -> Result<bool, EngineError> {
        if self.state == FlowState::Processing {
            return Err(EngineError::CloseWhileProcessing);
        }
        Ok(self.state == FlowState::Success)
    }
}

fn format_clock(at: Ms) -> String {
    DateTime::from_timestamp_millis(at)
        .map(|d| d.format("%H:%M").to_string())
        .unwrap_or_else(|| "unknown".into())
}
