//! End-to-end booking scenarios against the seeded catalog, driven through
//! the public crate surface the way the console binary drives it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parkmate::catalog::Catalog;
use parkmate::engine::{
    BookingFlow, Engine, EngineError, ErrorClass, PayerForm, SimulatedGateway,
};
use parkmate::model::{DurationCode, SlotId, VehicleClass, now_ms};
use parkmate::notify::NotificationCenter;
use parkmate::qr::PassPayload;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("parkmate_test_e2e");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(path: PathBuf) -> Arc<Engine> {
    Arc::new(
        Engine::new(Catalog::seed(), path, Arc::new(NotificationCenter::new())).unwrap(),
    )
}

fn form() -> PayerForm {
    PayerForm {
        name: "Asha Rao".into(),
        phone: "98450-00000".into(),
        vehicle_number: "KA05MJ2022".into(),
        email: "asha@example.com".into(),
    }
}

#[tokio::test]
async fn book_slot_end_to_end() {
    let engine = new_engine(test_wal_path("e2e_happy.wal"));
    let gateway = SimulatedGateway::new(Duration::ZERO);

    let selection = engine
        .select_slot(1, "G", &SlotId::from("G1-C"), Some(VehicleClass::Car))
        .await
        .unwrap();
    let mut flow = BookingFlow::new(selection.clone(), DurationCode::H1);
    assert_eq!(flow.price(), 20);

    let id = flow.submit(&engine, &gateway, &form()).await.unwrap();
    assert!(flow.close().unwrap());
    engine.confirm_occupancy(&selection).await.unwrap();

    assert_eq!(engine.ledger_len().await, 1);
    assert_eq!(engine.available(1).await.unwrap(), 44);
    let state = engine.lot_state(1).unwrap();
    assert!(state.read().await.occupied.contains(&SlotId::from("G1-C")));

    // The pass payload carries the booking coordinates.
    let booking = engine.booking(id).await.unwrap();
    let pass: serde_json::Value =
        serde_json::from_str(&PassPayload::from_booking(&booking, now_ms()).to_json()).unwrap();
    assert_eq!(pass["bookingId"], id.to_string());
    assert_eq!(pass["slot"], "G1-C");
    assert_eq!(pass["floor"], "G");
    assert_eq!(pass["vehicleType"], "car");
}

#[tokio::test]
async fn rebooking_a_taken_slot_is_rejected() {
    let engine = new_engine(test_wal_path("e2e_conflict.wal"));
    let gateway = SimulatedGateway::new(Duration::ZERO);

    let selection = engine
        .select_slot(1, "G", &SlotId::from("G2-C"), Some(VehicleClass::Car))
        .await
        .unwrap();
    let mut flow = BookingFlow::new(selection.clone(), DurationCode::H2);
    flow.submit(&engine, &gateway, &form()).await.unwrap();
    assert!(flow.close().unwrap());
    engine.confirm_occupancy(&selection).await.unwrap();

    let err = engine
        .select_slot(1, "G", &SlotId::from("G2-C"), Some(VehicleClass::Car))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied(_)));
    assert_eq!(err.class(), ErrorClass::SlotConflict);
    assert_eq!(engine.ledger_len().await, 1);
}

#[tokio::test]
async fn declined_payment_mutates_nothing() {
    let engine = new_engine(test_wal_path("e2e_decline.wal"));
    let gateway = SimulatedGateway::new(Duration::ZERO);
    gateway.decline_next();

    let selection = engine
        .select_slot(3, "B1", &SlotId::from("B1-2B"), Some(VehicleClass::Bike))
        .await
        .unwrap();
    let mut flow = BookingFlow::new(selection, DurationCode::H8);
    let err = flow.submit(&engine, &gateway, &form()).await.unwrap_err();
    assert!(matches!(err, EngineError::PaymentDeclined));
    assert_eq!(err.class(), ErrorClass::Payment);

    assert!(!flow.close().unwrap());
    assert_eq!(engine.ledger_len().await, 0);
    assert_eq!(engine.available(3).await.unwrap(), 30);
    let state = engine.lot_state(3).unwrap();
    assert!(state.read().await.occupied.is_empty());
}

#[tokio::test]
async fn restart_replays_bookings_and_occupancy() {
    let path = test_wal_path("e2e_restart.wal");
    let booking_id = {
        let engine = new_engine(path.clone());
        let gateway = SimulatedGateway::new(Duration::ZERO);
        let selection = engine
            .select_slot(1, "2", &SlotId::from("2C-S"), Some(VehicleClass::Suv))
            .await
            .unwrap();
        let mut flow = BookingFlow::new(selection.clone(), DurationCode::H24);
        let id = flow.submit(&engine, &gateway, &form()).await.unwrap();
        assert!(flow.close().unwrap());
        engine.confirm_occupancy(&selection).await.unwrap();
        id
    };

    let engine = new_engine(path);
    let booking = engine.booking(booking_id).await.unwrap();
    assert_eq!(booking.vehicle, VehicleClass::Suv);
    assert_eq!(booking.price, 300);
    assert_eq!(engine.available(1).await.unwrap(), 44);

    // The restored slot is still unbookable.
    let err = engine
        .select_slot(1, "2", &SlotId::from("2C-S"), Some(VehicleClass::Suv))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied(_)));
}
