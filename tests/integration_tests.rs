use skylift::cabin::{CabinMode, DoorState};
use skylift::command::CabinCommand;
use skylift::hub::BroadcastHub;
use skylift::protocol::{Envelope, ProtocolHandler};
use skylift::recovery::spawn_recovery;
use skylift::sim::Simulator;
use skylift::warehouse::{Parcel, ParcelStatus, Warehouse};
use std::sync::Arc;
use tokio::sync::Mutex;

#[test]
fn test_full_lift_mission() {
    let mut sim = Simulator::new();
    let mut warehouse = Warehouse::new();

    // Queue freight and load it through the doors at the anchor.
    warehouse
        .insert_new(Parcel {
            id: "supplies-1".to_string(),
            weight_kg: 350.0,
            destination_km: 80.0,
            status: ParcelStatus::Queued,
        })
        .unwrap();
    sim.apply(
        &CabinCommand::SetDoors {
            state: DoorState::Open,
        },
        Some(&mut warehouse),
    );
    sim.apply(&CabinCommand::LoadFromWarehouse, Some(&mut warehouse));
    assert_eq!(sim.snapshot().payload_kg, 350.0);

    // Doors must close before the climb starts.
    let rejected = sim.apply(&CabinCommand::Start, Some(&mut warehouse));
    assert!(!rejected.accepted);
    sim.apply(
        &CabinCommand::SetDoors {
            state: DoorState::Closed,
        },
        Some(&mut warehouse),
    );

    sim.apply(&CabinCommand::SetSpeed { ms: Some(200.0) }, Some(&mut warehouse));
    sim.apply(&CabinCommand::SetTarget { km: 1.5 }, Some(&mut warehouse));
    sim.apply(&CabinCommand::Start, Some(&mut warehouse));

    let mut ticks = 0;
    while sim.snapshot().running {
        sim.tick();
        ticks += 1;
        assert!(ticks < 100, "climb did not converge");
    }

    let state = sim.snapshot();
    assert_eq!(state.position_km, 1.5);
    assert_eq!(state.cabin, CabinMode::Idle);

    // Stationary at altitude: doors may open for unloading.
    let doors = sim.apply(
        &CabinCommand::SetDoors {
            state: DoorState::Open,
        },
        Some(&mut warehouse),
    );
    assert!(doors.accepted);
}

#[tokio::test]
async fn test_tick_snapshots_fan_out_to_observers() {
    let mut sim = Simulator::new();
    let mut warehouse = Warehouse::new();
    let hub = BroadcastHub::new();
    let mut handler = ProtocolHandler::new();

    let mut first = hub.register().await;
    let mut second = hub.register().await;

    sim.apply(&CabinCommand::SetSpeed { ms: Some(200.0) }, Some(&mut warehouse));
    sim.apply(&CabinCommand::SetTarget { km: 10.0 }, Some(&mut warehouse));
    sim.apply(&CabinCommand::Start, Some(&mut warehouse));

    // One tick, one broadcast, delivered to both observers.
    let snapshot = sim.tick();
    let line = handler
        .serialize_envelope(&Envelope::Telemetry(snapshot))
        .unwrap()
        .to_owned();
    let delivered = hub.broadcast(&line).await;
    assert_eq!(delivered, 2);

    for observer in [&mut first, &mut second] {
        let received = observer.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&received).unwrap();
        assert_eq!(value["type"], "telemetry");
        assert_eq!(value["data"]["cabin"], "MOVING");
        assert_eq!(value["data"]["speed_ms"], 200.0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_emergency_stop_recovers_while_ticks_continue() {
    let sim = Arc::new(Mutex::new(Simulator::new()));
    let mut warehouse = Warehouse::new();

    {
        let mut guard = sim.lock().await;
        guard.apply(&CabinCommand::SetTarget { km: 10.0 }, Some(&mut warehouse));
        guard.apply(&CabinCommand::Start, Some(&mut warehouse));
        guard.tick();
    }

    let ticket = {
        let mut guard = sim.lock().await;
        guard
            .apply(&CabinCommand::EmergencyStop, Some(&mut warehouse))
            .recovery
            .unwrap()
    };
    let handle = spawn_recovery(Arc::clone(&sim), ticket);

    // The tick loop keeps running during the recovery window without
    // clearing the ERROR itself.
    for _ in 0..5 {
        let state = sim.lock().await.tick();
        assert_eq!(state.cabin, CabinMode::Error);
        assert_eq!(state.speed_ms, 0.0);
    }

    assert!(handle.await.unwrap());
    let state = sim.lock().await.snapshot();
    assert_eq!(state.cabin, CabinMode::Idle);
    assert!(!state.running);
}
