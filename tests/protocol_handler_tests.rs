use skylift::cabin::{CabinState, DoorState};
use skylift::command::CabinCommand;
use skylift::protocol::{
    CommandAction, CommandRequest, Envelope, ProtocolError, ProtocolHandler, Request,
    MAX_REQUEST_SIZE,
};
use skylift::warehouse::{Parcel, ParcelStatus, Warehouse, PARCEL_SNAPSHOT_LIMIT};

fn parse(handler: &mut ProtocolHandler, json: &str) -> Request {
    handler.parse_request(json).expect("request should parse")
}

#[test]
fn test_parse_command_with_payload() {
    let mut handler = ProtocolHandler::new();
    let request = parse(
        &mut handler,
        r#"{"type":"command","data":{"action":"set_target","payload":{"km":42.5}}}"#,
    );

    let Request::Command(command_request) = request else {
        panic!("expected a command request");
    };
    assert_eq!(command_request.action, CommandAction::SetTarget);
    assert_eq!(
        command_request.into_command(),
        CabinCommand::SetTarget { km: 42.5 }
    );
}

#[test]
fn test_parse_bare_commands() {
    let mut handler = ProtocolHandler::new();
    for (json, expected) in [
        (
            r#"{"type":"command","data":{"action":"start"}}"#,
            CabinCommand::Start,
        ),
        (
            r#"{"type":"command","data":{"action":"stop"}}"#,
            CabinCommand::Stop,
        ),
        (
            r#"{"type":"command","data":{"action":"emergency_stop"}}"#,
            CabinCommand::EmergencyStop,
        ),
        (
            r#"{"type":"command","data":{"action":"load_from_warehouse"}}"#,
            CabinCommand::LoadFromWarehouse,
        ),
    ] {
        let Request::Command(command_request) = parse(&mut handler, json) else {
            panic!("expected a command request for {}", json);
        };
        assert_eq!(command_request.into_command(), expected);
    }
}

#[test]
fn test_door_payload_defaults_to_closed() {
    // Missing state closes the doors.
    let request = CommandRequest {
        action: CommandAction::SetDoors,
        payload: None,
    };
    assert_eq!(
        request.into_command(),
        CabinCommand::SetDoors {
            state: DoorState::Closed
        }
    );

    // So does anything that is not an explicit OPEN.
    let mut handler = ProtocolHandler::new();
    let Request::Command(command_request) = parse(
        &mut handler,
        r#"{"type":"command","data":{"action":"set_doors","payload":{"state":"AJAR"}}}"#,
    ) else {
        panic!("expected a command request");
    };
    assert_eq!(
        command_request.into_command(),
        CabinCommand::SetDoors {
            state: DoorState::Closed
        }
    );

    let Request::Command(command_request) = parse(
        &mut handler,
        r#"{"type":"command","data":{"action":"set_doors","payload":{"state":"OPEN"}}}"#,
    ) else {
        panic!("expected a command request");
    };
    assert_eq!(
        command_request.into_command(),
        CabinCommand::SetDoors {
            state: DoorState::Open
        }
    );
}

#[test]
fn test_missing_numeric_payloads_use_defaults() {
    let target = CommandRequest {
        action: CommandAction::SetTarget,
        payload: None,
    };
    assert_eq!(target.into_command(), CabinCommand::SetTarget { km: 0.0 });

    let speed = CommandRequest {
        action: CommandAction::SetSpeed,
        payload: None,
    };
    assert_eq!(speed.into_command(), CabinCommand::SetSpeed { ms: None });
}

#[test]
fn test_parse_status_and_parcels_requests() {
    let mut handler = ProtocolHandler::new();
    assert!(matches!(
        parse(&mut handler, r#"{"type":"status"}"#),
        Request::Status
    ));
    assert!(matches!(
        parse(&mut handler, r#"{"type":"parcels"}"#),
        Request::Parcels
    ));
}

#[test]
fn test_parse_add_parcel_defaults_status_to_queued() {
    let mut handler = ProtocolHandler::new();
    let request = parse(
        &mut handler,
        r#"{"type":"add_parcel","data":{"id":"crate-7","weight_kg":12.5,"destination_km":80.0}}"#,
    );

    let Request::AddParcel(parcel) = request else {
        panic!("expected an add_parcel request");
    };
    assert_eq!(parcel.id, "crate-7");
    assert_eq!(parcel.weight_kg, 12.5);
    assert_eq!(parcel.status, ParcelStatus::Queued);
}

#[test]
fn test_parse_rejects_invalid_json() {
    let mut handler = ProtocolHandler::new();
    assert_eq!(
        handler.parse_request("not json at all"),
        Err(ProtocolError::InvalidJson)
    );
    assert_eq!(
        handler.parse_request(r#"{"type":"warp_drive"}"#),
        Err(ProtocolError::InvalidJson)
    );
}

#[test]
fn test_parse_rejects_oversized_request() {
    let mut handler = ProtocolHandler::new();
    let oversized = format!(
        r#"{{"type":"command","data":{{"action":"start","payload":{{"state":"{}"}}}}}}"#,
        "X".repeat(MAX_REQUEST_SIZE)
    );
    assert_eq!(
        handler.parse_request(&oversized),
        Err(ProtocolError::MessageTooLarge)
    );
}

#[test]
fn test_telemetry_envelope_shape() {
    let mut handler = ProtocolHandler::new();
    let snapshot = CabinState::default();
    let json = handler
        .serialize_envelope(&Envelope::Telemetry(snapshot))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["type"], "telemetry");
    let data = &value["data"];
    assert_eq!(data["position_km"], 0.0);
    assert_eq!(data["speed_ms"], 0.0);
    assert_eq!(data["payload_kg"], 0.0);
    assert_eq!(data["doors"], "CLOSED");
    assert_eq!(data["running"], false);
    assert_eq!(data["target_km"], 0.0);
    assert_eq!(data["cabin"], "IDLE");
}

#[test]
fn test_parcels_envelope_shape() {
    let mut handler = ProtocolHandler::new();
    let parcels = vec![Parcel {
        id: "crate-1".to_string(),
        weight_kg: 5.0,
        destination_km: 10.0,
        status: ParcelStatus::Loaded,
    }];
    let json = handler
        .serialize_envelope(&Envelope::Parcels(parcels))
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["type"], "parcels");
    assert_eq!(value["data"][0]["id"], "crate-1");
    assert_eq!(value["data"][0]["status"], "LOADED");
}

#[test]
fn test_full_parcel_snapshot_fits_envelope() {
    let mut handler = ProtocolHandler::new();
    let mut warehouse = Warehouse::new();
    for i in 0..(PARCEL_SNAPSHOT_LIMIT + 10) {
        warehouse
            .insert_new(Parcel {
                id: format!("orbital-resupply-container-{:04}", i),
                weight_kg: 1234.5,
                destination_km: 99.25,
                status: ParcelStatus::Queued,
            })
            .unwrap();
    }

    let json = handler
        .serialize_envelope(&Envelope::Parcels(warehouse.snapshot()))
        .expect("a snapshot at the documented cap must serialize");

    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["type"], "parcels");
    assert_eq!(
        value["data"].as_array().unwrap().len(),
        PARCEL_SNAPSHOT_LIMIT
    );
}

#[test]
fn test_ack_serialization() {
    let mut handler = ProtocolHandler::new();
    assert_eq!(handler.serialize_ack().unwrap(), r#"{"ok":true}"#);
}
