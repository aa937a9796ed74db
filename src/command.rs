use crate::cabin::{clamp_setpoint_ms, clamp_target_km, CabinState, DoorState};

/// A typed operator command, decoded from the wire by the protocol layer.
///
/// Optional payload fields carry the documented defaults forward: a missing
/// `ms` means "keep the current setpoint", a missing door target means
/// CLOSED (applied during wire decoding, see `protocol`).
#[derive(Debug, Clone, PartialEq)]
pub enum CabinCommand {
    Start,
    Stop,
    EmergencyStop,
    SetDoors { state: DoorState },
    SetTarget { km: f64 },
    SetSpeed { ms: Option<f64> },
    LoadFromWarehouse,
}

/// The state delta a command resolves to once accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// running := true, cabin := MOVING.
    BeginRun,
    /// running := false, cabin := IDLE.
    EndRun,
    /// running := false, cabin := ERROR, deferred recovery scheduled.
    Emergency,
    /// doors := state.
    MoveDoors(DoorState),
    /// target_km := the clamped destination.
    Retarget(f64),
    /// setpoint_ms := the clamped cruising speed.
    Retune(f64),
    /// Take the first QUEUED parcel; payload_kg += its weight.
    LoadParcel,
}

/// Why a command was not applied. Rejections are silent toward the operator
/// (the transport still answers ok); they only surface in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `start` while the doors are open.
    DoorsOpen,
    /// `set_doors` while the cabin is in motion.
    CabinInMotion,
    /// `load_from_warehouse` with an empty queue; detected at apply time,
    /// never by the planner.
    NothingQueued,
}

/// Pure command validation: maps a command plus the current state onto an
/// explicit accept/reject decision, with no side effects. The simulator
/// executes the returned effect under its guard.
pub fn plan(
    command: &CabinCommand,
    state: &CabinState,
    setpoint_ms: f64,
) -> Result<Effect, Rejection> {
    match command {
        CabinCommand::Start => {
            if state.doors == DoorState::Open {
                Err(Rejection::DoorsOpen)
            } else {
                Ok(Effect::BeginRun)
            }
        }
        CabinCommand::Stop => Ok(Effect::EndRun),
        CabinCommand::EmergencyStop => Ok(Effect::Emergency),
        CabinCommand::SetDoors { state: requested } => {
            if state.is_stationary() {
                Ok(Effect::MoveDoors(*requested))
            } else {
                Err(Rejection::CabinInMotion)
            }
        }
        CabinCommand::SetTarget { km } => Ok(Effect::Retarget(clamp_target_km(*km))),
        CabinCommand::SetSpeed { ms } => {
            // Missing payload keeps the current setpoint.
            Ok(Effect::Retune(clamp_setpoint_ms(ms.unwrap_or(setpoint_ms))))
        }
        CabinCommand::LoadFromWarehouse => Ok(Effect::LoadParcel),
    }
}
