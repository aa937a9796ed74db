use serde::{Deserialize, Serialize};

/// Top of the tether, km above the anchor station.
pub const MAX_POSITION_KM: f64 = 100.0;
/// Hard limit on the commanded cruising speed, m/s.
pub const MAX_SETPOINT_MS: f64 = 200.0;
/// Cruising speed commanded at power-on, m/s.
pub const DEFAULT_SETPOINT_MS: f64 = 20.0;

/// Doors may only be commanded while the cabin is effectively stationary.
pub const DOOR_SPEED_THRESHOLD_MS: f64 = 0.1;
/// Residual target error below which the cabin never enters MOVING.
pub const MOVE_EPSILON_KM: f64 = 0.01;
/// Residual target error treated as arrival mid-flight.
pub const ARRIVAL_EPSILON_KM: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DoorState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CabinMode {
    Idle,
    Moving,
    Error,
}

/// The shared state record: the single source of truth for the cabin.
///
/// Every field is mutated exclusively under the simulator guard; the
/// serialized form of this struct is the telemetry snapshot observers
/// receive each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CabinState {
    pub position_km: f64,
    pub speed_ms: f64,
    pub payload_kg: f64,
    pub doors: DoorState,
    pub running: bool,
    pub target_km: f64,
    pub cabin: CabinMode,
}

impl Default for CabinState {
    fn default() -> Self {
        Self {
            position_km: 0.0,
            speed_ms: 0.0,
            payload_kg: 0.0,
            doors: DoorState::Closed,
            running: false,
            target_km: 0.0,
            cabin: CabinMode::Idle,
        }
    }
}

impl CabinState {
    pub fn is_stationary(&self) -> bool {
        self.speed_ms.abs() < DOOR_SPEED_THRESHOLD_MS
    }

    /// Checks the reachable-state invariants; used by debug assertions in
    /// the tick path and by tests.
    pub fn invariants_hold(&self, setpoint_ms: f64) -> bool {
        (0.0..=MAX_POSITION_KM).contains(&self.position_km)
            && (0.0..=MAX_POSITION_KM).contains(&self.target_km)
            && self.speed_ms.abs() <= setpoint_ms
    }
}

/// Clamp a commanded destination onto the tether.
pub fn clamp_target_km(km: f64) -> f64 {
    km.clamp(0.0, MAX_POSITION_KM)
}

/// Clamp a commanded cruising speed into the allowed band.
pub fn clamp_setpoint_ms(ms: f64) -> f64 {
    ms.clamp(0.0, MAX_SETPOINT_MS)
}
