use crate::cabin::{
    CabinMode, CabinState, DoorState, ARRIVAL_EPSILON_KM, DEFAULT_SETPOINT_MS, MOVE_EPSILON_KM,
};
use crate::command::{plan, CabinCommand, Effect, Rejection};
use crate::warehouse::ParcelSource;
use tracing::debug;

/// Fixed simulation tick period, seconds.
pub const TICK_PERIOD_S: f64 = 0.2;

/// Proof that one emergency stop was applied. The recovery task presents it
/// back to [`Simulator::clear_error`]; a stale generation means some later
/// command already changed the cabin mode and the recovery must not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTicket {
    generation: u64,
}

/// What one `apply` call did. The operator-facing contract is unconditional
/// success; rejections only surface here for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyOutcome {
    pub accepted: bool,
    pub rejection: Option<Rejection>,
    /// Present exactly when an emergency stop was applied; the caller must
    /// schedule the deferred recovery for it.
    pub recovery: Option<RecoveryTicket>,
}

impl ApplyOutcome {
    fn accepted() -> Self {
        Self {
            accepted: true,
            rejection: None,
            recovery: None,
        }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self {
            accepted: false,
            rejection: Some(rejection),
            recovery: None,
        }
    }
}

/// The cabin simulator: owns the shared state record and the setpoint.
///
/// A `Simulator` is not internally synchronized; the process wraps it in a
/// single mutex (the guard) acquired by exactly two paths, command
/// application and the tick loop. Snapshots taken under the guard are
/// broadcast after it is released.
#[derive(Debug)]
pub struct Simulator {
    state: CabinState,
    setpoint_ms: f64,
    /// Bumped on every command-driven cabin-mode change; keys the deferred
    /// recovery re-check.
    generation: u64,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            state: CabinState::default(),
            setpoint_ms: DEFAULT_SETPOINT_MS,
            generation: 0,
        }
    }

    pub fn snapshot(&self) -> CabinState {
        self.state.clone()
    }

    pub fn setpoint_ms(&self) -> f64 {
        self.setpoint_ms
    }

    /// Applies one operator command atomically. Never fails toward the
    /// caller: rejected commands leave the state untouched, out-of-range
    /// inputs arrive pre-clamped from the planner. Only
    /// [`CabinCommand::LoadFromWarehouse`] consults `parcels`; other
    /// commands may pass `None` and skip the warehouse guard entirely.
    pub fn apply(
        &mut self,
        command: &CabinCommand,
        parcels: Option<&mut dyn ParcelSource>,
    ) -> ApplyOutcome {
        let effect = match plan(command, &self.state, self.setpoint_ms) {
            Ok(effect) => effect,
            Err(rejection) => {
                debug!(?command, ?rejection, "command rejected");
                return ApplyOutcome::rejected(rejection);
            }
        };

        match effect {
            Effect::BeginRun => {
                self.state.running = true;
                self.set_mode(CabinMode::Moving);
            }
            Effect::EndRun => {
                self.state.running = false;
                self.set_mode(CabinMode::Idle);
            }
            Effect::Emergency => {
                self.state.running = false;
                self.set_mode(CabinMode::Error);
                debug!(generation = self.generation, "emergency stop applied");
                return ApplyOutcome {
                    recovery: Some(RecoveryTicket {
                        generation: self.generation,
                    }),
                    ..ApplyOutcome::accepted()
                };
            }
            Effect::MoveDoors(state) => {
                self.state.doors = state;
            }
            Effect::Retarget(km) => {
                self.state.target_km = km;
            }
            Effect::Retune(ms) => {
                self.setpoint_ms = ms;
            }
            Effect::LoadParcel => match parcels.and_then(|p| p.take_first_queued()) {
                Some(weight_kg) => {
                    self.state.payload_kg += weight_kg;
                    debug!(weight_kg, payload_kg = self.state.payload_kg, "parcel loaded");
                }
                None => {
                    debug!("load requested with no queued parcel");
                    return ApplyOutcome::rejected(Rejection::NothingQueued);
                }
            },
        }

        ApplyOutcome::accepted()
    }

    /// Advances the simulation one tick and returns the resulting snapshot.
    ///
    /// Must run under the same guard as `apply`; the caller broadcasts the
    /// returned snapshot after releasing it.
    pub fn tick(&mut self) -> CabinState {
        let state = &mut self.state;
        let residual = state.target_km - state.position_km;
        let moving =
            state.running && state.doors != DoorState::Open && residual.abs() > MOVE_EPSILON_KM;

        if moving {
            state.cabin = CabinMode::Moving;
            let direction = if residual > 0.0 { 1.0 } else { -1.0 };
            let delta_km = (self.setpoint_ms / 1000.0) * TICK_PERIOD_S;
            state.position_km += direction * delta_km;
            state.speed_ms = direction * self.setpoint_ms;

            let remaining = state.target_km - state.position_km;
            let arrived = remaining * direction <= 0.0 || remaining.abs() < ARRIVAL_EPSILON_KM;
            if arrived {
                state.position_km = state.target_km;
                state.running = false;
                state.speed_ms = 0.0;
                state.cabin = CabinMode::Idle;
                debug!(position_km = state.position_km, "arrived at target");
            }
        } else {
            state.speed_ms = 0.0;
            // ERROR is cleared only by the deferred recovery, never by the
            // idle branch.
            if !state.running && state.cabin != CabinMode::Error {
                state.cabin = CabinMode::Idle;
            }
        }

        debug_assert!(
            self.state.invariants_hold(self.setpoint_ms),
            "cabin state out of bounds after tick: {:?}",
            self.state
        );

        self.state.clone()
    }

    /// The deferred recovery check: reverts ERROR to IDLE only if the cabin
    /// is still in ERROR and no command-driven mode change happened since
    /// the ticket was issued. Returns whether the recovery fired.
    pub fn clear_error(&mut self, ticket: RecoveryTicket) -> bool {
        if self.state.cabin == CabinMode::Error && self.generation == ticket.generation {
            self.set_mode(CabinMode::Idle);
            debug!(generation = self.generation, "error recovered");
            true
        } else {
            debug!(
                ticket = ticket.generation,
                generation = self.generation,
                "stale recovery suppressed"
            );
            false
        }
    }

    fn set_mode(&mut self, mode: CabinMode) {
        self.state.cabin = mode;
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
