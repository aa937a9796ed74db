//! # Space Elevator Cabin Simulator
//!
//! A real-time simulation of a single elevator cabin on a fixed vertical
//! tether, with operator command processing, a fixed-tick state machine,
//! and best-effort telemetry fan-out to any number of observers.
//!
//! ## Features
//!
//! - **Fixed-tick simulation**: constant-velocity motion integration with
//!   arrival snapping, re-evaluated every 200 ms
//! - **Command processing**: pure accept/reject validation applied
//!   atomically under a single guard
//! - **Emergency recovery**: one-shot deferred ERROR-to-IDLE recovery,
//!   keyed by a state generation counter
//! - **Telemetry broadcast**: per-tick snapshot fan-out that prunes dead
//!   or stalled observers instead of blocking on them
//! - **Warehouse catalog**: bounded ordered parcel list feeding cabin
//!   payload loads
//!
//! ## Quick Start
//!
//! ```rust
//! use skylift::command::CabinCommand;
//! use skylift::sim::Simulator;
//! use skylift::warehouse::Warehouse;
//!
//! let mut sim = Simulator::new();
//! let mut warehouse = Warehouse::new();
//!
//! sim.apply(&CabinCommand::SetTarget { km: 50.0 }, Some(&mut warehouse));
//! sim.apply(&CabinCommand::Start, Some(&mut warehouse));
//!
//! let snapshot = sim.tick();
//! println!("cabin at {} km", snapshot.position_km);
//! ```
//!
//! ## Architecture
//!
//! - [`cabin`] - shared state record, door/mode enums, physical limits
//! - [`command`] - typed commands and the pure validation planner
//! - [`sim`] - the simulator core: guarded state plus the tick state machine
//! - [`recovery`] - deferred emergency-stop recovery task
//! - [`hub`] - observer registry and snapshot fan-out
//! - [`warehouse`] - parcel catalog collaborator
//! - [`protocol`] - wire requests, tagged envelopes, bounded buffers

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cabin;
pub mod command;
pub mod hub;
pub mod protocol;
pub mod recovery;
pub mod sim;
pub mod warehouse;

// Re-export main public types for convenience
pub use cabin::{CabinMode, CabinState, DoorState};
pub use command::CabinCommand;
pub use hub::BroadcastHub;
pub use protocol::Envelope;
pub use sim::Simulator;
pub use warehouse::Warehouse;
