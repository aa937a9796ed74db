use crate::cabin::{CabinState, DoorState};
use crate::command::CabinCommand;
use crate::warehouse::{Parcel, PARCEL_SNAPSHOT_LIMIT};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_REQUEST_SIZE: usize = 512;
pub const MAX_ENVELOPE_SIZE: usize = 2048;
/// Worst case for a full parcels snapshot: every parcel arrived inside a
/// request-sized line, plus the status field and envelope framing.
pub const MAX_PARCELS_ENVELOPE_SIZE: usize = PARCEL_SNAPSHOT_LIMIT * (MAX_REQUEST_SIZE + 32) + 64;

pub type RequestBuffer = ArrayString<MAX_REQUEST_SIZE>;
pub type EnvelopeBuffer = ArrayString<MAX_ENVELOPE_SIZE>;
pub type ParcelsBuffer = ArrayString<MAX_PARCELS_ENVELOPE_SIZE>;

/// One line received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    /// An operator command; always answered with an [`Ack`].
    Command(CommandRequest),
    /// Queue a parcel in the warehouse; broadcasts a parcels envelope.
    AddParcel(Parcel),
    /// On-demand state snapshot; answered with a telemetry envelope.
    Status,
    /// On-demand catalog listing; answered with a parcels envelope.
    Parcels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Start,
    Stop,
    EmergencyStop,
    SetDoors,
    SetTarget,
    SetSpeed,
    LoadFromWarehouse,
}

/// Untyped command payload as it appears on the wire; every field is
/// optional and the documented defaults apply during decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<CommandPayload>,
}

impl CommandRequest {
    pub fn bare(action: CommandAction) -> Self {
        Self {
            action,
            payload: None,
        }
    }

    /// Decodes the wire request into a typed command, applying payload
    /// defaults: a missing destination targets the anchor, anything but an
    /// explicit "OPEN" closes the doors, a missing speed keeps the current
    /// setpoint.
    pub fn into_command(self) -> CabinCommand {
        let payload = self.payload.unwrap_or_default();
        match self.action {
            CommandAction::Start => CabinCommand::Start,
            CommandAction::Stop => CabinCommand::Stop,
            CommandAction::EmergencyStop => CabinCommand::EmergencyStop,
            CommandAction::SetDoors => {
                let state = match payload.state.as_deref() {
                    Some("OPEN") => DoorState::Open,
                    _ => DoorState::Closed,
                };
                CabinCommand::SetDoors { state }
            }
            CommandAction::SetTarget => CabinCommand::SetTarget {
                km: payload.km.unwrap_or(0.0),
            },
            CommandAction::SetSpeed => CabinCommand::SetSpeed { ms: payload.ms },
            CommandAction::LoadFromWarehouse => CabinCommand::LoadFromWarehouse,
        }
    }
}

/// A message fanned out to observers, tagged for the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Envelope {
    Telemetry(CabinState),
    Parcels(Vec<Parcel>),
}

/// Unconditional command acknowledgement; the command contract reports
/// success even for rejected or clamped commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid JSON format")]
    InvalidJson,
    #[error("message exceeds buffer size")]
    MessageTooLarge,
    #[error("serialization failed")]
    SerializationError,
}

/// Parses requests and serializes envelopes through preallocated bounded
/// buffers, one handler per connection.
#[derive(Debug, Default)]
pub struct ProtocolHandler {
    request_buffer: RequestBuffer,
    envelope_buffer: EnvelopeBuffer,
    parcels_buffer: ParcelsBuffer,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            request_buffer: ArrayString::new(),
            envelope_buffer: ArrayString::new(),
            parcels_buffer: ArrayString::new(),
        }
    }

    pub fn parse_request(&mut self, json_str: &str) -> Result<Request, ProtocolError> {
        self.request_buffer.clear();
        if json_str.len() > MAX_REQUEST_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.request_buffer.push_str(json_str);

        serde_json::from_str::<Request>(json_str).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn serialize_envelope(&mut self, envelope: &Envelope) -> Result<&str, ProtocolError> {
        let json_str =
            serde_json::to_string(envelope).map_err(|_| ProtocolError::SerializationError)?;

        // Parcels envelopes carry up to a full snapshot and get the larger
        // buffer; telemetry stays on the tight one.
        match envelope {
            Envelope::Telemetry(_) => {
                self.envelope_buffer.clear();
                if json_str.len() > MAX_ENVELOPE_SIZE {
                    return Err(ProtocolError::MessageTooLarge);
                }
                self.envelope_buffer.push_str(&json_str);
                Ok(&self.envelope_buffer)
            }
            Envelope::Parcels(_) => {
                self.parcels_buffer.clear();
                if json_str.len() > MAX_PARCELS_ENVELOPE_SIZE {
                    return Err(ProtocolError::MessageTooLarge);
                }
                self.parcels_buffer.push_str(&json_str);
                Ok(&self.parcels_buffer)
            }
        }
    }

    pub fn serialize_ack(&mut self) -> Result<&str, ProtocolError> {
        self.envelope_buffer.clear();

        let json_str =
            serde_json::to_string(&Ack::ok()).map_err(|_| ProtocolError::SerializationError)?;
        self.envelope_buffer.push_str(&json_str);

        Ok(&self.envelope_buffer)
    }
}
