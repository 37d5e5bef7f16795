//! # Simulator Messages
//!
//! The driving simulator speaks a socket.io style protocol over the WebSocket. Each text payload
//! that carries an event starts with the two character sentinel `42` (`4` for a message, `2` for
//! an event), followed by a JSON array holding the event name and its data:
//!
//! ```text
//! 42["telemetry",{"ptsx":[...],"ptsy":[...],"x":..,"y":..,"psi":..,"speed":..,...}]
//! 42["steer",{"steering_angle":..,"throttle":..,"mpc_x":[...],...}]
//! 42["manual",{}]
//! ```
//!
//! Payloads without the sentinel carry no event and are ignored. Payloads with the sentinel which
//! do not decode into a telemetry event are answered with the manual driving acknowledgment.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Sentinel which prefixes every event payload.
pub const SENTINEL: &str = "42";

/// Name of the inbound telemetry event.
pub const TELEMETRY_EVENT: &str = "telemetry";

/// Name of the outbound steering event.
pub const STEER_EVENT: &str = "steer";

/// The fixed reply sent when the simulator is in manual mode, or when an event can't be used.
pub const MANUAL_ACK: &str = "42[\"manual\",{}]";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry sent by the simulator on every tick.
///
/// All positions and the heading are in the world (map) frame. Extra fields sent by the simulator
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// World frame X coordinates of the upcoming waypoints
    pub ptsx: Vec<f64>,

    /// World frame Y coordinates of the upcoming waypoints, parallel to `ptsx`
    pub ptsy: Vec<f64>,

    /// Vehicle X position
    pub x: f64,

    /// Vehicle Y position
    pub y: f64,

    /// Vehicle heading.
    ///
    /// Units: radians
    pub psi: f64,

    /// Vehicle speed
    pub speed: f64,

    /// The steering command currently applied by the vehicle
    pub steering_angle: f64,

    /// The throttle command currently applied by the vehicle
    pub throttle: f64,
}

/// Steering command sent back to the simulator.
///
/// All points are in the vehicle body frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteerCmd {
    /// Normalised steering demand in the range [-1, 1]
    pub steering_angle: f64,

    /// Throttle demand
    pub throttle: f64,

    /// Predicted trajectory X coordinates (green line)
    pub mpc_x: Vec<f64>,

    /// Predicted trajectory Y coordinates (green line)
    pub mpc_y: Vec<f64>,

    /// Reference waypoint X coordinates (yellow line)
    pub next_x: Vec<f64>,

    /// Reference waypoint Y coordinates (yellow line)
    pub next_y: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A frame received from the simulator, classified by how the session must respond to it.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// The payload doesn't carry an event, no reply is sent.
    Ignored,

    /// The payload carries no usable telemetry, the manual acknowledgment is sent.
    Manual,

    /// A telemetry event.
    Telemetry(Telemetry),
}

/// A frame to send to the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Steer(SteerCmd),
    Manual,
}

/// Errors which can occur while decoding or encoding simulator frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("The payload does not start with the \"{}\" sentinel", SENTINEL)]
    MissingSentinel,

    #[error("The payload carries no event data")]
    NoData,

    #[error("The event data is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Expected a \"{}\" event, found {0:?}", TELEMETRY_EVENT)]
    UnexpectedEvent(String),

    #[error("Waypoint coordinate arrays differ in length (ptsx: {ptsx}, ptsy: {ptsy})")]
    WaypointLengthMismatch { ptsx: usize, ptsy: usize },

    #[error("Could not serialize the frame: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InboundFrame {
    /// Classify a raw text payload received from the simulator.
    pub fn from_payload(payload: &str) -> Self {
        if !has_sentinel(payload) {
            return InboundFrame::Ignored;
        }

        match Telemetry::from_payload(payload) {
            Ok(t) => InboundFrame::Telemetry(t),
            Err(_) => InboundFrame::Manual,
        }
    }
}

impl Telemetry {
    /// Decode a telemetry event from a raw text payload.
    pub fn from_payload(payload: &str) -> Result<Self, ProtocolError> {
        if !has_sentinel(payload) {
            return Err(ProtocolError::MissingSentinel);
        }

        let data = event_data(payload).ok_or(ProtocolError::NoData)?;

        let (event, body): (String, Value) =
            serde_json::from_str(data).map_err(ProtocolError::InvalidJson)?;

        if event != TELEMETRY_EVENT {
            return Err(ProtocolError::UnexpectedEvent(event));
        }

        let telemetry: Telemetry =
            serde_json::from_value(body).map_err(ProtocolError::InvalidJson)?;

        if telemetry.ptsx.len() != telemetry.ptsy.len() {
            return Err(ProtocolError::WaypointLengthMismatch {
                ptsx: telemetry.ptsx.len(),
                ptsy: telemetry.ptsy.len(),
            });
        }

        Ok(telemetry)
    }

    /// Encode this telemetry as a simulator payload. Used by test clients.
    pub fn to_payload(&self) -> Result<String, ProtocolError> {
        encode_event(TELEMETRY_EVENT, self)
    }
}

impl SteerCmd {
    /// The safe default command: no steering, no throttle, nothing to display.
    pub fn safe_stop() -> Self {
        Self {
            steering_angle: 0.0,
            throttle: 0.0,
            mpc_x: Vec::new(),
            mpc_y: Vec::new(),
            next_x: Vec::new(),
            next_y: Vec::new(),
        }
    }
}

impl OutboundFrame {
    /// Encode this frame as a text payload.
    pub fn to_payload(&self) -> Result<String, ProtocolError> {
        match self {
            OutboundFrame::Steer(cmd) => encode_event(STEER_EVENT, cmd),
            OutboundFrame::Manual => Ok(String::from(MANUAL_ACK)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check the payload is an event, i.e. is longer than the sentinel and starts with it.
fn has_sentinel(payload: &str) -> bool {
    payload.len() > SENTINEL.len() && payload.starts_with(SENTINEL)
}

/// Extract the `[event, {data}]` array from an event payload.
///
/// Returns `None` if the payload holds a `null` (the simulator's manual mode) or if no array ending
/// in an object can be found.
fn event_data(payload: &str) -> Option<&str> {
    if payload.contains("null") {
        return None;
    }

    let start = payload.find('[')?;
    let end = payload.rfind("}]")?;

    if end < start {
        return None;
    }

    Some(&payload[start..end + 2])
}

fn encode_event<T: Serialize>(event: &str, data: &T) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(&(event, data)).map_err(ProtocolError::SerializationError)?;

    Ok(format!("{}{}", SENTINEL, body))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TELEMETRY_PAYLOAD: &str = "42[\"telemetry\",{\"ptsx\":[-32.16173,-43.49173,-61.09,\
        -78.29172],\"ptsy\":[113.361,105.941,92.88499,78.73102],\"psi_unity\":4.12033,\
        \"psi\":3.733651,\"x\":-40.62008,\"y\":108.7301,\"steering_angle\":0,\"throttle\":0,\
        \"speed\":0}]";

    #[test]
    fn test_decode_telemetry() {
        let t = match InboundFrame::from_payload(TELEMETRY_PAYLOAD) {
            InboundFrame::Telemetry(t) => t,
            f => panic!("Expected telemetry, got {:?}", f),
        };

        assert_eq!(t.ptsx, vec![-32.16173, -43.49173, -61.09, -78.29172]);
        assert_eq!(t.ptsy, vec![113.361, 105.941, 92.88499, 78.73102]);
        assert_eq!(t.x, -40.62008);
        assert_eq!(t.y, 108.7301);
        assert_eq!(t.psi, 3.733651);
        assert_eq!(t.speed, 0.0);
        assert_eq!(t.steering_angle, 0.0);
        assert_eq!(t.throttle, 0.0);
    }

    #[test]
    fn test_payload_without_sentinel_ignored() {
        assert_eq!(InboundFrame::from_payload(""), InboundFrame::Ignored);
        assert_eq!(InboundFrame::from_payload("42"), InboundFrame::Ignored);
        assert_eq!(InboundFrame::from_payload("2probe"), InboundFrame::Ignored);
        assert_eq!(
            InboundFrame::from_payload(&TELEMETRY_PAYLOAD[2..]),
            InboundFrame::Ignored
        );
    }

    #[test]
    fn test_unusable_event_is_manual() {
        // Simulator manual mode
        assert_eq!(InboundFrame::from_payload("42[\"manual\",null]"), InboundFrame::Manual);
        // Garbage after the sentinel
        assert_eq!(InboundFrame::from_payload("42garbage"), InboundFrame::Manual);
        assert_eq!(InboundFrame::from_payload("42[\"telemetry\",{\"x\":}]"), InboundFrame::Manual);
        // Wrong event
        assert_eq!(
            InboundFrame::from_payload("42[\"reset\",{\"x\":1.0}]"),
            InboundFrame::Manual
        );
        // Missing fields
        assert_eq!(
            InboundFrame::from_payload("42[\"telemetry\",{\"x\":1.0}]"),
            InboundFrame::Manual
        );
    }

    #[test]
    fn test_waypoint_length_mismatch() {
        let payload = "42[\"telemetry\",{\"ptsx\":[1,2,3,4],\"ptsy\":[1,2,3],\"psi\":0,\"x\":0,\
            \"y\":0,\"steering_angle\":0,\"throttle\":0,\"speed\":0}]";

        match Telemetry::from_payload(payload) {
            Err(ProtocolError::WaypointLengthMismatch { ptsx: 4, ptsy: 3 }) => (),
            r => panic!("Expected a length mismatch, got {:?}", r),
        }
        assert_eq!(InboundFrame::from_payload(payload), InboundFrame::Manual);
    }

    #[test]
    fn test_encode_manual() {
        assert_eq!(OutboundFrame::Manual.to_payload().unwrap(), "42[\"manual\",{}]");
    }

    #[test]
    fn test_encode_steer() {
        let cmd = SteerCmd {
            steering_angle: -0.5,
            throttle: 0.25,
            mpc_x: vec![1.0, 2.0],
            mpc_y: vec![0.0, 0.5],
            next_x: vec![3.0],
            next_y: vec![-1.0],
        };

        let payload = OutboundFrame::Steer(cmd.clone()).to_payload().unwrap();

        assert_eq!(
            payload,
            "42[\"steer\",{\"steering_angle\":-0.5,\"throttle\":0.25,\"mpc_x\":[1.0,2.0],\
             \"mpc_y\":[0.0,0.5],\"next_x\":[3.0],\"next_y\":[-1.0]}]"
        );

        // The payload must read back with the simulator's framing rules
        let (event, body): (String, SteerCmd) =
            serde_json::from_str(event_data(&payload).unwrap()).unwrap();
        assert_eq!(event, STEER_EVENT);
        assert_eq!(body, cmd);
    }

    #[test]
    fn test_telemetry_to_payload_decodes() {
        let t = Telemetry {
            ptsx: vec![0.0, 1.0, 2.0, 3.0],
            ptsy: vec![0.0; 4],
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            speed: 20.0,
            steering_angle: 0.0,
            throttle: 0.0,
        };

        assert_eq!(Telemetry::from_payload(&t.to_payload().unwrap()).unwrap(), t);
    }
}
