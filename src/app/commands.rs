//! Inbound commands to the dispatcher.
//!
//! These represent actions requested by the outside world (dashboard,
//! socket layer, shadow engine) that the
//! [`Dispatcher`](crate::dispatch::Dispatcher) executes in order.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Commands that external callers can submit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Drive a relay.  `desired_state: None` toggles it.
    ToggleRelay {
        index: usize,
        desired_state: Option<bool>,
    },

    /// Recalibrate a pH probe against a reference value.
    CalibratePh { sensor_index: u32, value: f32 },
}

impl Command {
    /// Toggle relay `index`.
    pub fn toggle(index: usize) -> Self {
        Self::ToggleRelay {
            index,
            desired_state: None,
        }
    }

    /// Drive relay `index` to `state`.
    pub fn set_relay(index: usize, state: bool) -> Self {
        Self::ToggleRelay {
            index,
            desired_state: Some(state),
        }
    }

    /// Parse a control-intake document.
    ///
    /// Accepted shapes:
    /// - `{"relay_index": 2, "state": true}` (`state` null or absent toggles)
    /// - `{"sensor_index": 0, "calibration_value": 7.0}`
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let request: ControlRequest =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(request.into())
    }

    /// The device-side form of this command.
    ///
    /// The boolean target of a relay command stays local: the device
    /// toggles on receipt, so only the index crosses the wire.
    pub fn to_wire(&self) -> WireCommand {
        match *self {
            Self::ToggleRelay { index, .. } => WireCommand::ToggleRelay {
                relay_index: index as u32,
            },
            Self::CalibratePh {
                sensor_index,
                value,
            } => WireCommand::CalibratePh {
                sensor_index,
                value,
            },
        }
    }
}

/// The two control-intake shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ControlRequest {
    Relay {
        relay_index: usize,
        #[serde(default)]
        state: Option<bool>,
    },
    Calibration {
        sensor_index: u32,
        calibration_value: f32,
    },
}

impl From<ControlRequest> for Command {
    fn from(request: ControlRequest) -> Self {
        match request {
            ControlRequest::Relay { relay_index, state } => Command::ToggleRelay {
                index: relay_index,
                desired_state: state,
            },
            ControlRequest::Calibration {
                sensor_index,
                calibration_value,
            } => Command::CalibratePh {
                sensor_index,
                value: calibration_value,
            },
        }
    }
}

/// Command as the device firmware understands it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WireCommand {
    ToggleRelay { relay_index: u32 },
    CalibratePh { sensor_index: u32, value: f32 },
}

impl WireCommand {
    /// Serialise to the frame payload sent over the serial link.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
