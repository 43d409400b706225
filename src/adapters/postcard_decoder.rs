//! Default [`SensorDecoder`]: the payload is a postcard-encoded
//! [`SensorReading`].

use log::warn;

use crate::app::events::SensorReading;
use crate::app::ports::SensorDecoder;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostcardSensorDecoder;

impl SensorDecoder for PostcardSensorDecoder {
    fn decode(&self, payload: &[u8]) -> Option<SensorReading> {
        match postcard::from_bytes(payload) {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("Serial: sensor payload decode failed: {}", e);
                None
            }
        }
    }
}

/// Encode a reading the way the device does.  For simulators and tests.
pub fn encode_reading(reading: &SensorReading) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(reading)
}
