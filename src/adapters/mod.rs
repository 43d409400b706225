//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter            | Implements       | Connects to                 |
//! |--------------------|------------------|-----------------------------|
//! | `log_sink`         | EventSink        | `log` facade                |
//! | `loopback`         | PubSubPort       | In-process broker           |
//! | `postcard_decoder` | SensorDecoder    | postcard sensor frames      |
//! | `tcp_link`         | StreamProvider   | Serial-over-TCP bridge      |
//! | `time`             | Clock, Sleeper   | `std::time`, thread sleep   |

pub mod log_sink;
pub mod loopback;
pub mod postcard_decoder;
pub mod tcp_link;
pub mod time;
