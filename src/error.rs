//! Unified error types for the Verdure bridge.
//!
//! A single `Error` enum that every subsystem converts into, with one
//! sub-enum per subsystem.  Frame-level faults never appear here: they are
//! recovered inside the transport by resynchronising on the start marker.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level bridge error
// ---------------------------------------------------------------------------

/// Every fallible operation in the bridge funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The serial transport failed.
    Transport(TransportError),
    /// The relay store rejected an operation.
    Relay(RelayError),
    /// The command dispatcher could not accept a command.
    Dispatch(DispatchError),
    /// Shadow synchronisation failed.
    Shadow(ShadowError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Shadow(e) => write!(f, "shadow: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The configured endpoint is not among the available endpoints.
    PortUnavailable { port: String, available: Vec<String> },
    /// Opening the endpoint failed below the protocol level.
    ConnectionFailed { port: String, reason: String },
    /// The link is not open.
    NotOpen,
    /// The underlying stream errored mid-operation.
    Io(String),
    /// Fewer bytes than requested reached the stream.
    WriteIncomplete { expected: usize, written: usize },
    /// The outgoing payload cannot be framed.
    Encode(crate::serial::codec::CodecError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortUnavailable { port, available } => {
                write!(f, "port '{port}' not found")?;
                if !available.is_empty() {
                    write!(f, ". Available ports: {}", available.join(", "))?;
                }
                Ok(())
            }
            Self::ConnectionFailed { port, reason } => {
                write!(f, "failed to open '{port}': {reason}")
            }
            Self::NotOpen => write!(f, "connection is not open"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::WriteIncomplete { expected, written } => {
                write!(f, "only {written}/{expected} bytes written")
            }
            Self::Encode(e) => write!(f, "encode: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<crate::serial::codec::CodecError> for TransportError {
    fn from(e: crate::serial::codec::CodecError) -> Self {
        Self::Encode(e)
    }
}

// ---------------------------------------------------------------------------
// Relay store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Index is not below the relay count.
    IndexOutOfRange { index: usize, count: usize },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, count } => {
                write!(f, "relay index {index} out of range (count {count})")
            }
        }
    }
}

impl std::error::Error for RelayError {}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatcher errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The bounded command queue is full; the command was not accepted.
    QueueFull,
    /// The worker has been shut down.
    Stopped,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
            Self::Stopped => write!(f, "dispatcher stopped"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

// ---------------------------------------------------------------------------
// Shadow errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowError {
    /// The pub/sub transport refused to connect.
    ConnectFailed(String),
    /// A subscription could not be established.
    SubscribeFailed { topic: String, reason: String },
    /// A publish was not accepted by the pub/sub transport.
    PublishFailed { topic: String },
    /// A relay change could not be confirmed against the store in time.
    VerificationTimeout { relay_index: usize, target: bool },
    /// An inbound document could not be parsed.
    MalformedDocument(String),
}

impl fmt::Display for ShadowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(reason) => write!(f, "connect failed: {reason}"),
            Self::SubscribeFailed { topic, reason } => {
                write!(f, "subscribe to '{topic}' failed: {reason}")
            }
            Self::PublishFailed { topic } => write!(f, "publish to '{topic}' failed"),
            Self::VerificationTimeout { relay_index, target } => write!(
                f,
                "relay {relay_index} did not reach {} before the deadline",
                if *target { "ON" } else { "OFF" }
            ),
            Self::MalformedDocument(msg) => write!(f, "malformed document: {msg}"),
        }
    }
}

impl std::error::Error for ShadowError {}

impl From<ShadowError> for Error {
    fn from(e: ShadowError) -> Self {
        Self::Shadow(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document could not be parsed.
    Parse(String),
    /// A field failed validation.  Describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Bridge-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
