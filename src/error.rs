use std::fmt;

/// Reasons an incoming packet buffer is rejected by [`Endpoint::input`](crate::Endpoint::input).
///
/// Segments decoded before the offending one keep their effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    /// The buffer is smaller than a segment header.
    TooShort,
    /// A segment belongs to another conversation.
    ConvMismatch { expected: u32, found: u32 },
    /// A segment declares more payload than the buffer holds.
    TruncatedPayload { declared: usize, remaining: usize },
    /// A segment carries a command byte outside PUSH/ACK/WASK/WINS.
    UnknownCommand(u8),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "packet shorter than a segment header"),
            Self::ConvMismatch { expected, found } => {
                write!(f, "conversation mismatch: expected {expected:#010x}, found {found:#010x}")
            }
            Self::TruncatedPayload { declared, remaining } => write!(
                f,
                "segment declares {declared} payload bytes but only {remaining} remain"
            ),
            Self::UnknownCommand(cmd) => write!(f, "unknown segment command {cmd}"),
        }
    }
}

impl std::error::Error for InputError {}

/// Reasons a buffer cannot be queued by [`Endpoint::send`](crate::Endpoint::send).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendError {
    /// Zero-length messages are not sent.
    Empty,
    /// The message would need more fragments than the receive window can reassemble.
    TooManyFragments { count: usize, limit: usize },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "cannot send an empty message"),
            Self::TooManyFragments { count, limit } => write!(
                f,
                "message needs {count} fragments, receive window allows fewer than {limit}"
            ),
        }
    }
}

impl std::error::Error for SendError {}

/// Reasons [`Endpoint::recv`](crate::Endpoint::recv) cannot return a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecvError {
    /// Nothing has been delivered in order yet.
    Empty,
    /// Fragments of the next message are still missing.
    Incomplete,
    /// The caller's buffer cannot hold the next message.
    BufferTooSmall { required: usize, capacity: usize },
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no message available"),
            Self::Incomplete => write!(f, "next message is not fully received"),
            Self::BufferTooSmall { required, capacity } => write!(
                f,
                "next message is {required} bytes, buffer holds {capacity}"
            ),
        }
    }
}

impl std::error::Error for RecvError {}

/// Rejected configuration values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The MTU leaves no room for payload after the segment header.
    MtuTooSmall(usize),
    /// A window size of zero was requested.
    ZeroWindow,
    /// The dead-link threshold must allow at least one transmission.
    ZeroDeadLink,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MtuTooSmall(mtu) => write!(f, "mtu {mtu} does not exceed the segment header"),
            Self::ZeroWindow => write!(f, "window sizes must be non-zero"),
            Self::ZeroDeadLink => write!(f, "dead link threshold must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}
