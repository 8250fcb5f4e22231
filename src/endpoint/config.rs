use crate::error::ConfigError;
use crate::frame::HEADER_SIZE;

pub const MTU_DEFAULT: usize = 1400;
pub const INTERVAL_DEFAULT_MS: u32 = 100;
pub const INTERVAL_MIN_MS: u32 = 10;
pub const INTERVAL_MAX_MS: u32 = 5000;
pub const SEND_WINDOW_DEFAULT: u32 = 32;
pub const RECEIVE_WINDOW_DEFAULT: u32 = 128;
// Largest window the 16-bit wnd field can advertise
pub const RECEIVE_WINDOW_MAX: u32 = u16::MAX as u32;
pub const DEAD_LINK_DEFAULT: u32 = 20;

/// Configuration for an [`Endpoint`](crate::Endpoint).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum size of an assembled packet, including segment headers, in bytes.
    ///
    /// Minimum value: 25 \
    /// Default value: 1,400
    pub mtu: usize,

    /// Period between flushes when driven by `update`, in milliseconds. Out of range values are
    /// clamped.
    ///
    /// Range: 10 - 5,000 \
    /// Default value: 100
    pub interval_ms: u32,

    /// Lowers the RTO floor and halves the RTO back-off on retransmission.
    ///
    /// Default value: false
    pub nodelay: bool,

    /// Number of later acknowledgements which trigger an early retransmission of a segment. Zero
    /// disables fast retransmission.
    ///
    /// Default value: 0
    pub fast_resend: u32,

    /// Ignores the congestion window when computing how many segments may be in flight.
    ///
    /// Default value: false
    pub no_congestion_window: bool,

    /// Maximum number of segments in flight, in segments.
    ///
    /// Default value: 32
    pub send_window: u32,

    /// Maximum number of segments buffered for reassembly, in segments.
    ///
    /// Range: 128 - 65,535 (out of range values are clamped) \
    /// Default value: 128
    pub receive_window: u32,

    /// Coalesces sends into full segments without preserving message boundaries.
    ///
    /// Default value: false
    pub stream: bool,

    /// Number of transmissions of a single segment after which the link is considered dead.
    ///
    /// Default value: 20
    pub dead_link: u32,

    /// Overrides the minimum RTO implied by `nodelay`, in milliseconds.
    ///
    /// Default value: None
    pub min_rto_ms: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mtu: MTU_DEFAULT,
            interval_ms: INTERVAL_DEFAULT_MS,
            nodelay: false,
            fast_resend: 0,
            no_congestion_window: false,
            send_window: SEND_WINDOW_DEFAULT,
            receive_window: RECEIVE_WINDOW_DEFAULT,
            stream: false,
            dead_link: DEAD_LINK_DEFAULT,
            min_rto_ms: None,
        }
    }
}

impl Config {
    /// Default settings with a 10ms flush interval.
    pub fn normal() -> Self {
        Self {
            interval_ms: 10,
            ..Default::default()
        }
    }

    /// Like [`Config::normal`], without congestion control.
    pub fn no_congestion() -> Self {
        Self {
            interval_ms: 10,
            no_congestion_window: true,
            ..Default::default()
        }
    }

    /// Low latency settings: no-delay RTO, fast retransmission after two skips, and no congestion
    /// control.
    pub fn fast() -> Self {
        Self {
            interval_ms: 10,
            nodelay: true,
            fast_resend: 2,
            no_congestion_window: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mtu <= HEADER_SIZE {
            return Err(ConfigError::MtuTooSmall(self.mtu));
        }

        if self.send_window == 0 || self.receive_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        if self.dead_link == 0 {
            return Err(ConfigError::ZeroDeadLink);
        }

        Ok(())
    }
}
