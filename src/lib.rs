/*

An ARQ protocol engine in the style of KCP. An endpoint turns a lossy, reordering datagram
transport into a reliable, ordered message channel. It never touches a socket itself: packets are
handed to a HostContext, received packets are passed to Endpoint::input, and time is supplied by
the caller through Endpoint::update.

# Segments

Every segment carries a fixed 24-byte little-endian header followed by its payload:

  conv u32 | cmd u8 | frg u8 | wnd u16 | ts u32 | sn u32 | una u32 | len u32 | payload

Segments are packed back to back into packets of at most one MTU. A receiver decodes segments from
a packet until fewer than 24 bytes remain.

cmd is one of PUSH (data), ACK, WASK (window probe) or WINS (window advertisement). Every segment
also advertises the sender's free receive window (wnd) and its cumulative acknowledgement (una),
so any segment can advance the peer's send window.

# Fragmentation

A message longer than one MSS (MTU - 24) is split into fragments numbered downward, so that the
last fragment always has frg = 0:

  "abcdefghij", mss 4 => [abcd frg=2] [efgh frg=1] [ij frg=0]

The receiver delivers a message once every fragment down to frg = 0 is in order at the front of
its receive queue. In stream mode, writes are coalesced into full segments and every fragment is
numbered 0, so message boundaries are lost.

# Windows

  snd_una         snd_nxt       snd_una + min(snd_wnd, rmt_wnd, cwnd)
  v               v             v
  ################______________---------> sn

Segments are assigned sequence numbers only when they enter the send window. The receiver buffers
out of order segments within [rcv_nxt, rcv_nxt + rcv_wnd) and moves contiguous runs into its
receive queue, which is in turn bounded by rcv_wnd. A peer advertising a zero window is probed
with WASK after 7s, backing off by half up to 120s.

# Acknowledgement

Each received PUSH below the window end is acknowledged individually with its sn and original ts,
even if it is a duplicate. ACKs are batched and sent on the next flush. On receipt, the sender:

  - drops every segment below the cumulative una
  - drops the acknowledged segment
  - counts a skip against every older segment still in flight (for fast retransmission)
  - samples the round trip time as current - ts

# Retransmission

The RTO is estimated as in RFC 6298 with a floor of 100ms (30ms in no-delay mode):

  rttval <- (3 * rttval + |rtt - srtt|) / 4
  srtt   <- (7 * srtt + rtt) / 8
  rto    <- srtt + max(interval, 4 * rttval)

A segment is retransmitted when its timer expires, with the timeout growing by one RTO (half an
RTO in no-delay mode) per attempt, or when it has been skipped fast_resend times. A segment sent
dead_link times marks the link as dead.

# Congestion window

cwnd counts segments. While below ssthresh, it grows by one per acknowledgement that advances
una; above it, by roughly one per window. A fast retransmission sets ssthresh to half the
segments in flight and cwnd to ssthresh plus the resend threshold; a timeout sets ssthresh to
half the window and cwnd to 1. The congestion window may be disabled entirely, leaving only the
send and remote windows.

# Scheduling

update(now) flushes every interval milliseconds. check(now) returns the time at which update next
needs to be called, so that an idle endpoint can sleep until then. If the clock jumps by more than
10s in either direction, the flush schedule is reset to the current time.

*/

mod buffer;
mod endpoint;
mod error;
mod frame;
mod session;
mod socket;

pub use endpoint::{Config, Endpoint, HostContext, State};
pub use error::{ConfigError, InputError, RecvError, SendError};
pub use frame::HEADER_SIZE;

pub use session::{Session, SocketContext};

/// Returns the conversation id of a raw packet, or `None` if it is too short to hold a segment.
pub fn get_conv(packet: &[u8]) -> Option<u32> {
    frame::serial::peek_conv(packet)
}

// Signed distance from `earlier` to `later` on the wrapping u32 line, for timestamps and sequence
// numbers alike
fn wrapping_diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init()
            .ok();
    }

    #[test]
    fn wrapping_comparison() {
        assert_eq!(wrapping_diff(5, 3), 2);
        assert_eq!(wrapping_diff(3, 5), -2);
        assert_eq!(wrapping_diff(1, u32::MAX), 2);
        assert_eq!(wrapping_diff(u32::MAX, 1), -2);
    }

    #[test]
    fn conv_of_packet() {
        let mut packet = vec![0; HEADER_SIZE];
        packet[..4].copy_from_slice(&0xDEADBEEF_u32.to_le_bytes());

        assert_eq!(get_conv(&packet), Some(0xDEADBEEF));
        assert_eq!(get_conv(&packet[..HEADER_SIZE - 1]), None);
    }
}
