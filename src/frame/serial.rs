//! Segment layout, all integers little-endian:
//!
//! ```ascii
//!  0: conv (u32)
//!  4: cmd  (u8)
//!  5: frg  (u8)
//!  6: wnd  (u16)
//!  8: ts   (u32)
//! 12: sn   (u32)
//! 16: una  (u32)
//! 20: len  (u32)
//! 24: payload (len bytes)
//! ```
//!
//! Several segments may be concatenated into one packet.

use bytes::{Buf, BufMut, Bytes};

use super::*;
use crate::error::InputError;

const CMD_PUSH: u8 = 81;
const CMD_ACK: u8 = 82;
const CMD_WASK: u8 = 83;
const CMD_WINS: u8 = 84;

impl Command {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Push => CMD_PUSH,
            Self::Ack => CMD_ACK,
            Self::WindowAsk => CMD_WASK,
            Self::WindowTell => CMD_WINS,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_PUSH => Some(Self::Push),
            CMD_ACK => Some(Self::Ack),
            CMD_WASK => Some(Self::WindowAsk),
            CMD_WINS => Some(Self::WindowTell),
            _ => None,
        }
    }
}

impl SegmentHeader {
    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.conv);
        buf.put_u8(self.cmd.to_u8());
        buf.put_u8(self.frg);
        buf.put_u16_le(self.wnd);
        buf.put_u32_le(self.ts);
        buf.put_u32_le(self.sn);
        buf.put_u32_le(self.una);
        buf.put_u32_le(self.len);
    }
}

/// Writes a header followed by its payload. The header's `len` is taken from `payload`.
pub fn write_segment<B: BufMut>(buf: &mut B, header: &SegmentHeader, payload: &[u8]) {
    let header = SegmentHeader {
        len: payload.len() as u32,
        ..header.clone()
    };

    header.write(buf);
    buf.put_slice(payload);
}

/// Reads one segment from the front of `buf`, advancing past it.
pub fn read_segment<B: Buf>(buf: &mut B) -> Result<(SegmentHeader, Bytes), InputError> {
    if buf.remaining() < HEADER_SIZE {
        return Err(InputError::TooShort);
    }

    let conv = buf.get_u32_le();
    let cmd = buf.get_u8();
    let frg = buf.get_u8();
    let wnd = buf.get_u16_le();
    let ts = buf.get_u32_le();
    let sn = buf.get_u32_le();
    let una = buf.get_u32_le();
    let len = buf.get_u32_le();

    let declared = len as usize;
    if buf.remaining() < declared {
        return Err(InputError::TruncatedPayload {
            declared,
            remaining: buf.remaining(),
        });
    }

    let cmd = Command::from_u8(cmd).ok_or(InputError::UnknownCommand(cmd))?;

    let payload = buf.copy_to_bytes(declared);

    let header = SegmentHeader {
        conv,
        cmd,
        frg,
        wnd,
        ts,
        sn,
        una,
        len,
    };

    Ok((header, payload))
}

/// Returns the conversation id of the first segment in `bytes` without decoding the rest.
pub fn peek_conv(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }

    let mut conv_bytes = &bytes[..4];
    Some(conv_bytes.get_u32_le())
}
