use bytes::Bytes;

use crate::frame::{Command, SegmentHeader};

/// A single protocol unit, either waiting to be sent, in flight, or received.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub conv: u32,
    pub cmd: Command,
    pub frg: u8,
    pub wnd: u16,
    pub ts: u32,
    pub sn: u32,
    pub una: u32,

    // Retransmission bookkeeping, never sent
    pub resend_ts: u32,
    pub rto: u32,
    pub fastack: u32,
    pub xmit: u32,

    pub data: Bytes,
}

impl Segment {
    /// Creates an outbound data segment. Wire fields other than `frg` are filled in when the
    /// segment enters the send window.
    pub fn new(frg: u8, data: Bytes) -> Self {
        Self {
            conv: 0,
            cmd: Command::Push,
            frg,
            wnd: 0,
            ts: 0,
            sn: 0,
            una: 0,
            resend_ts: 0,
            rto: 0,
            fastack: 0,
            xmit: 0,
            data,
        }
    }

    pub fn from_wire(header: &SegmentHeader, data: Bytes) -> Self {
        Self {
            conv: header.conv,
            cmd: header.cmd,
            frg: header.frg,
            wnd: header.wnd,
            ts: header.ts,
            sn: header.sn,
            una: header.una,
            resend_ts: 0,
            rto: 0,
            fastack: 0,
            xmit: 0,
            data,
        }
    }

    pub fn header(&self) -> SegmentHeader {
        SegmentHeader {
            conv: self.conv,
            cmd: self.cmd,
            frg: self.frg,
            wnd: self.wnd,
            ts: self.ts,
            sn: self.sn,
            una: self.una,
            len: self.data.len() as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}
