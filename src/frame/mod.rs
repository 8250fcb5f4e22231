pub mod serial;

/// Size of the fixed segment header preceding each payload on the wire.
pub const HEADER_SIZE: usize = 24;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    // Payload data
    Push,
    // Acknowledgement of a single sequence number
    Ack,
    // Window probe, asks the peer to advertise its window
    WindowAsk,
    // Window advertisement in response to a probe
    WindowTell,
}

/// Fields of a segment header as they appear on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SegmentHeader {
    pub conv: u32,
    pub cmd: Command,
    pub frg: u8,
    pub wnd: u16,
    pub ts: u32,
    pub sn: u32,
    pub una: u32,
    pub len: u32,
}
