use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::buffer::{RxBuffer, Segment, TxBuffer};
use crate::error::{ConfigError, InputError, RecvError, SendError};
use crate::frame::{serial, Command, SegmentHeader, HEADER_SIZE};
use crate::wrapping_diff;

mod ack;
mod cc;
mod config;
mod probe;
mod rtt;

pub use config::Config;

use ack::AckList;
use cc::Congestion;
use config::{
    INTERVAL_MAX_MS, INTERVAL_MIN_MS, RECEIVE_WINDOW_DEFAULT, RECEIVE_WINDOW_MAX,
};
use probe::{ProbeFlags, WindowProbe};
use rtt::{RttEstimator, RTO_MIN, RTO_NDL};

// A clock jump larger than this resynchronizes the flush schedule
const FLUSH_RESYNC_MS: i32 = 10000;

pub trait HostContext {
    // Called to send an assembled packet to the remote host. The return value is only logged.
    fn send_frame(&mut self, frame_bytes: &[u8], user: u64) -> i32;
}

impl<F> HostContext for F
where
    F: FnMut(&[u8], u64) -> i32,
{
    fn send_frame(&mut self, frame_bytes: &[u8], user: u64) -> i32 {
        self(frame_bytes, user)
    }
}

/// Lifecycle of an [`Endpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// `update` has not been called yet, nothing is flushed.
    Uninitialized,
    /// Normal operation.
    Active,
    /// Some segment reached the dead-link retransmission limit. The endpoint keeps working, but
    /// the link should be considered lost.
    Dead,
}

// Packets are assembled here before being handed to the host, up to one MTU at a time
struct OutputBuffer {
    buffer: BytesMut,
    mtu: usize,
}

impl OutputBuffer {
    fn new(mtu: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity((mtu + HEADER_SIZE) * 3),
            mtu,
        }
    }

    fn make_room<C: HostContext>(&mut self, len: usize, ctx: &mut C, conv: u32, user: u64) {
        if self.buffer.len() + len > self.mtu {
            self.emit(ctx, conv, user);
        }
    }

    fn emit<C: HostContext>(&mut self, ctx: &mut C, conv: u32, user: u64) {
        if self.buffer.is_empty() {
            return;
        }

        let ret = ctx.send_frame(&self.buffer, user);
        trace!(conv, len = self.buffer.len(), ret, "output");

        self.buffer.clear();
    }
}

/// One side of a conversation. Owns the send and receive windows and talks to the remote side
/// exclusively through its [`HostContext`].
pub struct Endpoint<C> {
    conv: u32,
    user: u64,
    ctx: C,

    state: State,
    current: u32,
    ts_flush: u32,
    interval: u32,

    mtu: usize,
    nodelay: bool,
    fast_resend: u32,
    no_cwnd: bool,
    snd_wnd: u32,
    rmt_wnd: u32,
    dead_link: u32,

    // Total timeout retransmissions
    xmit: u32,

    tx: TxBuffer,
    rx: RxBuffer,
    acks: AckList,
    rtt: RttEstimator,
    cc: Congestion,
    probe: WindowProbe,
    out: OutputBuffer,
}

impl<C> Endpoint<C>
where
    C: HostContext,
{
    pub fn new(conv: u32, user: u64, ctx: C) -> Self {
        let defaults = Config::default();
        let mss = defaults.mtu - HEADER_SIZE;

        Self {
            conv,
            user,
            ctx,

            state: State::Uninitialized,
            current: 0,
            ts_flush: defaults.interval_ms,
            interval: defaults.interval_ms,

            mtu: defaults.mtu,
            nodelay: false,
            fast_resend: 0,
            no_cwnd: false,
            snd_wnd: defaults.send_window,
            rmt_wnd: defaults.receive_window,
            dead_link: defaults.dead_link,

            xmit: 0,

            tx: TxBuffer::new(mss),
            rx: RxBuffer::new(defaults.receive_window),
            acks: AckList::new(),
            rtt: RttEstimator::new(),
            cc: Congestion::new(mss),
            probe: WindowProbe::new(),
            out: OutputBuffer::new(defaults.mtu),
        }
    }

    pub fn with_config(conv: u32, user: u64, ctx: C, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut endpoint = Self::new(conv, user, ctx);

        endpoint.set_mtu(config.mtu)?;
        endpoint.set_nodelay(
            config.nodelay,
            config.interval_ms,
            config.fast_resend,
            config.no_congestion_window,
        );
        endpoint.set_window(config.send_window, config.receive_window);
        endpoint.set_stream(config.stream);
        endpoint.set_dead_link(config.dead_link);

        if let Some(min_rto_ms) = config.min_rto_ms {
            endpoint.set_min_rto(min_rto_ms);
        }

        Ok(endpoint)
    }

    pub fn conv(&self) -> u32 {
        self.conv
    }

    pub fn user(&self) -> u64 {
        self.user
    }

    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state == State::Dead
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn mss(&self) -> usize {
        self.mtu - HEADER_SIZE
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn rto(&self) -> u32 {
        self.rtt.rto()
    }

    pub fn srtt(&self) -> u32 {
        self.rtt.srtt()
    }

    pub fn rttval(&self) -> u32 {
        self.rtt.rttval()
    }

    pub fn min_rto(&self) -> u32 {
        self.rtt.min_rto()
    }

    pub fn cwnd(&self) -> u32 {
        self.cc.cwnd()
    }

    pub fn ssthresh(&self) -> u32 {
        self.cc.ssthresh()
    }

    pub fn remote_window(&self) -> u32 {
        self.rmt_wnd
    }

    pub fn retransmit_count(&self) -> u32 {
        self.xmit
    }

    /// Number of segments queued or in flight.
    pub fn wait_snd(&self) -> usize {
        self.tx.wait_snd()
    }

    pub fn peek_size(&self) -> Option<usize> {
        self.rx.peek_size()
    }

    /// Queues a message for transmission. Nothing is sent until the next flush.
    pub fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.tx.push(data, self.rx.rcv_wnd())?;

        trace!(conv = self.conv, len = data.len(), "send");

        Ok(())
    }

    /// Removes the next complete message and copies it into `buf`.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, RecvError> {
        let recover = self.rx.is_queue_full();

        let len = self.rx.recv(buf)?;

        trace!(conv = self.conv, len, "recv");

        if recover && !self.rx.is_queue_full() {
            // Tell the peer the window has reopened
            self.probe.request_tell();
        }

        Ok(len)
    }

    /// Copies the next complete message into `buf` without removing it.
    pub fn peek(&self, buf: &mut [u8]) -> Result<usize, RecvError> {
        self.rx.peek(buf)
    }

    /// Processes a packet received from the remote host. A packet may contain several segments;
    /// segments processed before an error keep their effect.
    pub fn input(&mut self, data: &[u8]) -> Result<(), InputError> {
        trace!(conv = self.conv, len = data.len(), "input");

        if data.len() < HEADER_SIZE {
            return Err(InputError::TooShort);
        }

        let prev_una = self.tx.snd_una();
        let mut max_ack = None;

        let mut buf = data;

        while buf.len() >= HEADER_SIZE {
            if let Some(conv) = serial::peek_conv(buf) {
                if conv != self.conv {
                    return Err(InputError::ConvMismatch {
                        expected: self.conv,
                        found: conv,
                    });
                }
            }

            let (header, payload) = serial::read_segment(&mut buf)?;

            self.handle_segment(header, payload, &mut max_ack);
        }

        if let Some(sn) = max_ack {
            self.tx.parse_fastack(sn);
        }

        if wrapping_diff(self.tx.snd_una(), prev_una) > 0 {
            self.cc.handle_ack(self.rmt_wnd);
        }

        Ok(())
    }

    fn handle_segment(
        &mut self,
        header: SegmentHeader,
        payload: bytes::Bytes,
        max_ack: &mut Option<u32>,
    ) {
        self.rmt_wnd = header.wnd as u32;

        self.tx.parse_una(header.una);
        self.tx.shrink();

        match header.cmd {
            Command::Ack => {
                let rtt = wrapping_diff(self.current, header.ts);

                if rtt >= 0 {
                    self.rtt.update(rtt as u32, self.interval);
                }

                self.tx.parse_ack(header.sn);
                self.tx.shrink();

                *max_ack = match *max_ack {
                    Some(sn) if wrapping_diff(header.sn, sn) <= 0 => Some(sn),
                    _ => Some(header.sn),
                };

                trace!(
                    conv = self.conv,
                    sn = header.sn,
                    rtt,
                    rto = self.rtt.rto(),
                    "input ack"
                );
            }
            Command::Push => {
                trace!(conv = self.conv, sn = header.sn, ts = header.ts, "input push");

                let rcv_nxt = self.rx.rcv_nxt();
                let rcv_end = rcv_nxt.wrapping_add(self.rx.rcv_wnd());

                if wrapping_diff(header.sn, rcv_end) < 0 {
                    // Acknowledge anything below the window end, including duplicates
                    self.acks.push(header.sn, header.ts);

                    if wrapping_diff(header.sn, rcv_nxt) >= 0 {
                        self.rx.parse_data(Segment::from_wire(&header, payload));
                    }
                }
            }
            Command::WindowAsk => {
                trace!(conv = self.conv, "input probe");
                self.probe.request_tell();
            }
            Command::WindowTell => {
                trace!(conv = self.conv, wnd = header.wnd, "input wins");
            }
        }
    }

    /// Sends pending acknowledgements, probes, and any data the windows allow, retransmitting
    /// segments whose timers have expired. Does nothing until the first `update`.
    pub fn flush(&mut self) {
        if self.state == State::Uninitialized {
            return;
        }

        let conv = self.conv;
        let user = self.user;
        let current = self.current;

        let wnd = self.rx.wnd_unused().min(u16::MAX as u32) as u16;
        let una = self.rx.rcv_nxt();

        let mut header = SegmentHeader {
            conv,
            cmd: Command::Ack,
            frg: 0,
            wnd,
            ts: 0,
            sn: 0,
            una,
            len: 0,
        };

        if !self.acks.is_empty() {
            trace!(conv, count = self.acks.len(), "flush acks");
        }

        for (sn, ts) in self.acks.drain() {
            self.out.make_room(HEADER_SIZE, &mut self.ctx, conv, user);

            header.sn = sn;
            header.ts = ts;
            header.write(&mut self.out.buffer);
        }

        header.sn = 0;
        header.ts = 0;

        if self.probe.update(self.rmt_wnd, current) {
            debug!(conv, wait = self.probe.probe_wait(), "probing zero remote window");
        }

        let probes = self.probe.take();

        if probes.contains(ProbeFlags::ASK_SEND) {
            header.cmd = Command::WindowAsk;
            self.out.make_room(HEADER_SIZE, &mut self.ctx, conv, user);
            header.write(&mut self.out.buffer);
        }

        if probes.contains(ProbeFlags::ASK_TELL) {
            header.cmd = Command::WindowTell;
            self.out.make_room(HEADER_SIZE, &mut self.ctx, conv, user);
            header.write(&mut self.out.buffer);
        }

        let mut window = self.snd_wnd.min(self.rmt_wnd);
        if !self.no_cwnd {
            window = window.min(self.cc.cwnd());
        }

        let rto = self.rtt.rto();

        self.tx.fill_window(window, |segment| {
            segment.conv = conv;
            segment.cmd = Command::Push;
            segment.wnd = wnd;
            segment.ts = current;
            segment.una = una;
            segment.resend_ts = current;
            segment.rto = rto;
            segment.fastack = 0;
            segment.xmit = 0;
        });

        let resent = if self.fast_resend > 0 {
            self.fast_resend
        } else {
            u32::MAX
        };
        let rtomin = if self.nodelay { 0 } else { rto >> 3 };

        let mut lost = false;
        let mut change = false;
        let mut dead = false;

        for segment in self.tx.in_flight_mut() {
            let mut needsend = false;

            if segment.xmit == 0 {
                needsend = true;
                segment.xmit += 1;
                segment.rto = rto;
                segment.resend_ts = current.wrapping_add(rto).wrapping_add(rtomin);
            } else if wrapping_diff(current, segment.resend_ts) >= 0 {
                needsend = true;
                segment.xmit += 1;
                self.xmit = self.xmit.wrapping_add(1);

                let backoff = if self.nodelay { rto / 2 } else { rto };
                segment.rto = segment.rto.saturating_add(backoff);
                segment.resend_ts = current.wrapping_add(segment.rto);

                lost = true;

                trace!(conv, sn = segment.sn, xmit = segment.xmit, rto = segment.rto, "timeout");
            } else if segment.fastack >= resent {
                needsend = true;
                segment.xmit += 1;
                segment.fastack = 0;
                segment.resend_ts = current.wrapping_add(segment.rto);

                change = true;

                trace!(conv, sn = segment.sn, xmit = segment.xmit, "fast resend");
            }

            if needsend {
                segment.ts = current;
                segment.wnd = wnd;
                segment.una = una;

                self.out
                    .make_room(HEADER_SIZE + segment.len(), &mut self.ctx, conv, user);
                serial::write_segment(&mut self.out.buffer, &segment.header(), &segment.data);

                if segment.xmit >= self.dead_link {
                    dead = true;
                }
            }
        }

        self.out.emit(&mut self.ctx, conv, user);

        if dead && self.state != State::Dead {
            warn!(conv, dead_link = self.dead_link, "link declared dead");
            self.state = State::Dead;
        }

        if change {
            self.cc
                .handle_fast_resend(self.tx.in_flight_count(), resent);
            debug!(
                conv,
                cwnd = self.cc.cwnd(),
                ssthresh = self.cc.ssthresh(),
                "fast resend"
            );
        }

        if lost {
            self.cc.handle_timeout(window);
            debug!(
                conv,
                cwnd = self.cc.cwnd(),
                ssthresh = self.cc.ssthresh(),
                "retransmission timeout"
            );
        }

        self.cc.floor();
    }

    /// Advances the clock to `current` (milliseconds, wrapping) and flushes if a flush is due.
    /// Returns true if a flush was performed.
    pub fn update(&mut self, current: u32) -> bool {
        self.current = current;

        if self.state == State::Uninitialized {
            self.state = State::Active;
            self.ts_flush = current;
        }

        let mut slap = wrapping_diff(current, self.ts_flush);

        if !(-FLUSH_RESYNC_MS..FLUSH_RESYNC_MS).contains(&slap) {
            self.ts_flush = current;
            slap = 0;
        }

        if slap >= 0 {
            self.ts_flush = self.ts_flush.wrapping_add(self.interval);

            if wrapping_diff(current, self.ts_flush) >= 0 {
                self.ts_flush = current.wrapping_add(self.interval);
            }

            self.flush();

            return true;
        }

        false
    }

    /// Returns the time at which `update` should next be called, assuming no input or sends in
    /// the meantime.
    pub fn check(&self, current: u32) -> u32 {
        if self.state == State::Uninitialized {
            return current;
        }

        let mut ts_flush = self.ts_flush;

        if !(-FLUSH_RESYNC_MS..FLUSH_RESYNC_MS).contains(&wrapping_diff(current, ts_flush)) {
            ts_flush = current;
        }

        if wrapping_diff(current, ts_flush) >= 0 {
            return current;
        }

        let tm_flush = wrapping_diff(ts_flush, current) as u32;
        let mut tm_packet = u32::MAX;

        for segment in self.tx.in_flight() {
            let diff = wrapping_diff(segment.resend_ts, current);

            if diff <= 0 {
                return current;
            }

            tm_packet = tm_packet.min(diff as u32);
        }

        let minimal = tm_packet.min(tm_flush).min(self.interval);

        current.wrapping_add(minimal)
    }

    /// Changes the MTU. An MTU of 24 bytes or less is rejected, since it leaves no room for
    /// payload after the segment header. On error, the endpoint is left unchanged.
    pub fn set_mtu(&mut self, mtu: usize) -> Result<(), ConfigError> {
        if mtu <= HEADER_SIZE {
            return Err(ConfigError::MtuTooSmall(mtu));
        }

        let mss = mtu - HEADER_SIZE;

        self.mtu = mtu;
        self.tx.set_mss(mss);
        self.cc.set_mss(mss);
        self.out = OutputBuffer::new(mtu);

        Ok(())
    }

    pub fn set_interval(&mut self, interval_ms: u32) {
        self.interval = interval_ms.clamp(INTERVAL_MIN_MS, INTERVAL_MAX_MS);
    }

    pub fn set_nodelay(
        &mut self,
        nodelay: bool,
        interval_ms: u32,
        fast_resend: u32,
        no_congestion_window: bool,
    ) {
        self.nodelay = nodelay;
        self.rtt
            .set_min_rto(if nodelay { RTO_NDL } else { RTO_MIN });

        self.set_interval(interval_ms);
        self.fast_resend = fast_resend;
        self.no_cwnd = no_congestion_window;
    }

    /// Sets the send and receive windows, in segments. Zero leaves a window unchanged; the
    /// receive window is clamped to [128, 65535].
    pub fn set_window(&mut self, snd_wnd: u32, rcv_wnd: u32) {
        if snd_wnd > 0 {
            self.snd_wnd = snd_wnd;
        }

        if rcv_wnd > 0 {
            self.rx
                .set_rcv_wnd(rcv_wnd.clamp(RECEIVE_WINDOW_DEFAULT, RECEIVE_WINDOW_MAX));
        }
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.tx.set_stream(stream);
    }

    /// Zero is ignored.
    pub fn set_dead_link(&mut self, dead_link: u32) {
        if dead_link > 0 {
            self.dead_link = dead_link;
        }
    }

    pub fn set_min_rto(&mut self, min_rto_ms: u32) {
        self.rtt.set_min_rto(min_rto_ms);
    }
}
