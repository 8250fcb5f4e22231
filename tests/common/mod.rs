use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kcp_engine::{Config, Endpoint, HostContext};

pub const CONV: u32 = 0x11223344;

#[ctor::ctor]
fn init_test_logging() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

struct DelayedPacket {
    deliver_ms: u32,
    data: Box<[u8]>,
}

/// A virtual link between peer 0 and peer 1, with a virtual clock. Each direction drops packets
/// at random and delays the rest by a random one-way latency. Delivery within a direction is
/// FIFO.
pub struct LatencySimulator {
    current: u32,
    // Percent, per direction
    lost_rate: u32,
    // One-way delay bounds
    delay_min: u32,
    delay_max: u32,
    queue_max: usize,

    p01: VecDeque<DelayedPacket>,
    p10: VecDeque<DelayedPacket>,

    rng: StdRng,

    tx: [usize; 2],
    dropped: [usize; 2],
}

impl LatencySimulator {
    /// `lost_rate` is the round trip loss in percent; `rtt_min` and `rtt_max` bound the round
    /// trip time in milliseconds.
    pub fn new(seed: u64, start_ms: u32, lost_rate: u32, rtt_min: u32, rtt_max: u32) -> Self {
        Self {
            current: start_ms,
            lost_rate: lost_rate / 2,
            delay_min: rtt_min / 2,
            delay_max: rtt_max / 2,
            queue_max: 1000,

            p01: VecDeque::new(),
            p10: VecDeque::new(),

            rng: StdRng::seed_from_u64(seed),

            tx: [0; 2],
            dropped: [0; 2],
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn advance(&mut self, ms: u32) {
        self.current = self.current.wrapping_add(ms);
    }

    /// Number of packets sent by `peer`, including dropped ones.
    pub fn tx(&self, peer: usize) -> usize {
        self.tx[peer]
    }

    pub fn dropped(&self, peer: usize) -> usize {
        self.dropped[peer]
    }

    /// Sends a packet from `peer` to the other side.
    pub fn send(&mut self, peer: usize, data: &[u8]) {
        self.tx[peer] += 1;

        if self.rng.gen_range(0..100) < self.lost_rate {
            self.dropped[peer] += 1;
            return;
        }

        let queue = if peer == 0 { &self.p01 } else { &self.p10 };

        if queue.len() >= self.queue_max {
            self.dropped[peer] += 1;
            return;
        }

        let mut delay = self.delay_min;
        if self.delay_max > self.delay_min {
            delay += self.rng.gen_range(0..self.delay_max - self.delay_min);
        }

        let packet = DelayedPacket {
            deliver_ms: self.current.wrapping_add(delay),
            data: data.into(),
        };

        if peer == 0 {
            self.p01.push_back(packet);
        } else {
            self.p10.push_back(packet);
        }
    }

    /// Receives the next packet addressed to `peer`, if one has arrived.
    pub fn recv(&mut self, peer: usize) -> Option<Box<[u8]>> {
        let current = self.current;

        let queue = if peer == 0 {
            &mut self.p10
        } else {
            &mut self.p01
        };

        let front = queue.front()?;

        if (current.wrapping_sub(front.deliver_ms) as i32) < 0 {
            return None;
        }

        queue.pop_front().map(|packet| packet.data)
    }
}

pub type VnetRef = Rc<RefCell<LatencySimulator>>;

/// Host context which sends frames into a [`LatencySimulator`] as `user`.
pub struct VnetContext {
    vnet: VnetRef,
}

impl HostContext for VnetContext {
    fn send_frame(&mut self, frame_bytes: &[u8], user: u64) -> i32 {
        self.vnet.borrow_mut().send(user as usize, frame_bytes);
        0
    }
}

/// Creates the endpoint for `peer` (0 or 1) on `vnet`.
pub fn vnet_endpoint(vnet: &VnetRef, peer: usize, config: Config) -> Endpoint<VnetContext> {
    let ctx = VnetContext {
        vnet: Rc::clone(vnet),
    };

    Endpoint::with_config(CONV, peer as u64, ctx, config).unwrap()
}

/// Moves every arrived packet into its endpoint.
pub fn pump(vnet: &VnetRef, e0: &mut Endpoint<VnetContext>, e1: &mut Endpoint<VnetContext>) {
    loop {
        let packet = vnet.borrow_mut().recv(1);
        match packet {
            Some(packet) => e1.input(&packet).unwrap(),
            None => break,
        }
    }

    loop {
        let packet = vnet.borrow_mut().recv(0);
        match packet {
            Some(packet) => e0.input(&packet).unwrap(),
            None => break,
        }
    }
}
