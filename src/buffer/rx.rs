use std::collections::VecDeque;

use super::Segment;
use crate::error::RecvError;
use crate::wrapping_diff;

//   rcv_nxt                rcv_nxt+rcv_wnd
//   v                      v
// --____#_##__#____________--------> sn
//
// #: buffered out of order, waiting for the gaps below to fill
//
// Once the segment at rcv_nxt arrives, it and every contiguous successor move to the receive
// queue, where messages are reassembled from their fragments.

#[derive(Debug)]
pub struct RxBuffer {
    // Out of order segments in [rcv_nxt, rcv_nxt + rcv_wnd), ordered by sn
    buf: VecDeque<Segment>,
    // In order segments awaiting reassembly
    queue: VecDeque<Segment>,

    rcv_nxt: u32,
    rcv_wnd: u32,
}

impl RxBuffer {
    pub fn new(rcv_wnd: u32) -> Self {
        Self::starting_at(0, rcv_wnd)
    }

    fn starting_at(sn: u32, rcv_wnd: u32) -> Self {
        assert!(rcv_wnd > 0);

        Self {
            buf: VecDeque::new(),
            queue: VecDeque::new(),
            rcv_nxt: sn,
            rcv_wnd,
        }
    }

    pub fn rcv_nxt(&self) -> u32 {
        self.rcv_nxt
    }

    pub fn rcv_wnd(&self) -> u32 {
        self.rcv_wnd
    }

    pub fn set_rcv_wnd(&mut self, rcv_wnd: u32) {
        assert!(rcv_wnd > 0);
        self.rcv_wnd = rcv_wnd;
    }

    /// Free slots in the receive queue, as advertised to the peer.
    pub fn wnd_unused(&self) -> u32 {
        (self.rcv_wnd as usize).saturating_sub(self.queue.len()) as u32
    }

    /// Whether the receive queue has reached the receive window.
    pub fn is_queue_full(&self) -> bool {
        self.queue.len() >= self.rcv_wnd as usize
    }

    /// Returns true if `sn` lies in the receive window.
    pub fn accepts(&self, sn: u32) -> bool {
        wrapping_diff(sn, self.rcv_nxt) >= 0
            && wrapping_diff(sn, self.rcv_nxt.wrapping_add(self.rcv_wnd)) < 0
    }

    /// Buffers a received data segment. Returns false if the segment was outside the receive
    /// window or a duplicate.
    pub fn parse_data(&mut self, segment: Segment) -> bool {
        if !self.accepts(segment.sn) {
            return false;
        }

        let sn = segment.sn;

        let inserted = match self
            .buf
            .binary_search_by(|probe| wrapping_diff(probe.sn, sn).cmp(&0))
        {
            Ok(_) => false,
            Err(idx) => {
                self.buf.insert(idx, segment);
                true
            }
        };

        self.promote();

        inserted
    }

    /// Moves contiguous segments starting at `rcv_nxt` into the receive queue, as long as the
    /// queue has room.
    pub fn promote(&mut self) {
        while let Some(segment) = self.buf.front() {
            if segment.sn != self.rcv_nxt || self.is_queue_full() {
                break;
            }

            if let Some(segment) = self.buf.pop_front() {
                self.queue.push_back(segment);
                self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
            }
        }
    }

    /// Size of the next complete message, or `None` if no complete message is queued.
    pub fn peek_size(&self) -> Option<usize> {
        let front = self.queue.front()?;

        if front.frg == 0 {
            return Some(front.len());
        }

        if self.queue.len() < front.frg as usize + 1 {
            return None;
        }

        let mut size = 0;

        for segment in self.queue.iter() {
            size += segment.len();

            if segment.frg == 0 {
                break;
            }
        }

        Some(size)
    }

    fn check_complete(&self, capacity: usize) -> Result<usize, RecvError> {
        if self.queue.is_empty() {
            return Err(RecvError::Empty);
        }

        let size = self.peek_size().ok_or(RecvError::Incomplete)?;

        if size > capacity {
            return Err(RecvError::BufferTooSmall {
                required: size,
                capacity,
            });
        }

        Ok(size)
    }

    /// Copies the next complete message into `buf` without consuming it.
    pub fn peek(&self, buf: &mut [u8]) -> Result<usize, RecvError> {
        let size = self.check_complete(buf.len())?;

        let mut offset = 0;

        for segment in self.queue.iter() {
            buf[offset..offset + segment.len()].copy_from_slice(&segment.data);
            offset += segment.len();

            if segment.frg == 0 {
                break;
            }
        }

        debug_assert_eq!(offset, size);

        Ok(size)
    }

    /// Removes the next complete message from the queue, copying it into `buf`.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, RecvError> {
        let size = self.check_complete(buf.len())?;

        let mut offset = 0;

        while let Some(segment) = self.queue.pop_front() {
            buf[offset..offset + segment.len()].copy_from_slice(&segment.data);
            offset += segment.len();

            if segment.frg == 0 {
                break;
            }
        }

        debug_assert_eq!(offset, size);

        // Room may have opened up for segments that were held back
        self.promote();

        Ok(size)
    }
}
