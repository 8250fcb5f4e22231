use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use super::Segment;
use crate::error::SendError;
use crate::wrapping_diff;

// frg is a single byte on the wire
const FRAGMENT_COUNT_MAX: usize = 256;

//   snd_una         snd_nxt         snd_una+window
//   v               v               v
// --################________________--------> sn
//
// #: in flight, awaiting acknowledgement
// _: usable window, filled from the queue

#[derive(Debug)]
pub struct TxBuffer {
    // Segments which have not been assigned a sequence number yet
    queue: VecDeque<Segment>,
    // Segments in [snd_una, snd_nxt), ordered by sn
    flight: VecDeque<Segment>,

    snd_una: u32,
    snd_nxt: u32,

    mss: usize,
    stream: bool,
}

impl TxBuffer {
    pub fn new(mss: usize) -> Self {
        Self::starting_at(0, mss)
    }

    fn starting_at(sn: u32, mss: usize) -> Self {
        assert!(mss > 0);

        Self {
            queue: VecDeque::new(),
            flight: VecDeque::new(),
            snd_una: sn,
            snd_nxt: sn,
            mss,
            stream: false,
        }
    }

    pub fn set_mss(&mut self, mss: usize) {
        assert!(mss > 0);
        self.mss = mss;
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.stream = stream;
    }

    pub fn snd_una(&self) -> u32 {
        self.snd_una
    }

    #[cfg(test)]
    pub fn snd_nxt(&self) -> u32 {
        self.snd_nxt
    }

    /// Number of sequence numbers assigned but not yet cumulatively acknowledged.
    pub fn in_flight_count(&self) -> u32 {
        self.snd_nxt.wrapping_sub(self.snd_una)
    }

    /// Segments queued plus segments in flight.
    pub fn wait_snd(&self) -> usize {
        self.queue.len() + self.flight.len()
    }

    /// Splits `data` into segments of at most one MSS and appends them to the queue.
    ///
    /// In stream mode, the last queued segment is topped up first and every fragment is
    /// numbered 0, so message boundaries are not preserved.
    pub fn push(&mut self, data: &[u8], rcv_wnd: u32) -> Result<(), SendError> {
        if data.is_empty() {
            return Err(SendError::Empty);
        }

        let mut data = data;

        if self.stream {
            if let Some(last) = self.queue.back_mut() {
                if last.len() < self.mss {
                    let extend = (self.mss - last.len()).min(data.len());

                    let mut merged = BytesMut::with_capacity(last.len() + extend);
                    merged.extend_from_slice(&last.data);
                    merged.extend_from_slice(&data[..extend]);

                    last.data = merged.freeze();
                    last.frg = 0;

                    data = &data[extend..];
                }
            }

            if data.is_empty() {
                return Ok(());
            }
        }

        let count = (data.len() + self.mss - 1) / self.mss;
        let limit = (rcv_wnd as usize).min(FRAGMENT_COUNT_MAX);

        if count >= limit {
            return Err(SendError::TooManyFragments { count, limit });
        }

        for (idx, chunk) in data.chunks(self.mss).enumerate() {
            let frg = if self.stream {
                0
            } else {
                (count - idx - 1) as u8
            };

            self.queue
                .push_back(Segment::new(frg, Bytes::copy_from_slice(chunk)));
        }

        Ok(())
    }

    /// Moves queued segments into flight while `snd_nxt < snd_una + window`, assigning each the
    /// next sequence number. `stamp` fills in the remaining header fields.
    pub fn fill_window<F>(&mut self, window: u32, mut stamp: F) -> u32
    where
        F: FnMut(&mut Segment),
    {
        let mut moved = 0;

        while wrapping_diff(self.snd_nxt, self.snd_una.wrapping_add(window)) < 0 {
            let Some(mut segment) = self.queue.pop_front() else {
                break;
            };

            segment.sn = self.snd_nxt;
            self.snd_nxt = self.snd_nxt.wrapping_add(1);

            stamp(&mut segment);

            self.flight.push_back(segment);
            moved += 1;
        }

        moved
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &Segment> {
        self.flight.iter()
    }

    pub fn in_flight_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.flight.iter_mut()
    }

    /// Recomputes `snd_una` from the oldest segment still in flight.
    pub fn shrink(&mut self) {
        self.snd_una = match self.flight.front() {
            Some(segment) => segment.sn,
            None => self.snd_nxt,
        };
    }

    fn in_send_range(&self, sn: u32) -> bool {
        wrapping_diff(sn, self.snd_una) >= 0 && wrapping_diff(sn, self.snd_nxt) < 0
    }

    /// Removes the in-flight segment with sequence number `sn`, if any.
    pub fn parse_ack(&mut self, sn: u32) {
        if !self.in_send_range(sn) {
            // Stale or from the future
            return;
        }

        for idx in 0..self.flight.len() {
            let segment_sn = self.flight[idx].sn;

            if segment_sn == sn {
                self.flight.remove(idx);
                break;
            }

            if wrapping_diff(sn, segment_sn) < 0 {
                break;
            }
        }
    }

    /// Removes every in-flight segment below `una`.
    pub fn parse_una(&mut self, una: u32) {
        while let Some(segment) = self.flight.front() {
            if wrapping_diff(una, segment.sn) > 0 {
                self.flight.pop_front();
            } else {
                break;
            }
        }
    }

    /// Counts a skip for every in-flight segment older than `sn`.
    pub fn parse_fastack(&mut self, sn: u32) {
        if !self.in_send_range(sn) {
            return;
        }

        for segment in self.flight.iter_mut() {
            if wrapping_diff(sn, segment.sn) < 0 {
                break;
            } else if sn != segment.sn {
                segment.fastack += 1;
            }
        }
    }
}
