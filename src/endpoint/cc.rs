// Window-based congestion control, counted in segments. `incr` shadows the window in bytes so that
// congestion avoidance can grow cwnd by a fraction of a segment per acknowledgement.

const THRESH_INIT: u32 = 2;
const THRESH_MIN: u32 = 2;

#[derive(Debug)]
pub struct Congestion {
    cwnd: u32,
    ssthresh: u32,
    incr: u64,
    mss: u64,
}

impl Congestion {
    pub fn new(mss: usize) -> Self {
        assert!(mss > 0);

        Self {
            cwnd: 1,
            ssthresh: THRESH_INIT,
            incr: mss as u64,
            mss: mss as u64,
        }
    }

    pub fn set_mss(&mut self, mss: usize) {
        assert!(mss > 0);
        self.mss = mss as u64;
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    /// Called once per input packet that advanced `snd_una`.
    pub fn handle_ack(&mut self, rmt_wnd: u32) {
        if self.cwnd >= rmt_wnd {
            return;
        }

        let mss = self.mss;

        if self.cwnd < self.ssthresh {
            // Slow start, one segment per ack
            self.cwnd += 1;
            self.incr += mss;
        } else {
            // Congestion avoidance, roughly one segment per window of acks
            self.incr = self.incr.max(mss);
            self.incr += mss * mss / self.incr + mss / 16;

            if (self.cwnd as u64 + 1) * mss <= self.incr {
                self.cwnd += 1;
            }
        }

        if self.cwnd > rmt_wnd {
            self.cwnd = rmt_wnd;
            self.incr = rmt_wnd as u64 * mss;
        }
    }

    /// Called after a flush that performed at least one fast retransmission.
    pub fn handle_fast_resend(&mut self, inflight: u32, resent: u32) {
        self.ssthresh = (inflight / 2).max(THRESH_MIN);
        self.cwnd = self.ssthresh.saturating_add(resent);
        self.incr = self.cwnd as u64 * self.mss;
    }

    /// Called after a flush that retransmitted at least one segment on timeout.
    pub fn handle_timeout(&mut self, window: u32) {
        self.ssthresh = (window / 2).max(THRESH_MIN);
        self.cwnd = 1;
        self.incr = self.mss;
    }

    pub fn floor(&mut self) {
        if self.cwnd < 1 {
            self.cwnd = 1;
            self.incr = self.mss;
        }
    }
}
