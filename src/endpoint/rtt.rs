pub const RTO_NDL: u32 = 30;
pub const RTO_MIN: u32 = 100;
pub const RTO_DEF: u32 = 200;
pub const RTO_MAX: u32 = 60000;

/// Smoothed round trip time and retransmission timeout, in milliseconds.
#[derive(Debug)]
pub struct RttEstimator {
    srtt: u32,
    rttval: u32,
    rto: u32,
    min_rto: u32,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self {
            srtt: 0,
            rttval: 0,
            rto: RTO_DEF,
            min_rto: RTO_MIN,
        }
    }

    pub fn srtt(&self) -> u32 {
        self.srtt
    }

    pub fn rttval(&self) -> u32 {
        self.rttval
    }

    pub fn rto(&self) -> u32 {
        self.rto
    }

    pub fn min_rto(&self) -> u32 {
        self.min_rto
    }

    pub fn set_min_rto(&mut self, min_rto: u32) {
        self.min_rto = min_rto;
    }

    pub fn update(&mut self, rtt: u32, interval: u32) {
        if self.srtt == 0 {
            self.srtt = rtt;
            self.rttval = rtt / 2;
        } else {
            let delta = rtt.abs_diff(self.srtt);

            self.rttval = ((3 * self.rttval as u64 + delta as u64) / 4) as u32;
            self.srtt = ((7 * self.srtt as u64 + rtt as u64) / 8).max(1) as u32;
        }

        let rto = self
            .srtt
            .saturating_add(interval.max(self.rttval.saturating_mul(4)));

        self.rto = rto.clamp(self.min_rto, RTO_MAX);
    }
}
