use bitflags::bitflags;

const PROBE_INIT: u32 = 7000;
const PROBE_LIMIT: u32 = 120000;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ProbeFlags: u8 {
        // Send a window ask on the next flush
        const ASK_SEND = 0b01;
        // Send a window tell on the next flush
        const ASK_TELL = 0b10;
    }
}

/// Zero-window probing: while the peer advertises no space, periodically ask it to re-advertise,
/// backing off up to a limit.
#[derive(Debug, Default)]
pub struct WindowProbe {
    flags: ProbeFlags,
    ts_probe: u32,
    probe_wait: u32,
}

impl WindowProbe {
    pub fn new() -> Self {
        Default::default()
    }

    #[cfg(test)]
    pub fn flags(&self) -> ProbeFlags {
        self.flags
    }

    pub fn probe_wait(&self) -> u32 {
        self.probe_wait
    }

    pub fn request_tell(&mut self) {
        self.flags |= ProbeFlags::ASK_TELL;
    }

    /// Returns the pending probe commands, clearing them.
    pub fn take(&mut self) -> ProbeFlags {
        std::mem::take(&mut self.flags)
    }

    /// Advances the probe timer. Returns true if a window ask was scheduled.
    pub fn update(&mut self, rmt_wnd: u32, current: u32) -> bool {
        if rmt_wnd != 0 {
            self.ts_probe = 0;
            self.probe_wait = 0;
            return false;
        }

        if self.probe_wait == 0 {
            self.probe_wait = PROBE_INIT;
            self.ts_probe = current.wrapping_add(self.probe_wait);
            return false;
        }

        if crate::wrapping_diff(current, self.ts_probe) < 0 {
            return false;
        }

        self.probe_wait = self.probe_wait.max(PROBE_INIT);
        self.probe_wait = (self.probe_wait + self.probe_wait / 2).min(PROBE_LIMIT);
        self.ts_probe = current.wrapping_add(self.probe_wait);
        self.flags |= ProbeFlags::ASK_SEND;

        true
    }
}
