/// Acknowledgements owed to the peer, as (sn, ts) pairs in arrival order.
#[derive(Debug, Default)]
pub struct AckList {
    entries: Vec<(u32, u32)>,
}

impl AckList {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(8),
        }
    }

    pub fn push(&mut self, sn: u32, ts: u32) {
        self.entries.push((sn, ts));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.drain(..)
    }
}
