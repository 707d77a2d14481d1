/// Fixed-capacity sample history for one audio channel, newest first.
///
/// Index 0 always holds the first sample of the most recent insert; older
/// samples move toward the end and fall off once capacity is reached.
#[derive(Debug, Clone)]
pub struct SampleRing {
    data: Vec<f32>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Insert `samples` at the front. Inserts at least as long as the ring
    /// replace its entire contents with their first `capacity` samples.
    pub fn insert(&mut self, samples: &[f32]) {
        let cap = self.data.len();
        let n = samples.len();
        if n == 0 || cap == 0 {
            return;
        }
        if n >= cap {
            self.data.copy_from_slice(&samples[..cap]);
        } else {
            self.data.copy_within(..cap - n, n);
            self.data[..n].copy_from_slice(samples);
        }
    }

    /// Insert `count` zero samples at the front.
    pub fn insert_silence(&mut self, count: usize) {
        let cap = self.data.len();
        let n = count.min(cap);
        if n == 0 {
            return;
        }
        if n < cap {
            self.data.copy_within(..cap - n, n);
        }
        self.data[..n].fill(0.0);
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}
