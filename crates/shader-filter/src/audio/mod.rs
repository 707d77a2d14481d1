pub mod device;
pub mod fft;
pub mod ring;

pub use fft::{FftTransform, WindowFunction};
pub use ring::SampleRing;

use std::sync::Mutex;

/// Frames the host delivers per audio callback and the row width of an
/// audio texture.
pub const AUDIO_OUTPUT_FRAMES: usize = 1024;

/// Maximum channel planes per audio packet.
pub const MAX_AUDIO_PLANES: usize = 8;

/// Receiver of sidechain audio, called on the audio thread.
pub trait AudioSink: Send + Sync {
    /// One packet of planar audio: `planes[c][..frames]` per channel. When
    /// `muted` is set the samples are treated as silence.
    fn capture(&self, planes: &[&[f32]], frames: usize, muted: bool);
}

/// Per-channel sample history written by the audio thread and read by the
/// render thread. Only the copy in and copy out happen under the lock.
#[derive(Debug)]
pub struct AudioCapture {
    channels: usize,
    rings: Mutex<Vec<SampleRing>>,
}

impl AudioCapture {
    /// `channels` is clamped to `1..=MAX_AUDIO_PLANES`.
    pub fn new(channels: usize, capacity: usize) -> Self {
        let channels = channels.clamp(1, MAX_AUDIO_PLANES);
        Self {
            channels,
            rings: Mutex::new((0..channels).map(|_| SampleRing::new(capacity)).collect()),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Copy the newest `frames` samples of every channel into `out`, one row
    /// per channel. `out` is resized to `channels * frames`; rows are
    /// zero-padded when `frames` exceeds the ring capacity.
    ///
    /// The rings keep their history; only [`AudioCapture::clear`] drops it.
    pub fn copy_out(&self, frames: usize, out: &mut Vec<f32>) {
        out.clear();
        out.resize(self.channels * frames, 0.0);
        if let Ok(rings) = self.rings.lock() {
            for (ring, row) in rings.iter().zip(out.chunks_exact_mut(frames.max(1))) {
                let n = frames.min(ring.capacity());
                row[..n].copy_from_slice(&ring.as_slice()[..n]);
            }
        }
    }

    /// Zero every channel.
    pub fn clear(&self) {
        if let Ok(mut rings) = self.rings.lock() {
            rings.iter_mut().for_each(SampleRing::clear);
        }
    }
}

impl AudioSink for AudioCapture {
    fn capture(&self, planes: &[&[f32]], frames: usize, muted: bool) {
        if frames == 0 {
            return;
        }
        let Ok(mut rings) = self.rings.lock() else {
            return;
        };
        for (ch, ring) in rings.iter_mut().enumerate() {
            match planes.get(ch) {
                Some(plane) if !muted => ring.insert(&plane[..frames.min(plane.len())]),
                _ => ring.insert_silence(frames),
            }
        }
    }
}
