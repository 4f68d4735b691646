//! Silence gate for inbound client audio.
//!
//! Frames that are mostly digital silence are dropped before they reach the
//! realtime session. Accepted frames are packed as PCM16 little-endian.

use bytes::{BufMut, Bytes, BytesMut};

/// Default maximum fraction of zero samples a frame may contain.
pub const DEFAULT_SILENCE_THRESHOLD: f64 = 0.8;

/// Stateless filter that rejects near-silent frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioGate {
    max_zero_fraction: f64,
}

impl Default for AudioGate {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_THRESHOLD)
    }
}

impl AudioGate {
    /// Create a gate. The threshold is clamped to `[0, 1]`.
    pub fn new(max_zero_fraction: f64) -> Self {
        Self {
            max_zero_fraction: max_zero_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.max_zero_fraction
    }

    /// Fraction of samples that are exactly zero. An empty frame counts as
    /// fully silent.
    pub fn zero_fraction(samples: &[i16]) -> f64 {
        if samples.is_empty() {
            return 1.0;
        }
        count_zeros(samples) as f64 / samples.len() as f64
    }

    /// Whether a frame passes the gate.
    pub fn accepts(&self, samples: &[i16]) -> bool {
        if samples.is_empty() {
            return false;
        }
        let zeros = count_zeros(samples);
        if self.max_zero_fraction == DEFAULT_SILENCE_THRESHOLD {
            // zeros / len <= 4 / 5, without rounding
            return zeros * 5 <= samples.len() * 4;
        }
        zeros as f64 <= self.max_zero_fraction * samples.len() as f64
    }

    /// Pack an accepted frame as little-endian PCM16, or `None` if rejected.
    pub fn gate(&self, samples: &[i16]) -> Option<Bytes> {
        if !self.accepts(samples) {
            return None;
        }
        Some(pack_pcm16_le(samples))
    }
}

fn count_zeros(samples: &[i16]) -> usize {
    samples.iter().filter(|&&s| s == 0).count()
}

/// Pack samples as little-endian PCM16, two bytes per sample, original order.
pub fn pack_pcm16_le(samples: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        buf.put_i16_le(sample);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mostly_silent_frame() {
        let gate = AudioGate::default();
        let frame = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert!((AudioGate::zero_fraction(&frame) - 0.9).abs() < f64::EPSILON);
        assert!(gate.gate(&frame).is_none());
    }

    #[test]
    fn test_accepts_at_threshold() {
        let gate = AudioGate::default();
        // 8 of 10 samples are zero: exactly at the threshold
        let frame = [0, 0, 0, 0, 0, 0, 0, 0, 5, -5];
        let packed = gate.gate(&frame).expect("frame at threshold passes");
        assert_eq!(packed.len(), 20);
    }

    #[test]
    fn test_default_threshold_boundary_is_exact() {
        let gate = AudioGate::default();
        for len in [5usize, 15, 35, 1_005, 99_995, 1_000_000] {
            let zeros = len * 4 / 5;
            let mut frame = vec![7i16; len];
            frame[..zeros].fill(0);
            assert!(gate.accepts(&frame), "{zeros} of {len} zero");

            frame[zeros] = 0;
            assert!(!gate.accepts(&frame), "{} of {len} zero", zeros + 1);
        }
    }

    #[test]
    fn test_configured_threshold_boundary() {
        let gate = AudioGate::new(0.7);
        let mut frame = [3i16; 10];
        frame[..7].fill(0);
        assert!(gate.accepts(&frame));
        frame[7] = 0;
        assert!(!gate.accepts(&frame));
    }

    #[test]
    fn test_packs_little_endian_in_order() {
        let gate = AudioGate::default();
        let packed = gate.gate(&[1, -2, 0x1234]).unwrap();
        assert_eq!(&packed[..], &[0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
    }

    #[test]
    fn test_rejects_empty_frame() {
        assert!(AudioGate::default().gate(&[]).is_none());
        assert!(!AudioGate::new(1.0).accepts(&[]));
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(AudioGate::new(1.5).threshold(), 1.0);
        assert_eq!(AudioGate::new(-0.5).threshold(), 0.0);
        assert!(AudioGate::new(1.0).gate(&[0, 0, 0]).is_some());
        assert!(AudioGate::new(0.0).gate(&[0, 1]).is_none());
    }
}
