//! External DSP stages run on the dry mix.

use core::f32::consts::TAU;

/// A stage that processes the interleaved stereo `i32` mix in place, after
/// all voices are mixed and before global volume.
pub trait MixHook: Send {
    /// Called when the output rate is known and again on restart.
    fn init(&mut self, _sample_rate: u32) {}
    fn process(&mut self, mix: &mut [i32]);
    /// Drop any internal history.
    fn reset(&mut self) {}
}

const DEFAULT_CUTOFF: u32 = 4410;

/// Amiga-style one-pole RC low-pass: `y = y_prev + alpha * (x - y_prev)`.
pub struct AmigaLowPass {
    prev: [i32; 2],
    /// Q16
    alpha: i64,
    cutoff_hz: u32,
    sample_rate: u32,
}

impl AmigaLowPass {
    pub fn new() -> Self {
        Self::with_cutoff(DEFAULT_CUTOFF)
    }

    pub fn with_cutoff(cutoff_hz: u32) -> Self {
        let mut filter = Self {
            prev: [0; 2],
            alpha: 0,
            cutoff_hz: cutoff_hz.clamp(1000, 22050),
            sample_rate: 44100,
        };
        filter.recompute_alpha();
        filter
    }

    fn recompute_alpha(&mut self) {
        let alpha = TAU * self.cutoff_hz as f32 / self.sample_rate as f32;
        self.alpha = ((alpha.min(1.0) * 65536.0) as i64).max(1);
    }
}

impl Default for AmigaLowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl MixHook for AmigaLowPass {
    fn init(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.recompute_alpha();
    }

    fn process(&mut self, mix: &mut [i32]) {
        let alpha = self.alpha;
        let [mut l, mut r] = self.prev;
        for pair in mix.chunks_exact_mut(2) {
            l += ((alpha * (pair[0] as i64 - l as i64)) >> 16) as i32;
            r += ((alpha * (pair[1] as i64 - r as i64)) >> 16) as i32;
            pair[0] = l;
            pair[1] = r;
        }
        self.prev = [l, r];
    }

    fn reset(&mut self) {
        self.prev = [0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AmigaLowPass {
        let mut f = AmigaLowPass::new();
        f.init(44100);
        f
    }

    #[test]
    fn attenuates_high_frequency_content() {
        let mut f = filter();
        let mut buf: Vec<i32> = (0..200)
            .flat_map(|i| {
                let v = if i % 2 == 0 { 1 << 20 } else { -(1 << 20) };
                [v, v]
            })
            .collect();
        f.process(&mut buf);
        let peak = buf.iter().map(|s| s.abs()).max().unwrap_or(0);
        assert!(peak < (1 << 20) * 95 / 100, "peak should be attenuated, got {}", peak);
    }

    #[test]
    fn passes_dc() {
        let mut f = filter();
        let mut buf = vec![1 << 20; 400];
        f.process(&mut buf);
        let last = buf[buf.len() - 2];
        assert!((last - (1 << 20)).abs() < 1 << 12, "DC should pass through, got {}", last);
    }

    #[test]
    fn reset_clears_history() {
        let mut f = filter();
        f.process(&mut [1 << 20; 20]);
        assert_ne!(f.prev, [0, 0]);
        f.reset();
        assert_eq!(f.prev, [0, 0]);
    }
}
