//! Per-voice resonant filter: a two-pole IIR with 24-bit fixed-point
//! coefficients.

use core::f64::consts::PI;

use tm_ir::FilterMode;

/// Fraction bits of the filter coefficients.
const FILTER_PRECISION: u32 = 24;

/// History and output are clamped to twice the 16-bit range.
const HISTORY_MIN: i32 = -(1 << 16);
const HISTORY_MAX: i32 = (1 << 16) - 1;

/// Cutoff and resonance range of the filter effects.
pub const FILTER_MAX: u8 = 127;

/// Filter envelope modulation range (-256..=256, 0 = none).
pub const FILTER_ENV_RANGE: i32 = 256;

/// Modifier an unmodulated filter runs at.
const NEUTRAL_MODIFIER: i32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterCoefs {
    a0: i64,
    b0: i64,
    b1: i64,
    /// All ones for high-pass, zero for low-pass
    hp_mask: i32,
}

/// Filter history for both channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    y1: [i32; 2],
    y2: [i32; 2],
}

impl FilterState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Cutoff frequency in Hz for a cutoff value (0-127) and envelope modifier.
pub fn cutoff_to_frequency(cutoff: u8, env_mod: i32, sample_rate: u32) -> f64 {
    let m = env_mod.clamp(-FILTER_ENV_RANGE, FILTER_ENV_RANGE) + NEUTRAL_MODIFIER + 256;
    let exponent = 0.25 + (cutoff.min(FILTER_MAX) as f64 * m as f64) / (24.0 * 512.0);
    let freq = (110.0 * libm::pow(2.0, exponent)).clamp(120.0, 20000.0);
    freq.min(sample_rate as f64 / 2.0)
}

impl FilterCoefs {
    /// Coefficients for the given settings, or `None` when the filter is
    /// fully open and can be bypassed.
    pub fn compute(
        cutoff: u8,
        resonance: u8,
        env_mod: i32,
        mode: FilterMode,
        sample_rate: u32,
    ) -> Option<Self> {
        if cutoff >= FILTER_MAX && resonance == 0 && env_mod >= 0 && mode == FilterMode::LowPass {
            return None;
        }
        let rate = sample_rate.max(1) as f64;
        let freq = cutoff_to_frequency(cutoff, env_mod, sample_rate);
        let damping = libm::pow(10.0, -(resonance.min(FILTER_MAX) as f64) * (24.0 / 128.0) / 20.0);

        let fc = freq * 2.0 * PI / rate;
        let d = ((1.0 - 2.0 * damping) * fc).min(2.0);
        let d = (2.0 * damping - d) / fc;
        let e = 1.0 / (fc * fc);

        let fg = 1.0 / (1.0 + d + e);
        let fb0 = (d + e + e) / (1.0 + d + e);
        let fb1 = -e / (1.0 + d + e);

        let (a0, hp_mask) = match mode {
            FilterMode::LowPass => (fg, 0),
            FilterMode::HighPass => (1.0 - fg, -1),
        };
        Some(Self {
            a0: to_fixed(a0),
            b0: to_fixed(fb0),
            b1: to_fixed(fb1),
            hp_mask,
        })
    }

    /// Filter one value of channel `ch`.
    #[inline(always)]
    pub fn process(&self, state: &mut FilterState, ch: usize, x: i32) -> i32 {
        let y1 = state.y1[ch].clamp(HISTORY_MIN, HISTORY_MAX) as i64;
        let y2 = state.y2[ch].clamp(HISTORY_MIN, HISTORY_MAX) as i64;
        let acc = x as i64 * self.a0 + y1 * self.b0 + y2 * self.b1 + (1 << (FILTER_PRECISION - 1));
        let y = (acc >> FILTER_PRECISION).clamp(HISTORY_MIN as i64, HISTORY_MAX as i64) as i32;
        state.y2[ch] = state.y1[ch];
        state.y1[ch] = y - (x & self.hp_mask);
        y
    }
}

fn to_fixed(v: f64) -> i64 {
    libm::round(v * (1u32 << FILTER_PRECISION) as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(coefs: &FilterCoefs, input: i32, frames: usize) -> i32 {
        let mut state = FilterState::default();
        let mut y = 0;
        for _ in 0..frames {
            y = coefs.process(&mut state, 0, input);
        }
        y
    }

    #[test]
    fn open_filter_is_bypassed() {
        assert!(FilterCoefs::compute(127, 0, 0, FilterMode::LowPass, 44100).is_none());
        assert!(FilterCoefs::compute(127, 10, 0, FilterMode::LowPass, 44100).is_some());
        assert!(FilterCoefs::compute(127, 0, -100, FilterMode::LowPass, 44100).is_some());
    }

    #[test]
    fn low_pass_passes_dc() {
        let coefs = FilterCoefs::compute(64, 0, 0, FilterMode::LowPass, 44100).unwrap();
        let y = settle(&coefs, 10000, 4000);
        assert!((y - 10000).abs() < 50, "{}", y);
    }

    #[test]
    fn high_pass_blocks_dc() {
        let coefs = FilterCoefs::compute(64, 0, 0, FilterMode::HighPass, 44100).unwrap();
        let y = settle(&coefs, 10000, 4000);
        assert!(y.abs() < 50, "{}", y);
    }

    #[test]
    fn history_stays_bounded_with_full_resonance() {
        let coefs = FilterCoefs::compute(40, 127, 0, FilterMode::LowPass, 44100).unwrap();
        let mut state = FilterState::default();
        for i in 0..10_000 {
            let x = if (i / 50) % 2 == 0 { 32767 } else { -32768 };
            coefs.process(&mut state, 1, x);
            assert!(state.y1[1].abs() <= 1 << 18);
        }
    }

    #[test]
    fn output_is_clamped_with_full_resonance() {
        let coefs = FilterCoefs::compute(60, 127, 0, FilterMode::LowPass, 44100).unwrap();
        let mut state = FilterState::default();
        for i in 0..10_000 {
            let x = if (i / 37) % 2 == 0 { 32767 } else { -32768 };
            let y = coefs.process(&mut state, 0, x);
            assert!((HISTORY_MIN..=HISTORY_MAX).contains(&y), "{}", y);
        }
    }

    #[test]
    fn cutoff_frequency_range() {
        assert!((cutoff_to_frequency(0, 0, 44100) - 130.8).abs() < 0.1);
        assert!(cutoff_to_frequency(127, 0, 44100) > 5000.0);
        assert_eq!(cutoff_to_frequency(127, 256, 8000), 4000.0);
        assert_eq!(cutoff_to_frequency(127, 256, 96000), 20000.0);
        assert!(cutoff_to_frequency(100, -256, 44100) < cutoff_to_frequency(100, 0, 44100));
    }
}
