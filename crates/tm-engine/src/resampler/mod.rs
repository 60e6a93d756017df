//! Interpolation kernels.
//!
//! Every kernel reads a small neighbourhood around `src[idx]`: at most
//! `PRE` frames before and `POST` frames after. Callers guarantee those
//! frames exist (sample padding or a loop window).

mod tables;

pub use tables::{PolyphaseTable, SplineTable, PHASES, PHASE_SHIFT, POLYPHASE_TAPS};

use tm_ir::PcmFrame;

use crate::settings::{InterpolationKind, MixerSettings};
use tables::{POLYPHASE_QUANT_BITS, SPLINE_QUANT_BITS};

/// Frames read before the current one by the widest kernel.
pub const PRE: usize = 3;

/// Frames read after the current one by the widest kernel.
pub const POST: usize = 4;

/// Increments above this use the 1.3x anti-alias sinc table.
const DOWNSAMPLE_13X: u32 = 0x130CC;

/// Increments above this use the 2x anti-alias sinc table.
const DOWNSAMPLE_2X: u32 = 0x18C00;

/// One interpolated stereo value from a source slice.
pub trait Interpolate: Copy {
    /// Sample at `idx + frac / 65536`, in the 16-bit domain.
    fn sample<F: PcmFrame>(&self, src: &[F], idx: usize, frac: u32) -> (i32, i32);
}

/// Floor of the position.
#[derive(Clone, Copy, Debug, Default)]
pub struct Nearest;

impl Interpolate for Nearest {
    #[inline(always)]
    fn sample<F: PcmFrame>(&self, src: &[F], idx: usize, _frac: u32) -> (i32, i32) {
        let f = src[idx];
        (f.left(), f.right())
    }
}

/// Two-point linear interpolation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl Interpolate for Linear {
    #[inline(always)]
    fn sample<F: PcmFrame>(&self, src: &[F], idx: usize, frac: u32) -> (i32, i32) {
        let (a, b) = (src[idx], src[idx + 1]);
        let f = (frac >> 1) as i32;
        (
            a.left() + (((b.left() - a.left()) * f) >> 15),
            a.right() + (((b.right() - a.right()) * f) >> 15),
        )
    }
}

/// Four-point cubic spline over `src[idx - 1..idx + 3]`.
#[derive(Clone, Copy)]
pub struct Spline<'a>(pub &'a SplineTable);

impl Interpolate for Spline<'_> {
    #[inline(always)]
    fn sample<F: PcmFrame>(&self, src: &[F], idx: usize, frac: u32) -> (i32, i32) {
        let c = self.0.phase((frac >> PHASE_SHIFT) as usize);
        let s = &src[idx - 1..idx + 3];
        let mut l = 0i32;
        let mut r = 0i32;
        for k in 0..4 {
            l += c[k] as i32 * s[k].left();
            r += c[k] as i32 * s[k].right();
        }
        (l >> SPLINE_QUANT_BITS, r >> SPLINE_QUANT_BITS)
    }
}

/// Eight-tap polyphase filter over `src[idx - 3..idx + 5]`.
#[derive(Clone, Copy)]
pub struct Polyphase<'a>(pub &'a PolyphaseTable);

impl Interpolate for Polyphase<'_> {
    #[inline(always)]
    fn sample<F: PcmFrame>(&self, src: &[F], idx: usize, frac: u32) -> (i32, i32) {
        let c = self.0.phase((frac >> PHASE_SHIFT) as usize);
        let s = &src[idx - 3..idx + 5];
        let mut l = 0i64;
        let mut r = 0i64;
        for k in 0..POLYPHASE_TAPS {
            l += c[k] as i64 * s[k].left() as i64;
            r += c[k] as i64 * s[k].right() as i64;
        }
        ((l >> POLYPHASE_QUANT_BITS) as i32, (r >> POLYPHASE_QUANT_BITS) as i32)
    }
}

/// Precomputed tables for every table-driven kernel.
pub struct Resampler {
    kind: InterpolationKind,
    spline: SplineTable,
    sinc: PolyphaseTable,
    sinc_13x: PolyphaseTable,
    sinc_2x: PolyphaseTable,
    fir: PolyphaseTable,
}

impl Resampler {
    pub fn new(settings: &MixerSettings) -> Self {
        Self {
            kind: settings.interpolation,
            spline: SplineTable::new(),
            sinc: PolyphaseTable::kaiser_sinc(9.6377, 0.97),
            sinc_13x: PolyphaseTable::kaiser_sinc(8.5, 0.5),
            sinc_2x: PolyphaseTable::kaiser_sinc(2.7625, 0.425),
            fir: PolyphaseTable::windowed_fir(settings.fir_window),
        }
    }

    pub fn kind(&self) -> InterpolationKind {
        self.kind
    }

    pub fn spline(&self) -> &SplineTable {
        &self.spline
    }

    /// Polyphase table for the configured kind at a given increment. The
    /// sinc kernel narrows its passband as the voice is pitched up.
    pub fn polyphase_for(&self, increment: i32) -> &PolyphaseTable {
        match self.kind {
            InterpolationKind::Fir => &self.fir,
            _ => {
                let step = increment.unsigned_abs();
                if step > DOWNSAMPLE_2X {
                    &self.sinc_2x
                } else if step > DOWNSAMPLE_13X {
                    &self.sinc_13x
                } else {
                    &self.sinc
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> [i16; 16] {
        core::array::from_fn(|i| (i as i16) * 1000 - 8000)
    }

    #[test]
    fn integer_positions_reproduce_source() {
        let src = ramp();
        let spline_table = SplineTable::new();
        for idx in 4..10 {
            let want = src[idx] as i32;
            assert_eq!(Nearest.sample(&src, idx, 0), (want, want));
            assert_eq!(Linear.sample(&src, idx, 0), (want, want));
            assert_eq!(Spline(&spline_table).sample(&src, idx, 0), (want, want));
        }
    }

    #[test]
    fn linear_halfway_is_midpoint() {
        let src = ramp();
        assert_eq!(Linear.sample(&src, 5, 0x8000).0, -2500);
    }

    #[test]
    fn stereo_channels_stay_separate() {
        let src: [[i16; 2]; 8] = core::array::from_fn(|i| [i as i16 * 10, -(i as i16) * 10]);
        let (l, r) = Linear.sample(&src, 3, 0x8000);
        assert_eq!((l, r), (35, -35));
    }

    #[test]
    fn sinc_passes_dc_close_to_cutoff_gain() {
        let src = [10000i16; 16];
        let r = Resampler::new(&MixerSettings::default());
        let (l, _) = Polyphase(r.polyphase_for(0x10000)).sample(&src, 8, 0x4000);
        // Unnormalized sinc: DC gain is close to but not exactly unity
        assert!((9000..=11000).contains(&l), "{}", l);
    }

    #[test]
    fn table_selection_follows_increment() {
        let r = Resampler::new(&MixerSettings::default());
        let base = r.polyphase_for(0x10000).phase(0)[3];
        let narrow = r.polyphase_for(0x20000).phase(0)[3];
        assert!(narrow < base);
        assert_eq!(r.polyphase_for(-0x20000).phase(0)[3], narrow);
    }

    #[test]
    fn fir_kind_ignores_increment() {
        let settings = MixerSettings::default().with_interpolation(InterpolationKind::Fir);
        let r = Resampler::new(&settings);
        assert_eq!(r.polyphase_for(0x10000).phase(5), r.polyphase_for(0x40000).phase(5));
    }
}
