//! Coefficient tables for the spline and polyphase kernels.

use alloc::vec::Vec;
use core::f64::consts::PI;

use crate::settings::FirWindow;

/// Phase resolution of every table: 10 bits of the 16-bit fraction.
pub const PHASE_BITS: u32 = 10;
pub const PHASES: usize = 1 << PHASE_BITS;

/// Fraction bits dropped to get a table phase.
pub const PHASE_SHIFT: u32 = 16 - PHASE_BITS;

pub const SPLINE_QUANT_BITS: u32 = 14;
pub const POLYPHASE_QUANT_BITS: u32 = 15;

/// Taps of the polyphase kernels.
pub const POLYPHASE_TAPS: usize = 8;

/// Cutoff of the windowed FIR, relative to Nyquist.
const FIR_CUTOFF: f64 = 0.90;

/// Catmull-Rom cubic spline, 4 taps per phase, each phase summing to `1 << 14`.
#[derive(Clone)]
pub struct SplineTable {
    coefs: Vec<[i16; 4]>,
}

impl SplineTable {
    pub fn new() -> Self {
        let scale = (1 << SPLINE_QUANT_BITS) as f64;
        let coefs = (0..PHASES)
            .map(|phase| {
                let x = phase as f64 / PHASES as f64;
                let (x2, x3) = (x * x, x * x * x);
                let raw = [
                    -0.5 * x3 + x2 - 0.5 * x,
                    1.5 * x3 - 2.5 * x2 + 1.0,
                    -1.5 * x3 + 2.0 * x2 + 0.5 * x,
                    0.5 * x3 - 0.5 * x2,
                ];
                normalize(&raw, scale)
            })
            .collect();
        Self { coefs }
    }

    #[inline(always)]
    pub fn phase(&self, phase: usize) -> &[i16; 4] {
        &self.coefs[phase & (PHASES - 1)]
    }
}

impl Default for SplineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// An 8-tap polyphase table; tap `t` of a phase weights source frame `idx - 3 + t`.
#[derive(Clone)]
pub struct PolyphaseTable {
    coefs: Vec<[i16; POLYPHASE_TAPS]>,
}

impl PolyphaseTable {
    /// Kaiser-windowed sinc with the given window shape and cutoff (relative
    /// to Nyquist). Coefficients are not renormalized, so the passband gain
    /// equals the cutoff scaling of the ideal filter.
    pub fn kaiser_sinc(beta: f64, cutoff: f64) -> Self {
        let cutoff = cutoff.min(0.999);
        let i0_beta = i0(beta);
        let scale = (1 << POLYPHASE_QUANT_BITS) as f64;
        Self::build(|x| {
            let u = x / 4.0;
            let window = if libm::fabs(u) < 1.0 {
                i0(beta * libm::sqrt(1.0 - u * u)) / i0_beta
            } else {
                0.0
            };
            sinc(x, cutoff) * window
        }, |raw| quantize(raw, scale))
    }

    /// Windowed FIR at a fixed cutoff, each phase normalized to unity gain.
    pub fn windowed_fir(window: FirWindow) -> Self {
        let scale = (1 << POLYPHASE_QUANT_BITS) as f64;
        Self::build(
            |x| sinc(x, FIR_CUTOFF) * window_value(window, x),
            |raw| {
                let fixed = normalize(raw, scale);
                let mut out = [0i16; POLYPHASE_TAPS];
                out.copy_from_slice(&fixed);
                out
            },
        )
    }

    fn build(
        kernel: impl Fn(f64) -> f64,
        finish: impl Fn(&[f64; POLYPHASE_TAPS]) -> [i16; POLYPHASE_TAPS],
    ) -> Self {
        let coefs = (0..PHASES)
            .map(|phase| {
                let frac = phase as f64 / PHASES as f64;
                let mut raw = [0.0; POLYPHASE_TAPS];
                for (t, c) in raw.iter_mut().enumerate() {
                    *c = kernel(t as f64 - 3.0 - frac);
                }
                finish(&raw)
            })
            .collect();
        Self { coefs }
    }

    #[inline(always)]
    pub fn phase(&self, phase: usize) -> &[i16; POLYPHASE_TAPS] {
        &self.coefs[phase & (PHASES - 1)]
    }
}

/// `sin(pi * cutoff * x) / (pi * x)`, equal to `cutoff` at 0.
fn sinc(x: f64, cutoff: f64) -> f64 {
    if libm::fabs(x) < 1e-8 {
        cutoff
    } else {
        libm::sin(PI * cutoff * x) / (PI * x)
    }
}

/// Window value at tap distance `x` (-4..4).
fn window_value(window: FirWindow, x: f64) -> f64 {
    if libm::fabs(x) >= 4.0 {
        return 0.0;
    }
    let u = 2.0 * PI * (x + 4.0) / 8.0;
    let cosine = |a: [f64; 4]| {
        a[0] - a[1] * libm::cos(u) + a[2] * libm::cos(2.0 * u) - a[3] * libm::cos(3.0 * u)
    };
    match window {
        FirWindow::Hann => cosine([0.5, 0.5, 0.0, 0.0]),
        FirWindow::Hamming => cosine([0.54, 0.46, 0.0, 0.0]),
        FirWindow::Blackman => cosine([0.42, 0.50, 0.08, 0.0]),
        FirWindow::Blackman3T61 => cosine([0.44959, 0.49364, 0.05677, 0.0]),
        FirWindow::Blackman4T92 => cosine([0.35875, 0.48829, 0.14128, 0.01168]),
        FirWindow::Kaiser => {
            const BETA: f64 = 7.0;
            let r = x / 4.0;
            i0(BETA * libm::sqrt(1.0 - r * r)) / i0(BETA)
        }
    }
}

/// Modified Bessel function of the first kind, order 0.
pub fn i0(x: f64) -> f64 {
    // Max error acceptable in I0.
    let i0e = 1e-6;
    let halfx = x / 2.0;
    let mut sum = 1.0;
    let mut u = 1.0;
    let mut n = 1;
    loop {
        let temp = halfx / n as f64;
        n += 1;
        u *= temp * temp;
        sum += u;
        if u < i0e * sum {
            break;
        }
    }
    sum
}

fn quantize(raw: &[f64; POLYPHASE_TAPS], scale: f64) -> [i16; POLYPHASE_TAPS] {
    let mut out = [0i16; POLYPHASE_TAPS];
    for (o, r) in out.iter_mut().zip(raw) {
        *o = libm::round(r * scale).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }
    out
}

/// Scale coefficients so they sum to exactly `scale` after rounding; the
/// rounding error goes to the largest tap.
fn normalize<const N: usize>(raw: &[f64; N], scale: f64) -> [i16; N] {
    let sum: f64 = raw.iter().sum();
    let gain = if libm::fabs(sum) > 1e-12 { scale / sum } else { 0.0 };
    let mut out = [0i16; N];
    let mut total = 0i32;
    let mut largest = 0;
    for (i, r) in raw.iter().enumerate() {
        let v = libm::round(r * gain).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        out[i] = v;
        total += v as i32;
        if v.unsigned_abs() > out[largest].unsigned_abs() {
            largest = i;
        }
    }
    let fixed = out[largest] as i32 + (scale as i32 - total);
    out[largest] = fixed.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spline_phases_sum_to_unity() {
        let t = SplineTable::new();
        for phase in 0..PHASES {
            let sum: i32 = t.phase(phase).iter().map(|&c| c as i32).sum();
            assert_eq!(sum, 1 << SPLINE_QUANT_BITS, "phase {}", phase);
        }
        assert_eq!(t.phase(0), &[0, 1 << SPLINE_QUANT_BITS, 0, 0]);
    }

    #[test]
    fn fir_phases_sum_to_unity() {
        for window in [
            FirWindow::Hann,
            FirWindow::Hamming,
            FirWindow::Blackman,
            FirWindow::Blackman3T61,
            FirWindow::Blackman4T92,
            FirWindow::Kaiser,
        ] {
            let t = PolyphaseTable::windowed_fir(window);
            for phase in [0, 1, PHASES / 2, PHASES - 1] {
                let sum: i32 = t.phase(phase).iter().map(|&c| c as i32).sum();
                assert_eq!(sum, 1 << POLYPHASE_QUANT_BITS, "{:?} phase {}", window, phase);
            }
        }
    }

    #[test]
    fn kaiser_sinc_is_centered_and_symmetric() {
        let t = PolyphaseTable::kaiser_sinc(9.6377, 0.97);
        let p0 = t.phase(0);
        // Center tap dominates at phase 0
        assert!(p0[3] > 30000);
        assert!(p0.iter().enumerate().all(|(i, &c)| i == 3 || c.abs() < 4000));
        // Half-way phase is mirror symmetric
        let half = t.phase(PHASES / 2);
        for k in 0..4 {
            assert!((half[k] as i32 - half[7 - k] as i32).abs() <= 1);
        }
    }

    #[test]
    fn downsampling_tables_have_lower_passband_gain() {
        let full = PolyphaseTable::kaiser_sinc(9.6377, 0.97);
        let half = PolyphaseTable::kaiser_sinc(2.7625, 0.425);
        assert!(half.phase(0)[3] < full.phase(0)[3]);
    }

    #[test]
    fn bessel_i0_known_values() {
        assert!((i0(0.0) - 1.0).abs() < 1e-9);
        assert!((i0(1.0) - 1.266_065_878).abs() < 1e-5);
    }
}
