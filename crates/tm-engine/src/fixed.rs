//! Fixed-point helpers shared by the sequencer and the mixer.

/// Fractional bits of sample positions and increments.
pub const FRAC_BITS: u32 = 16;
pub const FRAC_ONE: i64 = 1 << FRAC_BITS;
pub const FRAC_MASK: i64 = FRAC_ONE - 1;

/// Largest increment a voice may use (about 256 source frames per output frame).
pub const MAX_INCREMENT: i32 = 0x00FF_0000;

/// A signed 48.16 position in a sample, in frames.
///
/// Arithmetic saturates instead of wrapping so a runaway increment parks the
/// voice at the far end of the sample rather than jumping back into it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SamplePosition(i64);

impl SamplePosition {
    pub const ZERO: Self = Self(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn from_frames(frames: i64) -> Self {
        Self(frames.saturating_mul(FRAC_ONE))
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Integer frame index (floor).
    pub const fn frame(self) -> i64 {
        self.0 >> FRAC_BITS
    }

    /// Fractional part, 0..65535.
    pub const fn frac(self) -> u32 {
        (self.0 & FRAC_MASK) as u32
    }

    pub fn advance(self, increment: i32, frames: usize) -> Self {
        let delta = (increment as i64).saturating_mul(frames as i64);
        Self(self.0.saturating_add(delta))
    }

    pub fn offset(self, raw: i64) -> Self {
        Self(self.0.saturating_add(raw))
    }
}

/// `a * b / c` in 64-bit, truncating toward zero. Returns 0 for `c == 0`.
#[inline]
pub fn muldiv(a: i64, b: i64, c: i64) -> i64 {
    if c == 0 {
        return 0;
    }
    ((a as i128 * b as i128) / c as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// `a * b / c` in 64-bit, rounded to nearest. Returns 0 for `c == 0`.
#[inline]
pub fn muldivr(a: i64, b: i64, c: i64) -> i64 {
    if c == 0 {
        return 0;
    }
    let num = a as i128 * b as i128;
    let den = c as i128;
    let magnitude = (num.abs() + den.abs() / 2) / den.abs();
    let rounded = if (num < 0) != (den < 0) { -magnitude } else { magnitude };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
