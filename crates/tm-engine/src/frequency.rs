//! Note, period and frequency conversion.
//!
//! Pitch offsets are expressed in 1/768 octave (1/64 semitone) units
//! throughout the engine. Amiga-mode channels store an S3M-scale period
//! (four times the ProTracker period); linear-mode channels store the
//! frequency in Hz directly.

use crate::fixed::{muldiv, muldivr, MAX_INCREMENT};
use tm_ir::NOTE_MIDDLE_C;

/// Pitch units per semitone.
pub const UNITS_PER_SEMITONE: i32 = 64;

/// Pitch units per octave.
pub const UNITS_PER_OCTAVE: i32 = 768;

/// S3M-scale periods for the octave starting at C-5 (Amiga C-2 = 428 * 4).
const PERIOD_TABLE: [i64; 12] = [1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907];

/// Reference rate the period table is tuned to.
const AMIGA_C5_SPEED: i64 = 8363;

/// `AMIGA_C5_SPEED * PERIOD_TABLE[0]`: the frequency numerator for periods.
const PERIOD_CLOCK: i64 = AMIGA_C5_SPEED * 1712;

/// Smallest and largest periods a slide can reach.
pub const PERIOD_MIN: i32 = 8;
pub const PERIOD_MAX: i32 = 0xF_FFFF;

/// Linear-mode frequency limits in Hz.
pub const FREQUENCY_MIN: i32 = 1;
pub const FREQUENCY_MAX: i32 = 0x3FF_FFFF;

/// round(2^(n/12) * 65536)
const SEMITONE_MUL: [u64; 12] = [
    65536, 69433, 73562, 77936, 82570, 87480, 92682, 98193, 104032, 110218, 116772, 123715,
];

/// round(2^(n/768) * 65536)
const FINE_MUL: [u64; 64] = [
    65536, 65595, 65654, 65714, 65773, 65832, 65892, 65951, 66011, 66071, 66130, 66190, 66250,
    66309, 66369, 66429, 66489, 66549, 66609, 66670, 66730, 66790, 66850, 66911, 66971, 67032,
    67092, 67153, 67213, 67274, 67335, 67395, 67456, 67517, 67578, 67639, 67700, 67761, 67823,
    67884, 67945, 68007, 68068, 68129, 68191, 68252, 68314, 68376, 68438, 68499, 68561, 68623,
    68685, 68747, 68809, 68871, 68933, 68996, 69058, 69120, 69183, 69245, 69308, 69370,
];

/// Scale `value` by `2^(units / 768)`.
pub fn shift_by_units(value: i64, units: i32) -> i64 {
    if units == 0 {
        return value;
    }
    let octaves = units.div_euclid(UNITS_PER_OCTAVE);
    let rem = units.rem_euclid(UNITS_PER_OCTAVE);
    let semis = (rem / UNITS_PER_SEMITONE) as usize;
    let fine = (rem % UNITS_PER_SEMITONE) as usize;
    let mul = (SEMITONE_MUL[semis] * FINE_MUL[fine]) >> 16;

    let scaled = (value as i128 * mul as i128) >> 16;
    let shifted = if octaves >= 0 {
        scaled << octaves.min(40)
    } else {
        scaled >> (-octaves).min(100)
    };
    shifted.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Period for a note in Amiga mode. `finetune` is in 1/8 semitone.
pub fn note_to_period(note: u8, c5_speed: u32, finetune: i8) -> i32 {
    let c5 = shift_by_units(c5_speed.max(1) as i64, finetune as i32 * 8).max(1);
    let note = note.min(119);
    let octave = (note / 12) as u32;
    let base = PERIOD_TABLE[(note % 12) as usize];
    muldiv(AMIGA_C5_SPEED << 5, base, c5 << octave).clamp(PERIOD_MIN as i64, PERIOD_MAX as i64) as i32
}

/// Frequency in Hz of an Amiga-mode period.
pub fn period_to_frequency(period: i32) -> i64 {
    if period <= 0 {
        return 0;
    }
    muldiv(PERIOD_CLOCK, 1, period as i64)
}

/// Amiga-mode period that plays at `freq` Hz.
pub fn frequency_to_period(freq: i64) -> i32 {
    if freq <= 0 {
        return PERIOD_MAX;
    }
    muldiv(PERIOD_CLOCK, 1, freq).clamp(PERIOD_MIN as i64, PERIOD_MAX as i64) as i32
}

/// Frequency in Hz for a note in linear mode. `finetune` is in 1/8 semitone.
pub fn note_to_frequency(note: u8, c5_speed: u32, finetune: i8) -> i32 {
    let units = (note as i32 - NOTE_MIDDLE_C as i32) * UNITS_PER_SEMITONE + finetune as i32 * 8;
    shift_by_units(c5_speed as i64, units).clamp(FREQUENCY_MIN as i64, FREQUENCY_MAX as i64) as i32
}

/// Frequency in Hz for a note of a custom tuning (floating-point path).
pub fn tuned_frequency(c5_speed: u32, ratio: f32) -> i32 {
    let freq = c5_speed as f64 * ratio as f64;
    if !freq.is_finite() {
        return FREQUENCY_MIN;
    }
    (freq + 0.5).clamp(FREQUENCY_MIN as f64, FREQUENCY_MAX as f64) as i32
}

/// Convert a frequency to a 16.16 sample increment at `sample_rate`.
pub fn frequency_to_increment(freq: i64, sample_rate: u32) -> i32 {
    if sample_rate == 0 || freq <= 0 {
        return 0;
    }
    muldivr(freq, 1 << 16, sample_rate as i64).clamp(0, MAX_INCREMENT as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const C5_SPEED: u32 = 8363; // Standard Amiga rate
    const SAMPLE_RATE: u32 = 44100;

    #[test]
    fn middle_c_plays_at_c5_speed() {
        assert_eq!(note_to_frequency(60, 44100, 0), 44100);
        assert_eq!(frequency_to_increment(44100, 44100), 0x10000);
        let period = note_to_period(60, C5_SPEED, 0);
        assert_eq!(period, 1712);
        assert_eq!(period_to_frequency(period), C5_SPEED as i64);
    }

    #[test]
    fn octave_up_doubles_frequency() {
        let base = note_to_frequency(60, C5_SPEED, 0);
        assert_eq!(note_to_frequency(72, C5_SPEED, 0), base * 2);
        assert_eq!(note_to_period(72, C5_SPEED, 0), 856);
    }

    #[test]
    fn octave_down_halves_increment() {
        let base = frequency_to_increment(note_to_frequency(60, C5_SPEED, 0) as i64, SAMPLE_RATE);
        let down = frequency_to_increment(note_to_frequency(48, C5_SPEED, 0) as i64, SAMPLE_RATE);
        // Allow ±1 for rounding
        assert!((down as i64 - base as i64 / 2).abs() <= 1);
    }

    #[test]
    fn semitone_units_compose() {
        // 12 semitones of 64 units equal one octave
        assert_eq!(shift_by_units(1000, UNITS_PER_OCTAVE), 2000);
        assert_eq!(shift_by_units(1000, -UNITS_PER_OCTAVE), 500);
        let fifth = shift_by_units(65536, 7 * UNITS_PER_SEMITONE);
        assert!((fifth - 98193).abs() <= 1);
    }

    #[test]
    fn period_and_frequency_invert() {
        assert_eq!(frequency_to_period(8363), 1712);
        assert_eq!(frequency_to_period(8363 * 2), 856);
        assert_eq!(frequency_to_period(0), PERIOD_MAX);
    }

    #[test]
    fn finetune_raises_pitch() {
        let plain = note_to_frequency(60, C5_SPEED, 0);
        let tuned = note_to_frequency(60, C5_SPEED, 4);
        assert!(tuned > plain);
        assert!(note_to_period(60, C5_SPEED, 4) < note_to_period(60, C5_SPEED, 0));
    }

    #[test]
    fn degenerate_inputs_are_safe() {
        assert_eq!(frequency_to_increment(1000, 0), 0);
        assert_eq!(period_to_frequency(0), 0);
        assert_eq!(frequency_to_increment(i64::MAX, 8000), MAX_INCREMENT);
        assert_eq!(tuned_frequency(8363, f32::NAN), FREQUENCY_MIN);
        assert!(note_to_period(119, 1, 0) <= PERIOD_MAX);
    }
}
