//! LFO waveforms for vibrato, tremolo, panbrello and auto-vibrato.
//!
//! Phases run over `LFO_STEPS` steps per cycle in every dialect. The classic
//! sine table only has 64 steps, so it holds each value for four phases;
//! the fine table resolves all 256.

use rand::RngCore;
use rand_pcg::Pcg32;
use tm_ir::{PlaybackDialect, VibratoWave};

/// Phase steps per LFO cycle.
pub const LFO_STEPS: u32 = 256;

/// One cycle of a sine, 64 steps, amplitude 127.
const SINE_TABLE: [i8; 64] = [
    0, 12, 25, 37, 49, 60, 71, 81, 90, 98, 106, 112, 117, 122, 125, 126, 127, 126, 125, 122, 117,
    112, 106, 98, 90, 81, 71, 60, 49, 37, 25, 12, 0, -12, -25, -37, -49, -60, -71, -81, -90, -98,
    -106, -112, -117, -122, -125, -126, -127, -126, -125, -122, -117, -112, -106, -98, -90, -81,
    -71, -60, -49, -37, -25, -12,
];

/// First quarter of a 256-step sine, amplitude 64, peak included.
const FINE_SINE_QUARTER: [i8; 65] = [
    0, 2, 3, 5, 6, 8, 9, 11, 12, 14, 16, 17, 19, 20, 22, 23, 24, 26, 27, 29, 30, 32, 33, 34, 36,
    37, 38, 39, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 56, 57, 58, 59,
    59, 60, 60, 61, 61, 62, 62, 62, 63, 63, 63, 64, 64, 64, 64, 64, 64,
];

/// LFO shape selected by the waveform effects (low two bits of the parameter).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Sine,
    RampDown,
    Square,
    Random,
}

impl Waveform {
    /// Decode a waveform effect parameter: shape in bits 0-1, bit 2 keeps the
    /// phase across new notes.
    pub fn from_param(param: u8) -> (Self, bool) {
        let shape = match param & 3 {
            0 => Waveform::Sine,
            1 => Waveform::RampDown,
            2 => Waveform::Square,
            _ => Waveform::Random,
        };
        (shape, param & 4 != 0)
    }
}

impl From<VibratoWave> for Waveform {
    fn from(w: VibratoWave) -> Self {
        match w {
            VibratoWave::Sine => Waveform::Sine,
            VibratoWave::RampDown => Waveform::RampDown,
            VibratoWave::Square => Waveform::Square,
            VibratoWave::Random => Waveform::Random,
        }
    }
}

/// Sine table resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoTable {
    /// 64 steps, as the Amiga and FT2 trackers play it
    #[default]
    Classic,
    /// 256 steps, as Impulse Tracker plays it
    Fine,
}

impl LfoTable {
    pub fn for_dialect(dialect: &PlaybackDialect) -> Self {
        if dialect.fine_lfo_tables {
            LfoTable::Fine
        } else {
            LfoTable::Classic
        }
    }
}

fn fine_sine(pos: u32) -> i32 {
    let half = (pos & 127) as usize;
    let value = if half <= 64 {
        FINE_SINE_QUARTER[half]
    } else {
        FINE_SINE_QUARTER[128 - half]
    } as i32;
    if pos & 128 == 0 {
        value
    } else {
        -value
    }
}

/// Sample the waveform at phase `pos` (`LFO_STEPS` per cycle), returning
/// -128..=128.
///
/// `Random` draws from the engine RNG so renders stay reproducible.
pub fn lfo_value(wave: Waveform, table: LfoTable, pos: u32, rng: &mut Pcg32) -> i32 {
    let pos = pos & (LFO_STEPS - 1);
    let step = (pos >> 2) as i32;
    match wave {
        Waveform::Sine => match table {
            LfoTable::Classic => SINE_TABLE[step as usize] as i32,
            LfoTable::Fine => fine_sine(pos) * 2,
        },
        Waveform::RampDown => (127 - step * 4).max(-127),
        Waveform::Square => {
            if step < 32 {
                127
            } else {
                -127
            }
        }
        Waveform::Random => (rng.next_u32() % 255) as i32 - 127,
    }
}
