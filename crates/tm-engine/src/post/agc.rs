//! Automatic gain control: instant peak limiting with slow recovery.

use crate::mixer::MIX_BITS;

/// Unity gain, Q16.
pub const AGC_UNITY: u32 = 1 << 16;

const PEAK_LIMIT: i64 = (1 << MIX_BITS) - 1;

/// Gain regained per recovery step.
const RECOVERY_STEP: u32 = AGC_UNITY / 256;

pub struct Agc {
    gain: u32,
    /// Frames between recovery steps
    interval: u32,
    counter: u32,
}

impl Agc {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            gain: AGC_UNITY,
            interval: (sample_rate / 100).max(1),
            counter: 0,
        }
    }

    pub fn reset(&mut self) {
        self.gain = AGC_UNITY;
        self.counter = 0;
    }

    pub fn gain(&self) -> u32 {
        self.gain
    }

    /// Scale interleaved stereo `mix`, lowering the gain whenever a frame
    /// would exceed full scale.
    pub fn process(&mut self, mix: &mut [i32]) {
        for frame in mix.chunks_exact_mut(2) {
            let peak = frame[0].unsigned_abs().max(frame[1].unsigned_abs()) as i64;
            if (peak * self.gain as i64) >> 16 > PEAK_LIMIT {
                self.gain = ((PEAK_LIMIT << 16) / peak) as u32;
                self.counter = 0;
            }
            for x in frame.iter_mut() {
                *x = ((*x as i64 * self.gain as i64) >> 16) as i32;
            }

            if self.gain < AGC_UNITY {
                self.counter += 1;
                if self.counter >= self.interval {
                    self.counter = 0;
                    self.gain = (self.gain + RECOVERY_STEP).min(AGC_UNITY);
                }
            }
        }
    }
}
