//! Linear stereo volume ramping.
//!
//! Volumes are in the 0..=4096 mix domain (12-bit unity). The running value
//! keeps `RAMP_PRECISION` extra fraction bits and lands exactly on the
//! target when the ramp completes.

use crate::settings::MAX_RAMP_SAMPLES;

/// Fraction bits of the running ramp value.
pub const RAMP_PRECISION: u32 = 12;

/// Unity gain in the mix domain.
pub const UNITY_VOLUME: i32 = 1 << 12;

/// Largest per-frame change: a full-scale swing takes at least 8 frames.
pub const MAX_RAMP_STEP: i32 = (UNITY_VOLUME << RAMP_PRECISION) / 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VolumeRamp {
    current: [i32; 2],
    step: [i32; 2],
    target: [i32; 2],
    remaining: u32,
}

impl VolumeRamp {
    /// Start a ramp towards `target`. Rising ramps use `up` frames, falling
    /// ramps `down`; zero lengths apply the target at once.
    pub fn set_target(&mut self, target: [i32; 2], up: u32, down: u32) {
        if target == self.target {
            return;
        }
        self.target = target;
        let rising = (0..2).any(|i| target[i].abs() > (self.current[i] >> RAMP_PRECISION).abs());
        let len = if rising { up } else { down };
        if len == 0 {
            self.snap(target);
            return;
        }

        let delta = [
            (target[0] << RAMP_PRECISION) - self.current[0],
            (target[1] << RAMP_PRECISION) - self.current[1],
        ];
        let widest = delta[0].unsigned_abs().max(delta[1].unsigned_abs());
        let min_len = widest.div_ceil(MAX_RAMP_STEP as u32);
        let len = len.max(min_len).min(MAX_RAMP_SAMPLES.max(min_len)).max(1);
        self.step = [delta[0] / len as i32, delta[1] / len as i32];
        self.remaining = len;
        if self.step == [0, 0] {
            self.snap(target);
        }
    }

    /// Jump to `volume` with no ramp.
    pub fn snap(&mut self, volume: [i32; 2]) {
        self.current = [volume[0] << RAMP_PRECISION, volume[1] << RAMP_PRECISION];
        self.target = volume;
        self.step = [0, 0];
        self.remaining = 0;
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    /// Frames left until the target is reached.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Current volume in the mix domain.
    pub fn volume(&self) -> [i32; 2] {
        [self.current[0] >> RAMP_PRECISION, self.current[1] >> RAMP_PRECISION]
    }

    /// Running value and per-frame step, for the mixing loop.
    #[inline(always)]
    pub fn raw(&self) -> ([i32; 2], [i32; 2]) {
        (self.current, self.step)
    }

    /// Store the running value after `frames` ramped frames.
    #[inline]
    pub fn commit(&mut self, current: [i32; 2], frames: u32) {
        self.current = current;
        self.remaining = self.remaining.saturating_sub(frames);
        if self.remaining == 0 {
            let target = self.target;
            self.snap(target);
        }
    }

    /// Advance `frames` frames without mixing.
    pub fn skip(&mut self, frames: u32) {
        let n = frames.min(self.remaining) as i32;
        let current = [
            self.current[0] + self.step[0] * n,
            self.current[1] + self.step[1] * n,
        ];
        self.commit(current, frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ramp: &mut VolumeRamp, frames: u32) -> Vec<[i32; 2]> {
        let mut out = Vec::new();
        for _ in 0..frames {
            let (mut cur, step) = ramp.raw();
            out.push([cur[0] >> RAMP_PRECISION, cur[1] >> RAMP_PRECISION]);
            cur[0] += step[0];
            cur[1] += step[1];
            ramp.commit(cur, 1);
        }
        out
    }

    #[test]
    fn completes_exactly_on_target() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target([3001, 17], 16, 42);
        assert_eq!(ramp.remaining(), 16);
        run(&mut ramp, 16);
        assert!(!ramp.is_ramping());
        assert_eq!(ramp.volume(), [3001, 17]);
    }

    #[test]
    fn falling_ramp_uses_down_length() {
        let mut ramp = VolumeRamp::default();
        ramp.snap([4096, 4096]);
        ramp.set_target([0, 0], 16, 42);
        assert_eq!(ramp.remaining(), 42);
        let values = run(&mut ramp, 42);
        assert!(values.windows(2).all(|w| w[1][0] <= w[0][0]));
        assert_eq!(ramp.volume(), [0, 0]);
    }

    #[test]
    fn short_ramps_are_extended() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target([4096, -4096], 2, 2);
        assert_eq!(ramp.remaining(), 8);
        let (_, step) = ramp.raw();
        assert!(step[0].abs() <= MAX_RAMP_STEP);
    }

    #[test]
    fn zero_length_snaps() {
        let mut ramp = VolumeRamp::default();
        ramp.set_target([1000, 2000], 0, 0);
        assert_eq!(ramp.volume(), [1000, 2000]);
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn skip_matches_per_frame_stepping() {
        let mut a = VolumeRamp::default();
        let mut b = VolumeRamp::default();
        a.set_target([2048, 1024], 16, 16);
        b.set_target([2048, 1024], 16, 16);
        run(&mut a, 5);
        b.skip(5);
        assert_eq!(a, b);
    }
}
